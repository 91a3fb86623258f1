//! Minimal template registry exposed to scripts as `$template`.
//!
//! Templates are registered host-side by name and rendered with
//! `{{key}}` substitution from a JSON object. The registry is a
//! capability handle, deliberately small.

use std::collections::HashMap;
use std::sync::RwLock;

/// Named text templates with `{{key}}` placeholder substitution.
#[derive(Default)]
pub struct TemplateRegistry {
    templates: RwLock<HashMap<String, String>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a template.
    pub fn register(&self, name: impl Into<String>, text: impl Into<String>) {
        self.templates
            .write()
            .expect("templates lock")
            .insert(name.into(), text.into());
    }

    /// Render a template with the given data. Unknown placeholders are
    /// left in place; non-string values render as JSON.
    ///
    /// Returns `None` when no template with that name exists.
    pub fn render(&self, name: &str, data: &serde_json::Value) -> Option<String> {
        let templates = self.templates.read().expect("templates lock");
        let text = templates.get(name)?;

        let mut rendered = text.clone();
        if let Some(map) = data.as_object() {
            for (key, value) in map {
                let placeholder = format!("{{{{{key}}}}}");
                let replacement = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                rendered = rendered.replace(&placeholder, &replacement);
            }
        }
        Some(rendered)
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.templates.read().expect("templates lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
