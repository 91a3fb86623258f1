//! The synchroniser.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use basalt_core::{FunctionDef, TriggerConfig, LAMBDAS_COLLECTION};
use basalt_engine::ScriptEngine;
use basalt_registry::{HttpRoute, TriggerRegistry};
use basalt_router::HostRouter;
use basalt_state::{RecordEvent, RecordHooks, RecordStore, StateError};
use tracing::{debug, error, info, warn};

/// Mirrors `lambdas` records into the trigger registry and projects the
/// registry onto the host router.
pub struct Synchronizer {
    store: RecordStore,
    registry: Arc<TriggerRegistry>,
    engine: Arc<ScriptEngine>,
    router: RwLock<Option<Arc<HostRouter>>>,
    hooks_installed: AtomicBool,
}

impl Synchronizer {
    pub fn new(
        store: RecordStore,
        registry: Arc<TriggerRegistry>,
        engine: Arc<ScriptEngine>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            registry,
            engine,
            router: RwLock::new(None),
            hooks_installed: AtomicBool::new(false),
        })
    }

    pub fn registry(&self) -> &Arc<TriggerRegistry> {
        &self.registry
    }

    /// Subscribe to `lambdas` record lifecycle events. Idempotent:
    /// the second call is a no-op, so re-running startup never double
    /// subscribes.
    pub fn install_hooks(self: &Arc<Self>, hooks: &RecordHooks) {
        if self.hooks_installed.swap(true, Ordering::SeqCst) {
            return;
        }

        let on_change = {
            let sync = self.clone();
            move |event: RecordEvent| {
                let sync = sync.clone();
                Box::pin(async move {
                    if event.collection != LAMBDAS_COLLECTION {
                        return;
                    }
                    match serde_json::from_value::<FunctionDef>(event.record.clone()) {
                        Ok(def) => {
                            sync.apply(&def);
                            sync.reconcile_router();
                        }
                        Err(e) => {
                            error!(id = %event.id, error = %e, "malformed lambda record")
                        }
                    }
                }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
            }
        };
        hooks.subscribe_create(Arc::new(on_change.clone()));
        hooks.subscribe_update(Arc::new(on_change));

        let sync = self.clone();
        hooks.subscribe_delete(Arc::new(move |event: RecordEvent| {
            let sync = sync.clone();
            Box::pin(async move {
                if event.collection == LAMBDAS_COLLECTION {
                    sync.remove_function(&event.id);
                }
            })
        }));
        debug!("lambda lifecycle hooks installed");
    }

    /// Load every enabled function from the store and register it.
    ///
    /// A store whose `lambdas` collection has never been written is
    /// normal on first boot; anything else that fails is logged and
    /// survived, the next lifecycle event is the retry opportunity.
    pub fn load_functions(&self) {
        let functions = match self.store.list_enabled_functions() {
            Ok(functions) => functions,
            Err(StateError::CollectionMissing(collection)) => {
                debug!(%collection, "lambda collection not found, skipping load");
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to load lambda functions");
                return;
            }
        };

        info!(count = functions.len(), "loading lambda functions");
        for def in &functions {
            self.apply(def);
        }
    }

    /// Mirror one record's current state into the registry.
    ///
    /// The function's previous registration is always cleared; an
    /// enabled record with a valid configuration goes through the
    /// registry's atomic `replace`, so readers never see a half-swapped
    /// configuration.
    fn apply(&self, def: &FunctionDef) {
        if !def.enabled {
            debug!(id = %def.id, name = %def.name, "function disabled, not registering");
            self.clear_registration(&def.id);
            return;
        }

        let config = match TriggerConfig::parse(&def.triggers) {
            Ok(config) => config,
            Err(e) => {
                error!(
                    id = %def.id,
                    name = %def.name,
                    error = %e,
                    triggers = %def.triggers,
                    "skipping function with invalid trigger configuration"
                );
                self.clear_registration(&def.id);
                return;
            }
        };

        match self.registry.replace(&def.id, &config) {
            Ok(removed) => {
                self.detach_stale(&removed);
                info!(
                    id = %def.id,
                    name = %def.name,
                    http = config.http.len(),
                    database = config.database.len(),
                    cron = config.cron.len(),
                    "lambda function registered"
                );
            }
            // Bad cron expression: replace validated before touching the
            // tables, so the old registration is still live. Clear it,
            // matching the parse-failure path.
            Err(e) => {
                error!(
                    id = %def.id,
                    name = %def.name,
                    error = %e,
                    "failed to register lambda function"
                );
                self.clear_registration(&def.id);
            }
        }
    }

    /// Drop every registry entry for a deleted record.
    fn remove_function(&self, function_id: &str) {
        self.clear_registration(function_id);
        info!(id = %function_id, "lambda function unregistered");
    }

    fn clear_registration(&self, function_id: &str) {
        let removed = self.registry.unregister(function_id);
        self.detach_stale(&removed);
    }

    /// The host router has become available. Idempotent.
    pub fn attach_router(&self, router: Arc<HostRouter>) {
        *self.router.write().expect("router slot lock") = Some(router);
        self.reconcile_router();
    }

    /// Mirror unattached registry routes onto the router. Safe to call
    /// at any time: before the router exists it is a no-op, afterwards
    /// each route is attached exactly once per registration.
    pub fn reconcile_router(&self) {
        let Some(router) = self.router.read().expect("router slot lock").clone() else {
            debug!("router not available yet, skipping http route attachment");
            return;
        };

        for route in self.registry.unattached_routes() {
            info!(
                method = %route.method,
                path = %route.path,
                function_id = %route.function_id,
                "attaching lambda http route"
            );
            router.route(
                &route.method,
                &route.path,
                basalt_dispatch::make_http_handler(
                    route.function_id.clone(),
                    self.engine.clone(),
                    self.store.clone(),
                ),
            );
            self.registry.mark_attached(&route.method, &route.path);
        }
    }

    /// Remove attached routes from the router, except where the same
    /// method + path has been re-registered (possibly by another
    /// function): those keep serving and reconciliation refreshes the
    /// handler.
    fn detach_stale(&self, removed: &[HttpRoute]) {
        let Some(router) = self.router.read().expect("router slot lock").clone() else {
            return;
        };
        for route in removed {
            if route.attached && self.registry.http_route(&route.method, &route.path).is_none() {
                router.remove_route(&route.method, &route.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_core::{DbEvent, PluginConfig};
    use basalt_cron::CronScheduler;
    use basalt_state::CollectionOps;

    struct Fixture {
        store: RecordStore,
        sync: Arc<Synchronizer>,
        ops: CollectionOps,
        hooks: Arc<RecordHooks>,
    }

    fn fixture() -> Fixture {
        let store = RecordStore::open_in_memory().unwrap();
        let engine = Arc::new(ScriptEngine::new(store.clone(), PluginConfig::default()));
        let registry = Arc::new(TriggerRegistry::new(
            Arc::new(CronScheduler::new()),
            Arc::new(|_| {}),
        ));
        let sync = Synchronizer::new(store.clone(), registry, engine);
        let hooks = Arc::new(RecordHooks::new());
        sync.install_hooks(&hooks);
        let ops = CollectionOps::new(store.clone(), hooks.clone());
        Fixture {
            store,
            sync,
            ops,
            hooks,
        }
    }

    fn function(id: &str, triggers: &str) -> FunctionDef {
        FunctionDef {
            id: id.to_string(),
            name: format!("fn-{id}"),
            enabled: true,
            code: "1".to_string(),
            timeout_ms: None,
            content_type: None,
            env_vars: String::new(),
            triggers: triggers.to_string(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn load_registers_every_enabled_function() {
        let f = fixture();
        f.store
            .put_function(&function(
                "a",
                r#"{"http": [{"method": "GET", "path": "/a"}]}"#,
            ))
            .unwrap();
        f.store
            .put_function(&function(
                "b",
                r#"{"database": [{"collection": "posts", "event": "create"}]}"#,
            ))
            .unwrap();
        let mut disabled = function("c", r#"{"http": [{"method": "GET", "path": "/c"}]}"#);
        disabled.enabled = false;
        f.store.put_function(&disabled).unwrap();

        f.sync.load_functions();

        let registry = f.sync.registry();
        assert!(registry.http_route("GET", "/a").is_some());
        assert_eq!(registry.db_triggers("posts", DbEvent::Create).len(), 1);
        assert!(registry.http_route("GET", "/c").is_none());
    }

    #[tokio::test]
    async fn load_tolerates_a_missing_collection() {
        let f = fixture();
        // Nothing was ever written: the lambdas table does not exist.
        f.sync.load_functions();
        assert!(f.sync.registry().http_routes().is_empty());
    }

    #[tokio::test]
    async fn bad_trigger_config_skips_only_that_function() {
        let f = fixture();
        f.store
            .put_function(&function("broken", "{this is not json"))
            .unwrap();
        f.store
            .put_function(&function(
                "good",
                r#"{"http": [{"method": "GET", "path": "/ok"}]}"#,
            ))
            .unwrap();

        f.sync.load_functions();

        assert!(f.sync.registry().http_route("GET", "/ok").is_some());
        assert!(f.sync.registry().is_unregistered("broken"));
    }

    #[tokio::test]
    async fn record_create_is_mirrored_before_save_returns() {
        let f = fixture();
        f.ops
            .save_function(&function(
                "live",
                r#"{"http": [{"method": "GET", "path": "/live"}]}"#,
            ))
            .await
            .unwrap();

        assert!(f.sync.registry().http_route("GET", "/live").is_some());
    }

    #[tokio::test]
    async fn record_update_replaces_the_registration() {
        let f = fixture();
        f.ops
            .save_function(&function(
                "mover",
                r#"{"http": [{"method": "GET", "path": "/a"}]}"#,
            ))
            .await
            .unwrap();
        f.ops
            .save_function(&function(
                "mover",
                r#"{"http": [{"method": "GET", "path": "/b"}]}"#,
            ))
            .await
            .unwrap();

        let registry = f.sync.registry();
        assert!(registry.http_route("GET", "/a").is_none());
        assert!(registry.http_route("GET", "/b").is_some());
    }

    #[tokio::test]
    async fn record_delete_clears_all_tables() {
        let f = fixture();
        f.ops
            .save_function(&function(
                "doomed",
                r#"{
                    "http": [{"method": "GET", "path": "/d"}],
                    "database": [{"collection": "posts", "event": "update"}],
                    "cron": [{"schedule": "*/5 * * * *"}]
                }"#,
            ))
            .await
            .unwrap();
        assert!(!f.sync.registry().is_unregistered("doomed"));

        f.ops.delete_function("doomed").await.unwrap();
        assert!(f.sync.registry().is_unregistered("doomed"));
        assert!(f.sync.registry().scheduler().job_ids().is_empty());
    }

    #[tokio::test]
    async fn disabling_a_function_unregisters_it() {
        let f = fixture();
        f.ops
            .save_function(&function(
                "flaky",
                r#"{"http": [{"method": "GET", "path": "/f"}]}"#,
            ))
            .await
            .unwrap();

        let mut disabled = function("flaky", r#"{"http": [{"method": "GET", "path": "/f"}]}"#);
        disabled.enabled = false;
        f.ops.save_function(&disabled).await.unwrap();

        assert!(f.sync.registry().is_unregistered("flaky"));
    }

    #[tokio::test]
    async fn routes_attach_when_the_router_arrives_late() {
        let f = fixture();
        f.ops
            .save_function(&function(
                "early",
                r#"{"http": [{"method": "GET", "path": "/early"}]}"#,
            ))
            .await
            .unwrap();

        // Registered, but nothing to attach to yet.
        assert_eq!(f.sync.registry().unattached_routes().len(), 1);

        let router = Arc::new(HostRouter::new());
        f.sync.attach_router(router.clone());

        assert!(router.lookup("GET", "/early").is_some());
        assert!(f.sync.registry().unattached_routes().is_empty());
    }

    #[tokio::test]
    async fn routes_attach_immediately_when_the_router_exists() {
        let f = fixture();
        let router = Arc::new(HostRouter::new());
        f.sync.attach_router(router.clone());

        f.ops
            .save_function(&function(
                "late",
                r#"{"http": [{"method": "POST", "path": "/late"}]}"#,
            ))
            .await
            .unwrap();

        assert!(router.lookup("POST", "/late").is_some());
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let f = fixture();
        let router = Arc::new(HostRouter::new());
        f.sync.attach_router(router.clone());
        f.ops
            .save_function(&function(
                "once",
                r#"{"http": [{"method": "GET", "path": "/once"}]}"#,
            ))
            .await
            .unwrap();

        f.sync.reconcile_router();
        f.sync.reconcile_router();
        assert_eq!(router.route_count(), 1);
    }

    #[tokio::test]
    async fn deleted_function_routes_leave_the_router() {
        let f = fixture();
        let router = Arc::new(HostRouter::new());
        f.sync.attach_router(router.clone());

        f.ops
            .save_function(&function(
                "gone",
                r#"{"http": [{"method": "GET", "path": "/gone"}]}"#,
            ))
            .await
            .unwrap();
        assert!(router.lookup("GET", "/gone").is_some());

        f.ops.delete_function("gone").await.unwrap();
        assert!(router.lookup("GET", "/gone").is_none());
    }

    #[tokio::test]
    async fn updated_function_routes_move_on_the_router() {
        // Scenario: update GET /a to GET /b, then /a must 404 and /b serve.
        let f = fixture();
        let router = Arc::new(HostRouter::new());
        f.sync.attach_router(router.clone());

        f.ops
            .save_function(&function(
                "mover",
                r#"{"http": [{"method": "GET", "path": "/a"}]}"#,
            ))
            .await
            .unwrap();
        f.ops
            .save_function(&function(
                "mover",
                r#"{"http": [{"method": "GET", "path": "/b"}]}"#,
            ))
            .await
            .unwrap();

        assert!(router.lookup("GET", "/a").is_none());
        assert!(router.lookup("GET", "/b").is_some());
    }

    #[tokio::test]
    async fn install_hooks_twice_subscribes_once() {
        let f = fixture();
        f.sync.install_hooks(&f.hooks);

        f.ops
            .save_function(&function(
                "solo",
                r#"{"database": [{"collection": "posts", "event": "create"}]}"#,
            ))
            .await
            .unwrap();

        let registry = f.sync.registry();
        assert_eq!(registry.db_triggers("posts", DbEvent::Create).len(), 1);
    }

    #[tokio::test]
    async fn non_lambda_collections_are_ignored() {
        let f = fixture();
        f.ops
            .save_record("posts", "p1", serde_json::json!({"title": "x"}))
            .await
            .unwrap();
        assert!(f.sync.registry().http_routes().is_empty());
    }
}
