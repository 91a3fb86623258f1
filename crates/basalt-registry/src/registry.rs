//! The trigger registry.
//!
//! Writers are the control-plane synchroniser; readers are the
//! dispatchers, potentially on many threads at once. A single
//! `RwLock` over all three tables makes `replace` atomic: no reader can
//! see a function's HTTP routes from one configuration and its DB
//! triggers from another.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use basalt_core::TriggerConfig;
use basalt_cron::{CronScheduler, JobCallback};
use tracing::{debug, warn};

use crate::entries::{cron_job_id, db_key, route_key, CronJob, DbTrigger, HttpRoute};
use crate::error::RegistryResult;

/// Callback the registry arms each cron job with. Receives the function
/// id on every tick; the dispatcher decides what an invocation means.
pub type CronHandler = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Default)]
struct Tables {
    /// `"METHOD:path"` → route. One entry per key, last writer wins.
    http: HashMap<String, HttpRoute>,
    /// `"collection:event"` → subscribed triggers, in registration order.
    db: HashMap<String, Vec<DbTrigger>>,
    /// function id → that function's cron jobs.
    cron: HashMap<String, Vec<CronJob>>,
}

/// Trigger indices plus the cron scheduler they feed.
pub struct TriggerRegistry {
    tables: RwLock<Tables>,
    scheduler: Arc<CronScheduler>,
    cron_handler: CronHandler,
}

impl TriggerRegistry {
    pub fn new(scheduler: Arc<CronScheduler>, cron_handler: CronHandler) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            scheduler,
            cron_handler,
        }
    }

    pub fn scheduler(&self) -> &Arc<CronScheduler> {
        &self.scheduler
    }

    /// Register every trigger in `config` for `function_id`.
    ///
    /// Cron expressions are validated before any table is touched, so a
    /// bad one leaves the registry unchanged.
    pub fn register(&self, function_id: &str, config: &TriggerConfig) -> RegistryResult<()> {
        for spec in &config.cron {
            CronScheduler::parse_expression(&spec.schedule)?;
        }

        let mut tables = self.tables.write().expect("registry lock");
        self.register_locked(&mut tables, function_id, config)
    }

    fn register_locked(
        &self,
        tables: &mut Tables,
        function_id: &str,
        config: &TriggerConfig,
    ) -> RegistryResult<()> {
        for spec in &config.http {
            let route = HttpRoute {
                function_id: function_id.to_string(),
                method: spec.method.to_uppercase(),
                path: spec.path.clone(),
                attached: false,
            };
            let key = route.table_key();
            if let Some(evicted) = tables.http.insert(key.clone(), route) {
                if evicted.function_id != function_id {
                    warn!(
                        %key,
                        evicted = %evicted.function_id,
                        winner = %function_id,
                        "http route collision, last writer wins"
                    );
                }
            }
            debug!(%key, %function_id, "http trigger registered");
        }

        for spec in &config.database {
            let trigger = DbTrigger {
                function_id: function_id.to_string(),
                collection: spec.collection.clone(),
                event: spec.event,
            };
            let key = trigger.table_key();
            tables.db.entry(key.clone()).or_default().push(trigger);
            debug!(%key, %function_id, "database trigger registered");
        }

        for (index, spec) in config.cron.iter().enumerate() {
            let job_id = cron_job_id(function_id, index);
            let handler = self.cron_handler.clone();
            let id_for_tick = function_id.to_string();
            let callback: JobCallback = Arc::new(move || handler(id_for_tick.clone()));

            // Validated above; an error here would be a scheduler bug.
            self.scheduler.add(&job_id, &spec.schedule, callback)?;

            tables
                .cron
                .entry(function_id.to_string())
                .or_default()
                .push(CronJob {
                    function_id: function_id.to_string(),
                    schedule: spec.schedule.clone(),
                    job_id: job_id.clone(),
                });
            debug!(%job_id, schedule = %spec.schedule, "cron trigger registered");
        }

        Ok(())
    }

    /// Remove every entry owned by `function_id` from all three tables,
    /// stopping its cron jobs. Returns the HTTP routes that were removed
    /// so the caller can detach them from the host router.
    pub fn unregister(&self, function_id: &str) -> Vec<HttpRoute> {
        let mut tables = self.tables.write().expect("registry lock");
        self.unregister_locked(&mut tables, function_id)
    }

    /// `unregister` followed by `register` under one write lock, so the
    /// swap is atomic to readers.
    pub fn replace(
        &self,
        function_id: &str,
        config: &TriggerConfig,
    ) -> RegistryResult<Vec<HttpRoute>> {
        for spec in &config.cron {
            CronScheduler::parse_expression(&spec.schedule)?;
        }

        let mut tables = self.tables.write().expect("registry lock");
        let removed = self.unregister_locked(&mut tables, function_id);
        self.register_locked(&mut tables, function_id, config)?;
        Ok(removed)
    }

    fn unregister_locked(&self, tables: &mut Tables, function_id: &str) -> Vec<HttpRoute> {
        let mut removed_routes = Vec::new();
        tables.http.retain(|_, route| {
            if route.function_id == function_id {
                removed_routes.push(route.clone());
                false
            } else {
                true
            }
        });

        tables.db.retain(|_, triggers| {
            triggers.retain(|t| t.function_id != function_id);
            !triggers.is_empty()
        });

        if let Some(jobs) = tables.cron.remove(function_id) {
            for job in jobs {
                self.scheduler.remove(&job.job_id);
            }
        }

        if !removed_routes.is_empty() {
            debug!(%function_id, routes = removed_routes.len(), "http triggers unregistered");
        }
        removed_routes
    }

    // ── Reader API ─────────────────────────────────────────────────

    /// Resolve a route by method and path.
    pub fn http_route(&self, method: &str, path: &str) -> Option<HttpRoute> {
        let tables = self.tables.read().expect("registry lock");
        tables.http.get(&route_key(method, path)).cloned()
    }

    /// All HTTP routes, in no particular order.
    pub fn http_routes(&self) -> Vec<HttpRoute> {
        let tables = self.tables.read().expect("registry lock");
        tables.http.values().cloned().collect()
    }

    /// HTTP routes not yet mirrored onto the host router.
    pub fn unattached_routes(&self) -> Vec<HttpRoute> {
        let tables = self.tables.read().expect("registry lock");
        tables
            .http
            .values()
            .filter(|r| !r.attached)
            .cloned()
            .collect()
    }

    /// Record that a route has been mirrored onto the host router.
    pub fn mark_attached(&self, method: &str, path: &str) {
        let mut tables = self.tables.write().expect("registry lock");
        if let Some(route) = tables.http.get_mut(&route_key(method, path)) {
            route.attached = true;
        }
    }

    /// Functions subscribed to a collection's lifecycle event.
    pub fn db_triggers(&self, collection: &str, event: basalt_core::DbEvent) -> Vec<DbTrigger> {
        let tables = self.tables.read().expect("registry lock");
        tables
            .db
            .get(&db_key(collection, event))
            .cloned()
            .unwrap_or_default()
    }

    /// A function's scheduled cron jobs.
    pub fn cron_jobs(&self, function_id: &str) -> Vec<CronJob> {
        let tables = self.tables.read().expect("registry lock");
        tables.cron.get(function_id).cloned().unwrap_or_default()
    }

    /// True when no table holds any entry for `function_id`.
    pub fn is_unregistered(&self, function_id: &str) -> bool {
        let tables = self.tables.read().expect("registry lock");
        tables.http.values().all(|r| r.function_id != function_id)
            && tables
                .db
                .values()
                .all(|ts| ts.iter().all(|t| t.function_id != function_id))
            && !tables.cron.contains_key(function_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_core::DbEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_registry() -> TriggerRegistry {
        TriggerRegistry::new(Arc::new(CronScheduler::new()), Arc::new(|_| {}))
    }

    fn config(text: &str) -> TriggerConfig {
        TriggerConfig::parse(text).unwrap()
    }

    #[test]
    fn register_indexes_every_trigger_kind() {
        let registry = test_registry();
        registry
            .register(
                "fn_1",
                &config(
                    r#"{
                        "http": [{"method": "get", "path": "/ui"}],
                        "database": [{"collection": "posts", "event": "create"}],
                        "cron": [{"schedule": "*/5 * * * *"}]
                    }"#,
                ),
            )
            .unwrap();

        let route = registry.http_route("GET", "/ui").unwrap();
        assert_eq!(route.function_id, "fn_1");
        assert_eq!(route.method, "GET");

        let triggers = registry.db_triggers("posts", DbEvent::Create);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].function_id, "fn_1");

        let jobs = registry.cron_jobs("fn_1");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, "lambda_function_fn_1");
        assert_eq!(registry.scheduler().job_ids(), ["lambda_function_fn_1"]);
    }

    #[test]
    fn method_lookup_is_case_insensitive_on_registration() {
        let registry = test_registry();
        registry
            .register("fn_1", &config(r#"{"http": [{"method": "post", "path": "/x"}]}"#))
            .unwrap();

        assert!(registry.http_route("POST", "/x").is_some());
        assert!(registry.http_route("post", "/x").is_some());
        assert!(registry.http_route("GET", "/x").is_none());
    }

    #[test]
    fn colliding_routes_keep_the_last_writer() {
        let registry = test_registry();
        let c = config(r#"{"http": [{"method": "GET", "path": "/shared"}]}"#);
        registry.register("first", &c).unwrap();
        registry.register("second", &c).unwrap();

        let route = registry.http_route("GET", "/shared").unwrap();
        assert_eq!(route.function_id, "second");
    }

    #[test]
    fn multiple_functions_share_a_db_event() {
        let registry = test_registry();
        let c = config(r#"{"database": [{"collection": "posts", "event": "delete"}]}"#);
        registry.register("a", &c).unwrap();
        registry.register("b", &c).unwrap();

        let triggers = registry.db_triggers("posts", DbEvent::Delete);
        assert_eq!(triggers.len(), 2);
    }

    #[test]
    fn multiple_cron_triggers_get_indexed_job_ids() {
        let registry = test_registry();
        registry
            .register(
                "fn_1",
                &config(
                    r#"{"cron": [
                        {"schedule": "*/5 * * * *"},
                        {"schedule": "0 9 * * *"}
                    ]}"#,
                ),
            )
            .unwrap();

        let jobs = registry.cron_jobs("fn_1");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, "lambda_function_fn_1");
        assert_eq!(jobs[1].job_id, "lambda_function_fn_1_1");

        let mut scheduled = registry.scheduler().job_ids();
        scheduled.sort();
        assert_eq!(
            scheduled,
            ["lambda_function_fn_1", "lambda_function_fn_1_1"]
        );
    }

    #[test]
    fn unregister_clears_every_table() {
        let registry = test_registry();
        registry
            .register(
                "fn_1",
                &config(
                    r#"{
                        "http": [{"method": "GET", "path": "/a"}, {"method": "POST", "path": "/b"}],
                        "database": [{"collection": "posts", "event": "create"}],
                        "cron": [{"schedule": "*/5 * * * *"}]
                    }"#,
                ),
            )
            .unwrap();

        let removed = registry.unregister("fn_1");
        assert_eq!(removed.len(), 2);

        assert!(registry.is_unregistered("fn_1"));
        assert!(registry.http_route("GET", "/a").is_none());
        assert!(registry.db_triggers("posts", DbEvent::Create).is_empty());
        assert!(registry.cron_jobs("fn_1").is_empty());
        assert!(registry.scheduler().job_ids().is_empty());
    }

    #[test]
    fn unregister_leaves_other_functions_alone() {
        let registry = test_registry();
        let shared = config(r#"{"database": [{"collection": "posts", "event": "create"}]}"#);
        registry.register("keep", &shared).unwrap();
        registry.register("drop", &shared).unwrap();

        registry.unregister("drop");

        let triggers = registry.db_triggers("posts", DbEvent::Create);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].function_id, "keep");
    }

    #[test]
    fn empty_db_buckets_are_deleted() {
        let registry = test_registry();
        registry
            .register("fn_1", &config(r#"{"database": [{"collection": "posts", "event": "create"}]}"#))
            .unwrap();
        registry.unregister("fn_1");

        // The bucket itself is gone, not just empty.
        let tables = registry.tables.read().unwrap();
        assert!(!tables.db.contains_key("posts:create"));
    }

    #[test]
    fn replace_swaps_the_whole_configuration() {
        let registry = test_registry();
        registry
            .register("fn_1", &config(r#"{"http": [{"method": "GET", "path": "/a"}]}"#))
            .unwrap();

        let removed = registry
            .replace("fn_1", &config(r#"{"http": [{"method": "GET", "path": "/b"}]}"#))
            .unwrap();

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].path, "/a");
        assert!(registry.http_route("GET", "/a").is_none());
        assert!(registry.http_route("GET", "/b").is_some());
    }

    #[test]
    fn replace_equals_unregister_then_register() {
        let before = test_registry();
        before
            .register("f", &config(r#"{"http": [{"method": "GET", "path": "/old"}]}"#))
            .unwrap();
        before.unregister("f");
        before
            .register("f", &config(r#"{"http": [{"method": "GET", "path": "/new"}]}"#))
            .unwrap();

        let after = test_registry();
        after
            .register("f", &config(r#"{"http": [{"method": "GET", "path": "/old"}]}"#))
            .unwrap();
        after
            .replace("f", &config(r#"{"http": [{"method": "GET", "path": "/new"}]}"#))
            .unwrap();

        assert_eq!(
            before.http_route("GET", "/new").map(|r| r.function_id),
            after.http_route("GET", "/new").map(|r| r.function_id)
        );
        assert!(before.http_route("GET", "/old").is_none());
        assert!(after.http_route("GET", "/old").is_none());
    }

    #[test]
    fn invalid_cron_expression_leaves_tables_untouched() {
        let registry = test_registry();
        let result = registry.register(
            "fn_1",
            &config(
                r#"{
                    "http": [{"method": "GET", "path": "/ok"}],
                    "cron": [{"schedule": "definitely not cron"}]
                }"#,
            ),
        );

        assert!(result.is_err());
        assert!(registry.http_route("GET", "/ok").is_none());
        assert!(registry.is_unregistered("fn_1"));
    }

    #[test]
    fn attachment_tracking_round_trips() {
        let registry = test_registry();
        registry
            .register("fn_1", &config(r#"{"http": [{"method": "GET", "path": "/a"}]}"#))
            .unwrap();

        assert_eq!(registry.unattached_routes().len(), 1);
        registry.mark_attached("GET", "/a");
        assert!(registry.unattached_routes().is_empty());

        // A re-registered route starts unattached again.
        registry
            .replace("fn_1", &config(r#"{"http": [{"method": "GET", "path": "/a"}]}"#))
            .unwrap();
        assert_eq!(registry.unattached_routes().len(), 1);
    }

    #[tokio::test]
    async fn cron_ticks_reach_the_handler_with_the_function_id() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_c = hits.clone();
        let registry = TriggerRegistry::new(
            Arc::new(CronScheduler::new()),
            Arc::new(move |function_id: String| {
                assert_eq!(function_id, "fn_1");
                hits_c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry
            .register("fn_1", &config(r#"{"cron": [{"schedule": "* * * * * *"}]}"#))
            .unwrap();
        registry.scheduler().start();
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        registry.scheduler().stop();

        assert!(hits.load(Ordering::SeqCst) >= 1);
    }
}
