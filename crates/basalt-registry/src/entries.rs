//! Runtime entries held in the trigger tables.

use basalt_core::DbEvent;

/// One HTTP route owned by a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRoute {
    pub function_id: String,
    /// Upper-cased HTTP method.
    pub method: String,
    /// Path exactly as configured; no prefix is imposed.
    pub path: String,
    /// Whether this route has been mirrored onto the host router yet.
    pub attached: bool,
}

impl HttpRoute {
    /// Key in the HTTP table, `"METHOD:path"`.
    pub fn table_key(&self) -> String {
        route_key(&self.method, &self.path)
    }
}

/// Build the HTTP table key for a method + path pair.
pub fn route_key(method: &str, path: &str) -> String {
    format!("{}:{}", method.to_uppercase(), path)
}

/// One database trigger subscription owned by a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbTrigger {
    pub function_id: String,
    pub collection: String,
    pub event: DbEvent,
}

impl DbTrigger {
    /// Key in the DB table, `"collection:event"`.
    pub fn table_key(&self) -> String {
        db_key(&self.collection, self.event)
    }
}

/// Build the DB table key for a collection + event pair.
pub fn db_key(collection: &str, event: DbEvent) -> String {
    format!("{collection}:{event}")
}

/// One scheduled cron job owned by a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJob {
    pub function_id: String,
    pub schedule: String,
    /// Scheduler job id: `lambda_function_<id>` for a function's first
    /// cron trigger, `lambda_function_<id>_<n>` for the rest.
    pub job_id: String,
}

/// Build the scheduler job id for the nth cron trigger of a function.
pub fn cron_job_id(function_id: &str, index: usize) -> String {
    if index == 0 {
        format!("lambda_function_{function_id}")
    } else {
        format!("lambda_function_{function_id}_{index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_key_upcases_the_method() {
        assert_eq!(route_key("get", "/ui"), "GET:/ui");
        assert_eq!(route_key("POST", "/api/x"), "POST:/api/x");
    }

    #[test]
    fn db_key_joins_collection_and_event() {
        assert_eq!(db_key("posts", DbEvent::Update), "posts:update");
    }

    #[test]
    fn cron_job_ids_are_indexed_after_the_first() {
        assert_eq!(cron_job_id("abc", 0), "lambda_function_abc");
        assert_eq!(cron_job_id("abc", 1), "lambda_function_abc_1");
        assert_eq!(cron_job_id("abc", 2), "lambda_function_abc_2");
    }
}
