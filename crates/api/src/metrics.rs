//! Prometheus metrics for the sync engine and webhook-channel lifecycle.

use metrics::counter;

/// Metric names.
pub mod names {
    pub const SYNC_RUNS: &str = "calendar_sync_runs_total";
    pub const SYNC_EVENTS_WRITTEN: &str = "calendar_sync_events_written_total";
    pub const SYNC_FUTURE_INSTANCE_RUNS: &str = "calendar_sync_future_instance_runs_total";
    pub const WATCH_STARTS: &str = "calendar_watch_starts_total";
    pub const WATCH_STOPS: &str = "calendar_watch_stops_total";
    pub const WEBHOOK_DELIVERIES: &str = "calendar_webhook_deliveries_total";
}

/// Record a completed `Sync` run for one calendar.
pub fn record_sync(calendar_id: &str, updated_event_count: u64) {
    counter!(names::SYNC_RUNS, "calendar_id" => calendar_id.to_string()).increment(1);
    counter!(names::SYNC_EVENTS_WRITTEN, "calendar_id" => calendar_id.to_string())
        .increment(updated_event_count);
}

/// Record a failed `Sync` run.
pub fn record_sync_failed(calendar_id: &str) {
    counter!(names::SYNC_RUNS, "calendar_id" => calendar_id.to_string(), "status" => "failure")
        .increment(1);
}

pub fn record_sync_future_instance_all(updated_event_count: u64) {
    counter!(names::SYNC_FUTURE_INSTANCE_RUNS).increment(1);
    counter!(names::SYNC_EVENTS_WRITTEN, "calendar_id" => "*").increment(updated_event_count);
}

pub fn record_watch_start(calendar_id: &str) {
    counter!(names::WATCH_STARTS, "calendar_id" => calendar_id.to_string()).increment(1);
}

pub fn record_watch_stop(calendar_id: &str) {
    counter!(names::WATCH_STOPS, "calendar_id" => calendar_id.to_string()).increment(1);
}

/// Record an inbound webhook delivery, tagged by whether it was acted on
/// (`resourceState=exists`) or skipped.
pub fn record_webhook_delivery(resource_state: &str, acted_on: bool) {
    counter!(
        names::WEBHOOK_DELIVERIES,
        "resource_state" => resource_state.to_string(),
        "acted_on" => acted_on.to_string()
    )
    .increment(1);
}

/// Initialize the Prometheus metrics exporter. Returns a handle that
/// `routes::prometheus::metrics` renders on `/metrics`.
pub fn init_metrics() -> metrics_exporter_prometheus::PrometheusHandle {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    builder
        .install_recorder()
        .expect("failed to install Prometheus metrics recorder")
}
