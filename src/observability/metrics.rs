//! Metrics collection.
//!
//! Prometheus-compatible metrics for the tick pipeline. Every `record_*`
//! function is a no-op until [`init_metrics`] installs a recorder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::TimekeeperError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Operations that can be forwarded to the owner thread.
///
/// Anything else is bucketed as `"__unknown__"`.
const KNOWN_OPERATIONS: [&str; 10] = [
    "set_timer",
    "set_timer_next_tick",
    "set_timer_async",
    "invalidate_timer",
    "pause_timer",
    "unpause_timer",
    "unpause_timer_deferred",
    "invalidate_all",
    "pause_all",
    "unpause_all",
];

/// Sanitizes an operation name for use as a metrics label.
#[must_use]
pub fn sanitize_operation_label(operation: &str) -> &str {
    if KNOWN_OPERATIONS.contains(&operation) {
        operation
    } else {
        "__unknown__"
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without
/// an HTTP endpoint.
///
/// # Errors
///
/// Returns `TimekeeperError::Metrics` if the recorder or HTTP listener
/// cannot be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), TimekeeperError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| TimekeeperError::Metrics(e.to_string()))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "timekeeper_timers_fired_total",
        "Total number of timer callbacks attempted"
    );
    describe_counter!("timekeeper_ticks_total", "Total number of completed ticks");
    describe_histogram!(
        "timekeeper_tick_duration_ms",
        "Wall-clock tick duration in milliseconds"
    );
    describe_gauge!(
        "timekeeper_active_timers",
        "Live timers after the last tick"
    );
    describe_gauge!(
        "timekeeper_timers_processed",
        "Timers advanced in running state by the last tick"
    );
    describe_counter!(
        "timekeeper_deferred_calls_total",
        "Timer API calls forwarded to the owner thread"
    );
}

/// Records one completed tick.
#[allow(clippy::cast_precision_loss)]
pub fn record_tick(duration: Duration, processed: usize, fired: usize, active: usize) {
    counter!("timekeeper_ticks_total").increment(1);
    counter!("timekeeper_timers_fired_total").increment(fired as u64);
    histogram!("timekeeper_tick_duration_ms").record(duration.as_secs_f64() * 1000.0);
    gauge!("timekeeper_timers_processed").set(processed as f64);
    gauge!("timekeeper_active_timers").set(active as f64);
}

/// Records a call forwarded to the owner thread.
pub fn record_deferred_call(operation: &str) {
    let label = sanitize_operation_label(operation);
    counter!("timekeeper_deferred_calls_total", "operation" => label.to_owned()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_known_operations() {
        for op in &KNOWN_OPERATIONS {
            assert_eq!(sanitize_operation_label(op), *op);
        }
    }

    #[test]
    fn sanitize_unknown_operation() {
        assert_eq!(sanitize_operation_label("drop_tables"), "__unknown__");
        assert_eq!(sanitize_operation_label(""), "__unknown__");
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_tick(Duration::from_micros(80), 3, 1, 5);
        record_deferred_call("set_timer");
        record_deferred_call("bogus");
    }
}
