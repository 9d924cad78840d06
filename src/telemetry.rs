//! Telemetry logic.
//! Support metrics and logging.
//!
//! Metrics go through the [`metrics`] facade. No recorder is installed here:
//! an application embedding the crate installs its own (for instance a
//! Prometheus exporter) and calls [`describe_metrics`] once. Without one,
//! recording is a no-op.

use std::time::Instant;

use metrics::Unit;
use tracing_subscriber::EnvFilter;

use crate::error::Result;

const OPERATIONS_TOTAL: &str = "directory_operations_total";
const OPERATIONS_DURATION: &str = "directory_operations_duration_seconds";

/// Describe metrics recorded by the facade.
///
/// Call after installing a recorder, descriptions sent before are lost.
pub fn describe_metrics() {
    metrics::describe_counter!(
        OPERATIONS_TOTAL,
        Unit::Count,
        "Directory operations performed, by operation and outcome."
    );
    metrics::describe_histogram!(
        OPERATIONS_DURATION,
        Unit::Seconds,
        "Duration of directory operations, connection included."
    );
}

/// Install a formatting subscriber filtered by `RUST_LOG`.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Record metrics and a log line for one facade operation.
pub fn track<T>(operation: &'static str, start: Instant, outcome: &Result<T>) {
    let latency = start.elapsed().as_secs_f64();
    let status = match outcome {
        Ok(_) => "ok",
        Err(err) => err.kind(),
    };

    match outcome {
        Ok(_) => tracing::debug!(operation, latency, "directory operation succeeded"),
        Err(error) => tracing::info!(operation, latency, %error, "directory operation failed"),
    }

    let labels = [("operation", operation), ("status", status)];
    metrics::counter!(OPERATIONS_TOTAL, &labels).increment(1);
    metrics::histogram!(OPERATIONS_DURATION, &labels).record(latency);
}
