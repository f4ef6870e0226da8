//! Metrics collection for club-service.
//!
//! Counters for permission changes and recorded attendance, plus whatever
//! the `metrics` recorder collects.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static PERMISSION_CHANGES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ATTENDANCE_RECORDS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize metrics collection. Called once from the binary.
pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }

    let registry = Registry::new();

    let permission_changes = IntCounterVec::new(
        Opts::new(
            "club_permission_changes_total",
            "Permission records written, by target type and action",
        ),
        &["target", "action"],
    )
    .expect("Failed to create club_permission_changes_total metric");

    let attendance_records = IntCounterVec::new(
        Opts::new(
            "club_attendance_records_total",
            "Attendance records written, by status",
        ),
        &["status"],
    )
    .expect("Failed to create club_attendance_records_total metric");

    registry
        .register(Box::new(permission_changes.clone()))
        .expect("Failed to register club_permission_changes_total");
    registry
        .register(Box::new(attendance_records.clone()))
        .expect("Failed to register club_attendance_records_total");

    PROMETHEUS_REGISTRY
        .set(registry)
        .expect("Failed to set prometheus registry");
    PERMISSION_CHANGES_TOTAL
        .set(permission_changes)
        .expect("Failed to set club_permission_changes_total");
    ATTENDANCE_RECORDS_TOTAL
        .set(attendance_records)
        .expect("Failed to set club_attendance_records_total");
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

pub fn record_permission_change(target: &str, action: &str) {
    metrics::counter!("club_permission_mutations", "target" => target.to_string()).increment(1);
    if let Some(counter) = PERMISSION_CHANGES_TOTAL.get() {
        counter.with_label_values(&[target, action]).inc();
    }
}

pub fn record_attendance(status: &str) {
    if let Some(counter) = ATTENDANCE_RECORDS_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}
