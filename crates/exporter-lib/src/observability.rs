//! Observability infrastructure for the exporter itself
//!
//! Provides:
//! - Prometheus metrics (per-collector error counters, collection latency, build info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for collector latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ExporterMetricsInner> = OnceLock::new();

/// Sink for collection failures, one counter per collector
pub trait ErrorCounter: Send + Sync {
    fn increment(&self, collector: &str);
}

/// Inner metrics structure that holds the actual Prometheus metrics
struct ExporterMetricsInner {
    errors_total: IntCounterVec,
    collector_duration_seconds: HistogramVec,
    build_info: GaugeVec,
}

impl ExporterMetricsInner {
    fn new() -> Self {
        Self {
            errors_total: register_int_counter_vec!(
                "sakuracloud_exporter_errors_total",
                "The total number of errors per collector",
                &["collector"]
            )
            .expect("Failed to register errors_total"),

            collector_duration_seconds: register_histogram_vec!(
                "sakuracloud_exporter_collector_duration_seconds",
                "Time spent by each collector during one scrape",
                &["collector"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register collector_duration_seconds"),

            build_info: register_gauge_vec!(
                "sakuracloud_exporter_build_info",
                "A metric with a constant '1' value labeled by exporter version",
                &["version"]
            )
            .expect("Failed to register build_info"),
        }
    }
}

/// Exporter metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ExporterMetrics {
    _private: (),
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExporterMetricsInner {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new)
    }

    /// Pre-create the error series so every collector reports 0 before its first failure
    pub fn init_collector(&self, collector: &str) {
        self.inner().errors_total.with_label_values(&[collector]);
    }

    /// Current error count of a collector
    pub fn errors(&self, collector: &str) -> u64 {
        self.inner()
            .errors_total
            .with_label_values(&[collector])
            .get()
    }

    /// Record how long a collector took during one scrape
    pub fn observe_collector_duration(&self, collector: &str, duration_secs: f64) {
        self.inner()
            .collector_duration_seconds
            .with_label_values(&[collector])
            .observe(duration_secs);
    }

    pub fn set_build_info(&self, version: &str) {
        self.inner().build_info.reset();
        self.inner()
            .build_info
            .with_label_values(&[version])
            .set(1.0);
    }
}

impl ErrorCounter for ExporterMetrics {
    fn increment(&self, collector: &str) {
        self.inner().errors_total.with_label_values(&[collector]).inc();
    }
}

/// Structured logger for exporter events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log exporter startup
    pub fn log_startup(&self, version: &str, account_id: &str, zones: &[String]) {
        info!(
            event = "exporter_started",
            instance = %self.instance,
            exporter_version = %version,
            account_id = %account_id,
            zones = %zones.join(","),
            "sakuracloud-exporter started"
        );
    }

    /// Log exporter shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            instance = %self.instance,
            reason = %reason,
            "sakuracloud-exporter shutting down"
        );
    }

    /// Log a collection failure for one collector
    ///
    /// `subject` names what was being queried, a zone list or a resource ID.
    pub fn log_collection_failure(&self, collector: &str, stage: &str, subject: &str, error: &str) {
        warn!(
            event = "collection_failed",
            instance = %self.instance,
            collector = %collector,
            stage = %stage,
            subject = %subject,
            error = %error,
            "Collection failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_metrics_creation() {
        // Metrics live in the global registry, so repeated handles must share them.
        let metrics = ExporterMetrics::new();
        let other = ExporterMetrics::new();

        metrics.init_collector("observability_test");
        let before = other.errors("observability_test");
        metrics.increment("observability_test");
        assert_eq!(other.errors("observability_test"), before + 1);

        metrics.observe_collector_duration("observability_test", 0.2);
        metrics.set_build_info("0.0.0-test");
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance, "test-instance");
    }
}
