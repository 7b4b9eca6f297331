//! One scrape across every enabled collector
//!
//! Collectors run concurrently, each in its own task with its own
//! [`CollectContext`], all writing into one sink. The scrape finishes when
//! every collector has returned. Dropping the scrape future aborts the
//! collector tasks along with their per-resource tasks.

use crate::collector::{template::MONITOR_WINDOW_MINUTES, CollectContext, Collector, UpstreamFaults};
use crate::metrics::{channel, MetricSample};
use crate::models::MonitorWindow;
use crate::observability::{ErrorCounter, StructuredLogger};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// How one collector fared during a scrape
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorReport {
    pub collector: &'static str,
    pub failures: u64,
    pub upstream: UpstreamFaults,
    pub duration: Duration,
}

/// Everything gathered by one scrape
#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    pub samples: Vec<MetricSample>,
    pub reports: Vec<CollectorReport>,
}

impl ScrapeOutcome {
    /// Upstream failures summed over every collector
    pub fn upstream_faults(&self) -> UpstreamFaults {
        self.reports
            .iter()
            .fold(UpstreamFaults::default(), |total, r| total.merge(r.upstream))
    }
}

/// The enabled collectors plus the collaborators they share
pub struct CollectorSet {
    collectors: Vec<Arc<dyn Collector>>,
    zones: Arc<[String]>,
    errors: Arc<dyn ErrorCounter>,
    logger: StructuredLogger,
}

impl CollectorSet {
    pub fn new(
        collectors: Vec<Arc<dyn Collector>>,
        zones: Vec<String>,
        errors: Arc<dyn ErrorCounter>,
    ) -> Self {
        Self {
            collectors,
            zones: zones.into(),
            errors,
            logger: StructuredLogger::new("sakuracloud-exporter"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    /// Run every collector once and gather their output
    pub async fn scrape(&self) -> ScrapeOutcome {
        let (sink, stream) = channel();
        let window = MonitorWindow::trailing(ChronoDuration::minutes(MONITOR_WINDOW_MINUTES));

        let mut tasks = JoinSet::new();
        for collector in &self.collectors {
            let collector = Arc::clone(collector);
            let ctx = CollectContext::new(
                collector.name(),
                Arc::clone(&self.zones),
                sink.clone(),
                Arc::clone(&self.errors),
            )
            .with_window(window)
            .with_logger(self.logger.clone());

            tasks.spawn(async move {
                let started = Instant::now();
                collector.collect(&ctx).await;
                CollectorReport {
                    collector: collector.name(),
                    failures: ctx.failures(),
                    upstream: ctx.upstream_faults(),
                    duration: started.elapsed(),
                }
            });
        }
        drop(sink);

        let mut reports = Vec::with_capacity(self.collectors.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    debug!(
                        collector = report.collector,
                        failures = report.failures,
                        duration_ms = report.duration.as_millis() as u64,
                        "Collector finished"
                    );
                    reports.push(report);
                }
                Err(e) => warn!(error = %e, "Collector task did not finish"),
            }
        }

        ScrapeOutcome {
            samples: stream.collect_all().await,
            reports,
        }
    }
}
