//! Shared collection cycle
//!
//! Every resource kind runs the same cycle: list across zones, enrich each
//! resource in its own task, emit the resource's metrics as one batch. The
//! pieces live on [`CollectContext`] so a kind only supplies its queries and
//! its metric mapping.

use crate::cache::{DailyRefresh, ExpiringCache};
use crate::client::ApiError;
use crate::fanout::query_zones;
use crate::metrics::{MetricSample, MetricSink};
use crate::models::{MonitorSample, MonitorWindow, Zoned};
use crate::observability::{ErrorCounter, StructuredLogger};
use crate::sample::latest_settled;
use chrono::{Duration, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Length of the trailing window requested from monitor endpoints
pub const MONITOR_WINDOW_MINUTES: i64 = 60;

/// Upstream API failures seen during one collector run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpstreamFaults {
    /// Requests refused because of the credentials (401/403)
    pub rejected: u64,
    /// Requests that got no answer or a 5xx
    pub unavailable: u64,
}

impl UpstreamFaults {
    pub fn merge(self, other: UpstreamFaults) -> Self {
        Self {
            rejected: self.rejected + other.rejected,
            unavailable: self.unavailable + other.unavailable,
        }
    }
}

#[derive(Default)]
struct Tally {
    failures: AtomicU64,
    rejected: AtomicU64,
    unavailable: AtomicU64,
}

/// Per-scrape state handed to one collector
///
/// Cheap to clone; clones share the failure tally, the sink and the counter.
#[derive(Clone)]
pub struct CollectContext {
    collector: &'static str,
    zones: Arc<[String]>,
    sink: MetricSink,
    errors: Arc<dyn ErrorCounter>,
    tally: Arc<Tally>,
    window: MonitorWindow,
    logger: StructuredLogger,
}

impl CollectContext {
    pub fn new(
        collector: &'static str,
        zones: Arc<[String]>,
        sink: MetricSink,
        errors: Arc<dyn ErrorCounter>,
    ) -> Self {
        Self {
            collector,
            zones,
            sink,
            errors,
            tally: Arc::new(Tally::default()),
            window: MonitorWindow::trailing(Duration::minutes(MONITOR_WINDOW_MINUTES)),
            logger: StructuredLogger::new(collector),
        }
    }

    pub fn with_window(mut self, window: MonitorWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn collector(&self) -> &'static str {
        self.collector
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    pub fn window(&self) -> MonitorWindow {
        self.window
    }

    /// Failures recorded through this context (and its clones) so far
    pub fn failures(&self) -> u64 {
        self.tally.failures.load(Ordering::Relaxed)
    }

    pub fn upstream_faults(&self) -> UpstreamFaults {
        UpstreamFaults {
            rejected: self.tally.rejected.load(Ordering::Relaxed),
            unavailable: self.tally.unavailable.load(Ordering::Relaxed),
        }
    }

    pub fn emit(&self, batch: Vec<MetricSample>) {
        self.sink.emit(batch);
    }

    /// Count and log one failed query
    pub fn record_failure(&self, stage: &str, subject: &str, error: &anyhow::Error) {
        self.errors.increment(self.collector);
        self.tally.failures.fetch_add(1, Ordering::Relaxed);
        self.note_upstream(error);
        self.logger
            .log_collection_failure(self.collector, stage, subject, &format!("{error:#}"));
    }

    fn note_upstream(&self, error: &anyhow::Error) {
        let Some(api) = error.chain().find_map(|cause| cause.downcast_ref::<ApiError>()) else {
            return;
        };
        if api.is_unauthorized() {
            self.tally.rejected.fetch_add(1, Ordering::Relaxed);
        } else if api.is_unavailable() {
            self.tally.unavailable.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// List resources across the configured zones
    ///
    /// `None` means at least one zone failed. The failure is counted once and
    /// the caller must abandon this cycle.
    pub async fn list_all<T, E, F, Fut>(&self, query: F) -> Option<Vec<Zoned<T>>>
    where
        T: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
    {
        let zones = Arc::clone(&self.zones);
        self.list_in(&zones, query).await
    }

    /// Like [`list_all`](Self::list_all) but against an explicit zone set
    pub async fn list_in<T, E, F, Fut>(&self, zones: &[String], query: F) -> Option<Vec<Zoned<T>>>
    where
        T: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
    {
        let results = query_zones(zones, query).await;

        if let Some(first) = results.first_error() {
            let failed: Vec<&str> = results.errors.iter().map(|e| e.zone.as_str()).collect();
            self.record_failure("list", &failed.join(","), &first.error);
            for other in &results.errors[1..] {
                self.note_upstream(&other.error);
            }
            return None;
        }

        debug!(
            collector = self.collector,
            count = results.items.len(),
            "Listed resources"
        );
        Some(results.items)
    }

    /// Enrich every resource concurrently and emit one batch per resource
    ///
    /// Returns once all resource tasks have finished. Dropping the returned
    /// future aborts the tasks still running.
    pub async fn for_each_resource<T, F, Fut>(&self, resources: Vec<Zoned<T>>, enrich: F)
    where
        T: Send + 'static,
        F: Fn(CollectContext, Zoned<T>) -> Fut,
        Fut: Future<Output = Vec<MetricSample>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for resource in resources {
            let ctx = self.clone();
            let pending = enrich(self.clone(), resource);
            tasks.spawn(async move {
                let batch = pending.await;
                ctx.emit(batch);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                self.record_failure("enrich", "unknown", &anyhow::Error::from(e));
            }
        }
    }

    /// Run a sub-query, counting and logging a failure instead of returning it
    pub async fn fetch<T, E, Fut>(&self, stage: &str, subject: &str, query: Fut) -> Option<T>
    where
        E: Into<anyhow::Error>,
        Fut: Future<Output = Result<T, E>>,
    {
        match query.await {
            Ok(value) => Some(value),
            Err(e) => {
                self.record_failure(stage, subject, &e.into());
                None
            }
        }
    }

    /// Run a monitor query and keep its latest settled sample
    pub async fn settled<V, E, Fut>(
        &self,
        stage: &str,
        subject: &str,
        query: Fut,
    ) -> Option<MonitorSample<V>>
    where
        E: Into<anyhow::Error>,
        Fut: Future<Output = Result<Vec<MonitorSample<V>>, E>>,
    {
        self.fetch(stage, subject, query)
            .await
            .and_then(latest_settled)
    }

    /// Serve an account-scoped value from `cache`, refilling it on a miss
    ///
    /// A refilled value is kept until the next `refresh` instant.
    pub async fn cached<T, E, Fut>(
        &self,
        cache: &ExpiringCache<T>,
        refresh: &DailyRefresh,
        stage: &str,
        query: Fut,
    ) -> Option<T>
    where
        T: Clone + Send + 'static,
        E: Into<anyhow::Error>,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = cache.get().await {
            return Some(hit);
        }

        let fresh = self.fetch(stage, "account", query).await?;
        let expires_at = refresh.next_after(Utc::now());
        if let Err(e) = cache.set(Some(fresh.clone()), expires_at).await {
            warn!(collector = self.collector, error = %e, "Failed to cache value");
        } else {
            debug!(collector = self.collector, expires_at = %expires_at, "Cached value");
        }
        Some(fresh)
    }
}

/// Join tags into the `,a,b,` form used by `*_info` labels
pub fn flatten_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let mut sorted: Vec<&str> = tags.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!(",{},", sorted.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{channel, GaugeDesc};
    use crate::models::CpuTimeValue;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    const G: GaugeDesc = GaugeDesc::new("test_gauge", "Test gauge", &["id", "zone"]);

    #[derive(Default)]
    struct CountingErrors(Mutex<Vec<String>>);

    impl ErrorCounter for CountingErrors {
        fn increment(&self, collector: &str) {
            self.0.lock().unwrap().push(collector.to_string());
        }
    }

    fn context(zones: &[&str]) -> (CollectContext, Arc<CountingErrors>, crate::metrics::MetricStream) {
        let (sink, stream) = channel();
        let errors = Arc::new(CountingErrors::default());
        let zones: Arc<[String]> = zones.iter().map(|z| z.to_string()).collect();
        let ctx = CollectContext::new("test", zones, sink, errors.clone());
        (ctx, errors, stream)
    }

    #[tokio::test]
    async fn test_list_failure_counts_once() {
        let (ctx, errors, _stream) = context(&["is1a", "is1b", "tk1a"]);

        let listed = ctx
            .list_all(|zone| async move {
                if zone == "tk1a" {
                    Ok(vec![1])
                } else {
                    Err(anyhow::anyhow!("down"))
                }
            })
            .await;

        assert!(listed.is_none());
        assert_eq!(errors.0.lock().unwrap().as_slice(), ["test"]);
        assert_eq!(ctx.failures(), 1);
    }

    #[tokio::test]
    async fn test_list_success_tags_zone() {
        let (ctx, errors, _stream) = context(&["is1a", "tk1a"]);

        let mut listed = ctx
            .list_all(|zone| async move { Ok::<_, anyhow::Error>(vec![format!("r-{zone}")]) })
            .await
            .unwrap();
        listed.sort_by(|a, b| a.zone.cmp(&b.zone));

        assert_eq!(listed[0].zone, "is1a");
        assert_eq!(listed[1].resource, "r-tk1a");
        assert!(errors.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_each_resource_emits_one_batch() {
        let (ctx, _errors, mut stream) = context(&["is1a"]);
        let resources = vec![
            Zoned { zone: "is1a".into(), resource: "a".to_string() },
            Zoned { zone: "is1a".into(), resource: "b".to_string() },
        ];

        ctx.for_each_resource(resources, |_ctx, r| async move {
            vec![
                G.sample(1.0, &[&r.resource, &r.zone]),
                G.sample(2.0, &[&r.resource, &r.zone]),
            ]
        })
        .await;

        let batches = stream.drain_batches();
        assert_eq!(batches.len(), 2);
        for batch in batches {
            assert_eq!(batch.len(), 2);
            assert_eq!(batch[0].label("id"), batch[1].label("id"));
        }
    }

    #[tokio::test]
    async fn test_settled_failure_is_counted_and_skipped() {
        let (ctx, errors, _stream) = context(&["is1a"]);

        let sample = ctx
            .settled::<CpuTimeValue, _, _>("cpu_time", "123", async {
                Err::<Vec<MonitorSample<CpuTimeValue>>, _>(anyhow::anyhow!("timeout"))
            })
            .await;

        assert!(sample.is_none());
        assert_eq!(errors.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settled_short_batch_is_silent() {
        let (ctx, errors, _stream) = context(&["is1a"]);
        let only = MonitorSample::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            CpuTimeValue { cpu_time: 1.0 },
        );

        let sample = ctx
            .settled("cpu_time", "123", async move { Ok::<_, anyhow::Error>(vec![only]) })
            .await;

        assert!(sample.is_none());
        assert!(errors.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cached_queries_once_until_expiry() {
        let (ctx, errors, _stream) = context(&["is1a"]);
        let cache = ExpiringCache::new(std::time::Duration::from_secs(60));
        let refresh = DailyRefresh::billing();
        let calls = AtomicU64::new(0);

        for _ in 0..3 {
            let value = ctx
                .cached(&cache, &refresh, "bill", async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(vec![1, 2, 3])
                })
                .await;
            assert_eq!(value, Some(vec![1, 2, 3]));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(errors.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cached_failure_is_not_stored() {
        let (ctx, errors, _stream) = context(&["is1a"]);
        let cache: ExpiringCache<Vec<i32>> = ExpiringCache::new(std::time::Duration::from_secs(60));
        let refresh = DailyRefresh::billing();

        let value = ctx
            .cached(&cache, &refresh, "bill", async { Err::<Vec<i32>, _>(anyhow::anyhow!("unavailable")) })
            .await;

        assert!(value.is_none());
        assert!(cache.get().await.is_none());
        assert_eq!(errors.0.lock().unwrap().len(), 1);
    }

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            path: "/server".into(),
            status: code,
            message: "denied".into(),
        }
    }

    #[tokio::test]
    async fn test_upstream_faults_follow_api_status() {
        let (ctx, errors, _stream) = context(&["is1a"]);

        ctx.fetch("status", "1", async { Err::<(), _>(status(401)) }).await;
        ctx.fetch("status", "2", async { Err::<(), _>(status(503)) }).await;
        ctx.fetch("status", "3", async { Err::<(), _>(status(404)) }).await;
        ctx.fetch("status", "4", async { Err::<(), _>(anyhow::anyhow!("no such field")) })
            .await;

        assert_eq!(ctx.failures(), 4);
        assert_eq!(errors.0.lock().unwrap().len(), 4);
        assert_eq!(
            ctx.upstream_faults(),
            UpstreamFaults {
                rejected: 1,
                unavailable: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_list_notes_every_rejected_zone() {
        let (ctx, _errors, _stream) = context(&["is1a", "is1b", "tk1a"]);

        let listed = ctx
            .list_all(|zone| async move {
                match zone.as_str() {
                    "tk1a" => Ok(vec![1]),
                    _ => Err(status(403)),
                }
            })
            .await;

        assert!(listed.is_none());
        assert_eq!(ctx.failures(), 1);
        assert_eq!(ctx.upstream_faults().rejected, 2);
        assert_eq!(ctx.upstream_faults().unavailable, 0);
    }

    struct DropFlag(Arc<std::sync::atomic::AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dropping_cycle_aborts_resource_tasks() {
        let (ctx, _errors, mut stream) = context(&["is1a"]);
        let dropped = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let resources = vec![Zoned { zone: "is1a".into(), resource: 1u32 }];

        let flag = Arc::clone(&dropped);
        let cycle = ctx.for_each_resource(resources, move |_ctx, _item| {
            let guard = DropFlag(Arc::clone(&flag));
            async move {
                let _guard = guard;
                std::future::pending::<()>().await;
                Vec::new()
            }
        });

        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(50), cycle).await;
        assert!(timed_out.is_err());

        for _ in 0..100 {
            if dropped.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(dropped.load(Ordering::SeqCst));
        assert!(stream.drain_batches().is_empty());
    }

    #[test]
    fn test_flatten_tags_sorted() {
        let tags = vec!["web".to_string(), "app".to_string()];
        assert_eq!(flatten_tags(&tags), ",app,web,");
        assert_eq!(flatten_tags(&[]), "");
    }
}
