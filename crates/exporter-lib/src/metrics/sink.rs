//! Shared output channel for collected samples

use super::MetricSample;
use tokio::sync::mpsc;
use tracing::debug;

/// Create a connected sink/stream pair
pub fn channel() -> (MetricSink, MetricStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MetricSink { tx }, MetricStream { rx })
}

/// Write side, cloned into every collector task
///
/// Each [`MetricSink::emit`] call delivers one batch as a single message, so
/// a resource's metrics are never interleaved with another resource's.
#[derive(Debug, Clone)]
pub struct MetricSink {
    tx: mpsc::UnboundedSender<Vec<MetricSample>>,
}

impl MetricSink {
    /// Send a complete batch
    pub fn emit(&self, batch: Vec<MetricSample>) {
        if batch.is_empty() {
            return;
        }
        if self.tx.send(batch).is_err() {
            debug!("Metric stream closed, dropping batch");
        }
    }
}

/// Read side, owned by the scrape that created the channel
#[derive(Debug)]
pub struct MetricStream {
    rx: mpsc::UnboundedReceiver<Vec<MetricSample>>,
}

impl MetricStream {
    /// Receive batches until every sink has been dropped
    pub async fn collect_all(mut self) -> Vec<MetricSample> {
        let mut samples = Vec::new();
        while let Some(batch) = self.rx.recv().await {
            samples.extend(batch);
        }
        samples
    }

    /// Receive the batches that are already queued
    pub fn drain_batches(&mut self) -> Vec<Vec<MetricSample>> {
        let mut batches = Vec::new();
        while let Ok(batch) = self.rx.try_recv() {
            batches.push(batch);
        }
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::GaugeDesc;

    const G: GaugeDesc = GaugeDesc::new("g", "g", &["id"]);

    #[tokio::test]
    async fn test_concurrent_writers_keep_batches_whole() {
        let (sink, stream) = channel();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16 {
            let sink = sink.clone();
            tasks.spawn(async move {
                let id = i.to_string();
                sink.emit((0..4).map(|_| G.sample(i as f64, &[&id])).collect());
            });
        }
        drop(sink);
        while tasks.join_next().await.is_some() {}

        let samples = stream.collect_all().await;
        assert_eq!(samples.len(), 64);
        for chunk in samples.chunks(4) {
            assert!(chunk.iter().all(|s| s.label("id") == chunk[0].label("id")));
        }
    }

    #[tokio::test]
    async fn test_empty_batches_are_not_sent() {
        let (sink, mut stream) = channel();
        sink.emit(Vec::new());
        sink.emit(vec![G.sample(1.0, &["a"])]);

        let batches = stream.drain_batches();
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn test_emit_after_stream_dropped_is_ignored() {
        let (sink, stream) = channel();
        drop(stream);
        sink.emit(vec![G.sample(1.0, &["a"])]);
    }
}
