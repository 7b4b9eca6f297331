//! Zone fan-out queries
//!
//! Runs one query per zone concurrently and merges whatever came back.
//! A failing zone does not discard the other zones' items: the caller gets
//! the merged items *and* the errors, and decides what to do with both.

use crate::models::Zoned;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::debug;

/// Failure of a single zone query
#[derive(Debug, thiserror::Error)]
#[error("zone {zone}: {error:#}")]
pub struct ZoneError {
    pub zone: String,
    pub error: anyhow::Error,
}

/// Merged outcome of a zone fan-out
#[derive(Debug)]
pub struct ZoneResults<T> {
    /// Items from every zone that answered, in completion order
    pub items: Vec<Zoned<T>>,
    /// One entry per zone that failed
    pub errors: Vec<ZoneError>,
}

impl<T> Default for ZoneResults<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> ZoneResults<T> {
    /// The first error observed, if any zone failed
    pub fn first_error(&self) -> Option<&ZoneError> {
        self.errors.first()
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Invoke `query` once per zone, one task per zone, and merge the results
pub async fn query_zones<T, E, F, Fut>(zones: &[String], query: F) -> ZoneResults<T>
where
    T: Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
{
    let mut results = ZoneResults::default();
    if zones.is_empty() {
        return results;
    }

    let mut tasks = JoinSet::new();
    for zone in zones {
        let pending = query(zone.clone());
        let zone = zone.clone();
        tasks.spawn(async move { (zone, pending.await) });
    }

    // A task that panicked no longer knows its zone: it is whichever zone
    // never answered.
    let mut unanswered: Vec<&String> = zones.iter().collect();
    let mut lost = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        let (zone, outcome) = match joined {
            Ok(answer) => answer,
            Err(e) => {
                lost.push(e);
                continue;
            }
        };
        if let Some(pos) = unanswered.iter().position(|z| **z == zone) {
            unanswered.swap_remove(pos);
        }
        match outcome {
            Ok(items) => {
                debug!(zone = %zone, count = items.len(), "Zone query complete");
                results.items.extend(items.into_iter().map(|resource| Zoned {
                    zone: zone.clone(),
                    resource,
                }));
            }
            Err(e) => results.errors.push(ZoneError {
                zone,
                error: e.into(),
            }),
        }
    }

    for (zone, e) in unanswered.into_iter().zip(lost) {
        results.errors.push(ZoneError {
            zone: zone.clone(),
            error: anyhow::anyhow!("zone query task failed: {e}"),
        });
    }

    results
}
