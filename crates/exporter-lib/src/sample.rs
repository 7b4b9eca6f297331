//! Monitor sample selection
//!
//! The upstream API keeps revising its newest data point for a while after
//! it is first reported, so the newest sample in a batch is never exposed.
//! The value we report is the newest *settled* one: the second-most-recent
//! sample once the batch is ordered by time.

use crate::models::MonitorSample;

/// Minimum batch size needed before a settled sample exists
pub const MIN_SAMPLES: usize = 2;

/// Select the latest settled sample from an unordered batch
///
/// Returns `None` when the batch holds fewer than [`MIN_SAMPLES`] samples.
/// Absence is not an error: callers skip the series for this cycle.
pub fn latest_settled<V>(mut samples: Vec<MonitorSample<V>>) -> Option<MonitorSample<V>> {
    if samples.len() < MIN_SAMPLES {
        return None;
    }

    samples.sort_by(|a, b| b.time.cmp(&a.time));
    samples.into_iter().nth(1)
}
