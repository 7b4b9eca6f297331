//! Flat metric model produced by the collectors
//!
//! Collectors never build Prometheus types directly. They describe each
//! gauge once with a [`GaugeDesc`], produce [`MetricSample`]s from it, and
//! push complete per-resource batches into a [`MetricSink`]. The scrape
//! handler turns the gathered samples into exposition text with
//! [`encode::encode_text`].

pub mod encode;
mod sink;

pub use encode::encode_text;
pub use sink::{channel, MetricSink, MetricStream};

use chrono::{DateTime, Utc};

/// Static description of a gauge family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaugeDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl GaugeDesc {
    pub const fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self { name, help, labels }
    }

    /// Build a sample with label values in descriptor order
    pub fn sample(&self, value: f64, label_values: &[&str]) -> MetricSample {
        debug_assert_eq!(
            self.labels.len(),
            label_values.len(),
            "label arity mismatch for {}",
            self.name
        );

        MetricSample {
            name: self.name,
            help: self.help,
            labels: self
                .labels
                .iter()
                .zip(label_values)
                .map(|(name, value)| (*name, (*value).to_string()))
                .collect(),
            value,
            timestamp: None,
        }
    }
}

/// One gauge value with its labels
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
    /// Explicit sample time; `None` means "at scrape time"
    pub timestamp: Option<DateTime<Utc>>,
}

impl MetricSample {
    /// Stamp the sample with the time it was measured upstream
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Value of a label, if present
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(label, _)| *label == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Render a boolean as a gauge value
pub fn bool_value(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const UP: GaugeDesc = GaugeDesc::new("test_up", "Test up", &["id", "name"]);

    #[test]
    fn test_sample_keeps_label_order() {
        let sample = UP.sample(1.0, &["1", "web"]);

        assert_eq!(sample.name, "test_up");
        assert_eq!(
            sample.labels,
            vec![("id", "1".to_string()), ("name", "web".to_string())]
        );
        assert_eq!(sample.label("name"), Some("web"));
        assert_eq!(sample.label("zone"), None);
        assert!(sample.timestamp.is_none());
    }

    #[test]
    fn test_sample_at_sets_timestamp() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let sample = UP.sample(0.0, &["1", "web"]).at(ts);
        assert_eq!(sample.timestamp, Some(ts));
    }

    #[test]
    fn test_bool_value() {
        assert_eq!(bool_value(true), 1.0);
        assert_eq!(bool_value(false), 0.0);
    }
}
