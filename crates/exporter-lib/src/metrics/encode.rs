//! Prometheus exposition of collected samples

use super::MetricSample;
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use std::collections::BTreeMap;

/// Group samples into gauge families, ordered by metric name
pub fn to_families(samples: &[MetricSample]) -> Vec<MetricFamily> {
    let mut families: BTreeMap<&str, MetricFamily> = BTreeMap::new();

    for sample in samples {
        let family = families.entry(sample.name).or_insert_with(|| {
            let mut family = MetricFamily::default();
            family.set_name(sample.name.to_string());
            family.set_help(sample.help.to_string());
            family.set_field_type(MetricType::GAUGE);
            family
        });
        family.mut_metric().push(to_metric(sample));
    }

    families.into_values().collect()
}

fn to_metric(sample: &MetricSample) -> Metric {
    let labels: Vec<LabelPair> = sample
        .labels
        .iter()
        .map(|(name, value)| {
            let mut pair = LabelPair::default();
            pair.set_name((*name).to_string());
            pair.set_value(value.clone());
            pair
        })
        .collect();

    let mut gauge = Gauge::default();
    gauge.set_value(sample.value);

    let mut metric = Metric::default();
    metric.set_label(labels.into());
    metric.set_gauge(gauge);
    if let Some(ts) = sample.timestamp {
        metric.set_timestamp_ms(ts.timestamp_millis());
    }
    metric
}

/// Encode samples plus any extra families as Prometheus text
pub fn encode_text(
    samples: &[MetricSample],
    extra: Vec<MetricFamily>,
) -> prometheus::Result<Vec<u8>> {
    let mut families = to_families(samples);
    families.extend(extra);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(buffer)
}
