//! Monitor (activity) responses
//!
//! Every monitor endpoint answers with the same shape: a `Data` map keyed by
//! RFC 3339 timestamps, each entry holding named values that may be `null`
//! while the period is still being aggregated.

use super::types::null_default;
use crate::models::{
    ConnectionValue, CpuTimeValue, DatabaseValue, DiskValue, FreeDiskSizeValue, InterfaceValue,
    MonitorSample, RouterValue,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

type Fields = HashMap<String, Option<f64>>;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MonitorResponse {
    #[serde(rename = "Data", default, deserialize_with = "null_default")]
    data: HashMap<String, Fields>,
}

/// A value type that can be read from one monitor data point
pub trait MonitorValue: Sized + Send + 'static {
    /// `None` when a required field is missing or null
    fn from_fields(fields: &Fields) -> Option<Self>;
}

fn field(fields: &Fields, key: &str) -> Option<f64> {
    fields.get(key).copied().flatten()
}

impl MonitorValue for CpuTimeValue {
    fn from_fields(fields: &Fields) -> Option<Self> {
        Some(Self {
            cpu_time: field(fields, "CPU-TIME")?,
        })
    }
}

impl MonitorValue for InterfaceValue {
    fn from_fields(fields: &Fields) -> Option<Self> {
        Some(Self {
            receive: field(fields, "Receive")?,
            send: field(fields, "Send")?,
        })
    }
}

impl MonitorValue for DiskValue {
    fn from_fields(fields: &Fields) -> Option<Self> {
        Some(Self {
            read: field(fields, "Read")?,
            write: field(fields, "Write")?,
        })
    }
}

impl MonitorValue for RouterValue {
    fn from_fields(fields: &Fields) -> Option<Self> {
        Some(Self {
            inbound: field(fields, "In")?,
            outbound: field(fields, "Out")?,
        })
    }
}

impl MonitorValue for DatabaseValue {
    fn from_fields(fields: &Fields) -> Option<Self> {
        // Disk2, binlog and replication delay are only reported by some plans.
        Some(Self {
            total_memory_size: field(fields, "Total-Memory-Size")?,
            used_memory_size: field(fields, "Used-Memory-Size")?,
            total_disk1_size: field(fields, "Total-Disk1-Size")?,
            used_disk1_size: field(fields, "Used-Disk1-Size")?,
            total_disk2_size: field(fields, "Total-Disk2-Size").unwrap_or_default(),
            used_disk2_size: field(fields, "Used-Disk2-Size").unwrap_or_default(),
            binlog_used_size_kib: field(fields, "binlogUsedSizeKiB").unwrap_or_default(),
            delay_time_sec: field(fields, "delayTimeSec").unwrap_or_default(),
        })
    }
}

impl MonitorValue for FreeDiskSizeValue {
    fn from_fields(fields: &Fields) -> Option<Self> {
        Some(Self {
            free_disk_size: field(fields, "Free-Disk-Size")?,
        })
    }
}

impl MonitorValue for ConnectionValue {
    fn from_fields(fields: &Fields) -> Option<Self> {
        Some(Self {
            active_connections: field(fields, "ActiveConnections")?,
            connections_per_sec: field(fields, "ConnectionsPerSec")?,
        })
    }
}

/// Convert a monitor response into samples, skipping incomplete data points
pub(crate) fn parse_samples<V: MonitorValue>(response: MonitorResponse) -> Vec<MonitorSample<V>> {
    response
        .data
        .into_iter()
        .filter_map(|(time, fields)| {
            let time = DateTime::parse_from_rfc3339(&time).ok()?.with_timezone(&Utc);
            V::from_fields(&fields).map(|value| MonitorSample::new(time, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_skips_null_points() {
        let response: MonitorResponse = serde_json::from_value(json!({
            "Data": {
                "2024-01-01T09:00:00+09:00": {"CPU-TIME": 0.5},
                "2024-01-01T09:05:00+09:00": {"CPU-TIME": 0.7},
                "2024-01-01T09:10:00+09:00": {"CPU-TIME": null}
            }
        }))
        .unwrap();

        let mut samples: Vec<MonitorSample<CpuTimeValue>> = parse_samples(response);
        samples.sort_by_key(|s| s.time);

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(samples[1].value.cpu_time, 0.7);
    }

    #[test]
    fn test_parse_requires_both_interface_fields() {
        let response: MonitorResponse = serde_json::from_value(json!({
            "Data": {
                "2024-01-01T00:00:00Z": {"Receive": 10.0, "Send": 20.0},
                "2024-01-01T00:05:00Z": {"Receive": 10.0}
            }
        }))
        .unwrap();

        let samples: Vec<MonitorSample<InterfaceValue>> = parse_samples(response);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, InterfaceValue { receive: 10.0, send: 20.0 });
    }

    #[test]
    fn test_database_optional_fields_default_to_zero() {
        let response: MonitorResponse = serde_json::from_value(json!({
            "Data": {
                "2024-01-01T00:00:00Z": {
                    "Total-Memory-Size": 1024.0, "Used-Memory-Size": 512.0,
                    "Total-Disk1-Size": 20480.0, "Used-Disk1-Size": 100.0
                }
            }
        }))
        .unwrap();

        let samples: Vec<MonitorSample<DatabaseValue>> = parse_samples(response);
        assert_eq!(samples[0].value.used_memory_size, 512.0);
        assert_eq!(samples[0].value.total_disk2_size, 0.0);
    }

    #[test]
    fn test_null_data_is_empty() {
        let response: MonitorResponse = serde_json::from_value(json!({"Data": null})).unwrap();
        let samples: Vec<MonitorSample<RouterValue>> = parse_samples(response);
        assert!(samples.is_empty());
    }
}
