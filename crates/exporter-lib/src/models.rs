//! Core data models shared by the API client and the collectors

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// One measurement returned by the upstream monitoring API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSample<V> {
    pub time: DateTime<Utc>,
    pub value: V,
}

impl<V> MonitorSample<V> {
    pub fn new(time: DateTime<Utc>, value: V) -> Self {
        Self { time, value }
    }
}

/// A resource tagged with the zone it was listed from
#[derive(Debug, Clone, PartialEq)]
pub struct Zoned<T> {
    pub zone: String,
    pub resource: T,
}

/// Trailing time range used for monitor queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MonitorWindow {
    /// Window of `length` ending now, truncated to whole seconds
    pub fn trailing(length: Duration) -> Self {
        Self::ending_at(Utc::now(), length)
    }

    pub fn ending_at(end: DateTime<Utc>, length: Duration) -> Self {
        let end = end.trunc_subsecs(0);
        Self {
            start: end - length,
            end,
        }
    }
}

/// CPU time of a server or appliance
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CpuTimeValue {
    pub cpu_time: f64,
}

/// Interface traffic in bytes per second
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InterfaceValue {
    pub receive: f64,
    pub send: f64,
}

/// Disk throughput in bytes per second
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DiskValue {
    pub read: f64,
    pub write: f64,
}

/// Router traffic in bits per second
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RouterValue {
    pub inbound: f64,
    pub outbound: f64,
}

/// Database usage sizes as reported by the database appliance
///
/// Memory and disk sizes are in MiB, binlog usage in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DatabaseValue {
    pub total_memory_size: f64,
    pub used_memory_size: f64,
    pub total_disk1_size: f64,
    pub used_disk1_size: f64,
    pub total_disk2_size: f64,
    pub used_disk2_size: f64,
    pub binlog_used_size_kib: f64,
    pub delay_time_sec: f64,
}

/// Free disk space of an NFS appliance in KiB
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FreeDiskSizeValue {
    pub free_disk_size: f64,
}

/// Connection counters of a proxy load balancer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectionValue {
    pub active_connections: f64,
    pub connections_per_sec: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_monitor_window_truncates_to_seconds() {
        let end = Utc.timestamp_opt(1_700_000_000, 750_000_000).unwrap();
        let window = MonitorWindow::ending_at(end, Duration::minutes(60));

        assert_eq!(window.end, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert_eq!(window.start, Utc.timestamp_opt(1_700_000_000 - 3600, 0).unwrap());
    }
}
