//! Core library of the SAKURA Cloud metrics exporter
//!
//! This crate provides:
//! - An API client with one narrow trait per resource kind
//! - Zone fan-out and per-resource collection with failure isolation
//! - Monitor sample selection and a time-bounded cache for account data
//! - A flat metric model, a concurrent sink and a Prometheus text encoder
//! - Health checks and observability of the exporter itself

pub mod cache;
pub mod client;
pub mod collector;
pub mod fanout;
pub mod health;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod sample;
pub mod scrape;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ErrorCounter, ExporterMetrics, StructuredLogger};
pub use scrape::{CollectorReport, CollectorSet, ScrapeOutcome};
