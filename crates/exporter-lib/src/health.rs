//! Liveness and readiness of the exporter
//!
//! Two kinds of component report here. The upstream API is judged by the
//! startup credential check and then by the failures collectors run into on
//! every scrape. Each collector is judged by its own last run.

use crate::collector::UpstreamFaults;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Component names for health tracking
///
/// Collectors register under their own collector name.
pub mod components {
    pub const UPSTREAM_API: &str = "upstream_api";
}

/// Ordered from best to worst, so the overall status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, with gaps in the output
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    components: HashMap<String, ComponentHealth>,
    serving: bool,
}

/// Shared health state, updated at startup and after every scrape
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<State>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `name`, starting out healthy
    pub async fn register(&self, name: &str) {
        self.set(name, ComponentStatus::Healthy, None).await;
    }

    /// The API accepted our credentials
    pub async fn record_credentials_verified(&self) {
        self.set(components::UPSTREAM_API, ComponentStatus::Healthy, None)
            .await;
    }

    /// Judge the upstream API by the failures of the last scrape
    ///
    /// Rejected credentials make it unhealthy: every later request will be
    /// refused too. An outage only degrades it.
    pub async fn record_upstream(&self, faults: UpstreamFaults) {
        let (status, message) = if faults.rejected > 0 {
            (
                ComponentStatus::Unhealthy,
                Some(format!(
                    "{} request(s) rejected during last scrape, check the access token",
                    faults.rejected
                )),
            )
        } else if faults.unavailable > 0 {
            (
                ComponentStatus::Degraded,
                Some(format!(
                    "{} request(s) unanswered during last scrape",
                    faults.unavailable
                )),
            )
        } else {
            (ComponentStatus::Healthy, None)
        };
        self.set(components::UPSTREAM_API, status, message).await;
    }

    /// Record the outcome of a collector run
    ///
    /// A run with failures leaves the collector degraded: it still served
    /// whatever metrics it could collect.
    pub async fn record_collection(&self, collector: &str, failures: u64) {
        if failures == 0 {
            self.set(collector, ComponentStatus::Healthy, None).await;
        } else {
            let message = format!("{failures} failure(s) during last scrape");
            self.set(collector, ComponentStatus::Degraded, Some(message))
                .await;
        }
    }

    /// Startup finished; the metrics endpoint is about to be served
    pub async fn mark_ready(&self) {
        self.state.write().await.serving = true;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        let status = components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let upstream = state
            .components
            .get(components::UPSTREAM_API)
            .map(|c| c.status);

        let reason = if !state.serving {
            Some("Credentials not verified yet")
        } else if upstream == Some(ComponentStatus::Unhealthy) {
            Some("Upstream API is rejecting requests")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }

    async fn set(&self, name: &str, status: ComponentStatus, message: Option<String>) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), ComponentHealth::new(status, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faults(rejected: u64, unavailable: u64) -> UpstreamFaults {
        UpstreamFaults {
            rejected,
            unavailable,
        }
    }

    #[tokio::test]
    async fn test_empty_registry_is_healthy_but_not_ready() {
        let registry = HealthRegistry::new();

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Credentials not verified yet"));
    }

    #[tokio::test]
    async fn test_collection_failures_degrade_the_collector() {
        let registry = HealthRegistry::new();
        registry.register(components::UPSTREAM_API).await;
        registry.register("server").await;

        registry.record_collection("server", 2).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components["server"].message.as_deref(),
            Some("2 failure(s) during last scrape")
        );

        registry.record_collection("server", 0).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_rejected_requests_make_upstream_unhealthy() {
        let registry = HealthRegistry::new();
        registry.record_credentials_verified().await;
        registry.mark_ready().await;

        registry.record_upstream(faults(3, 1)).await;

        let health = registry.health().await;
        let upstream = &health.components[components::UPSTREAM_API];
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(upstream.message.as_deref().unwrap().contains("3 request(s) rejected"));

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Upstream API is rejecting requests"));
    }

    #[tokio::test]
    async fn test_outage_only_degrades_upstream() {
        let registry = HealthRegistry::new();
        registry.record_credentials_verified().await;
        registry.mark_ready().await;

        registry.record_upstream(faults(0, 4)).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
        assert!(registry.readiness().await.ready);

        registry.record_upstream(faults(0, 0)).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components[components::UPSTREAM_API].message.is_none());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ComponentStatus::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }
}
