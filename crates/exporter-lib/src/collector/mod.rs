//! Per-resource-kind collectors
//!
//! Each kind implements [`Collector`] on top of the shared cycle in
//! [`template`]: list the kind's resources across zones, enrich every
//! resource concurrently, emit one batch per resource. A failure in one kind
//! never touches another kind's output.

mod auto_backup;
mod bill;
mod coupon;
mod database;
mod internet;
mod load_balancer;
mod nfs;
mod proxy_lb;
mod server;
pub mod template;
mod vpc_router;


pub use auto_backup::AutoBackupCollector;
pub use bill::BillCollector;
pub use coupon::CouponCollector;
pub use database::DatabaseCollector;
pub use internet::InternetCollector;
pub use load_balancer::LoadBalancerCollector;
pub use nfs::NfsCollector;
pub use proxy_lb::ProxyLbCollector;
pub use server::ServerCollector;
pub use template::{flatten_tags, CollectContext, UpstreamFaults};
pub use vpc_router::VpcRouterCollector;

use crate::client::CloudApi;
use std::sync::Arc;
use tracing::info;

pub use async_trait::async_trait;

/// Collector names, in the order they are registered
pub const ALL_KINDS: &[&str] = &[
    ServerCollector::NAME,
    DatabaseCollector::NAME,
    LoadBalancerCollector::NAME,
    VpcRouterCollector::NAME,
    NfsCollector::NAME,
    InternetCollector::NAME,
    AutoBackupCollector::NAME,
    ProxyLbCollector::NAME,
    BillCollector::NAME,
    CouponCollector::NAME,
];

/// One resource kind's collection cycle
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable name, used as the `collector` label of the error counter
    fn name(&self) -> &'static str;

    /// Run one cycle, writing metrics through `ctx`
    ///
    /// Failures are recorded on `ctx`, never returned.
    async fn collect(&self, ctx: &CollectContext);
}

pub fn is_known_kind(name: &str) -> bool {
    ALL_KINDS.contains(&name)
}

/// Build every collector not listed in `disabled`
///
/// Must be called from within a tokio runtime: the cached collectors start
/// their cache sweepers here.
pub fn build_collectors<A>(api: Arc<A>, account_id: &str, disabled: &[String]) -> Vec<Arc<dyn Collector>>
where
    A: CloudApi + 'static,
{
    let enabled = |name: &str| !disabled.iter().any(|d| d == name);
    let mut collectors: Vec<Arc<dyn Collector>> = Vec::new();

    if enabled(ServerCollector::NAME) {
        collectors.push(Arc::new(ServerCollector::new(api.clone())));
    }
    if enabled(DatabaseCollector::NAME) {
        collectors.push(Arc::new(DatabaseCollector::new(api.clone())));
    }
    if enabled(LoadBalancerCollector::NAME) {
        collectors.push(Arc::new(LoadBalancerCollector::new(api.clone())));
    }
    if enabled(VpcRouterCollector::NAME) {
        collectors.push(Arc::new(VpcRouterCollector::new(api.clone())));
    }
    if enabled(NfsCollector::NAME) {
        collectors.push(Arc::new(NfsCollector::new(api.clone())));
    }
    if enabled(InternetCollector::NAME) {
        collectors.push(Arc::new(InternetCollector::new(api.clone())));
    }
    if enabled(AutoBackupCollector::NAME) {
        collectors.push(Arc::new(AutoBackupCollector::new(api.clone())));
    }
    if enabled(ProxyLbCollector::NAME) {
        collectors.push(Arc::new(ProxyLbCollector::new(api.clone())));
    }
    if enabled(BillCollector::NAME) {
        collectors.push(Arc::new(BillCollector::new(api.clone(), account_id)));
    }
    if enabled(CouponCollector::NAME) {
        collectors.push(Arc::new(CouponCollector::new(api, account_id)));
    }

    for name in disabled {
        info!(collector = %name, "Collector disabled");
    }
    collectors
}

/// Identity labels followed by kind-specific ones, in descriptor order
pub(crate) fn extend_labels<'a>(base: &[&'a str], extra: &[&'a str]) -> Vec<&'a str> {
    let mut labels = Vec::with_capacity(base.len() + extra.len());
    labels.extend_from_slice(base);
    labels.extend_from_slice(extra);
    labels
}
