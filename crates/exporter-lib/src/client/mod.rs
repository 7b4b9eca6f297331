//! Upstream cloud API
//!
//! Collectors depend on the narrow per-kind traits below rather than on the
//! HTTP client, so tests can substitute in-memory fakes. [`ApiClient`]
//! implements all of them.

mod error;
mod http;
pub mod monitor;
pub mod types;

pub use error::ApiError;
pub use http::{ApiClient, ClientConfig, DEFAULT_ROOT_URL};
pub use monitor::MonitorValue;

use crate::models::{
    ConnectionValue, CpuTimeValue, DatabaseValue, DiskValue, FreeDiskSizeValue, InterfaceValue,
    MonitorSample, MonitorWindow, RouterValue,
};
use async_trait::async_trait;
use types::{
    Archive, AuthStatus, AutoBackup, Bill, Coupon, Database, Internet, LoadBalancer,
    LoadBalancerVipStatus, Nfs, ProxyLb, ProxyLbHealth, Server, VpcRouter, VpcRouterStatus,
};

/// Zones served by the public cloud
pub const DEFAULT_ZONES: &[&str] = &["is1a", "is1b", "tk1a", "tk1b", "tk1v"];

/// Zone used to reach global (zone-less) resources
pub const GLOBAL_ZONE: &str = "is1a";

pub type ApiResult<T> = Result<T, ApiError>;

#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn list_servers(&self, zone: &str) -> ApiResult<Vec<Server>>;

    async fn server_cpu_monitor(
        &self,
        zone: &str,
        server_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<CpuTimeValue>>>;

    async fn interface_monitor(
        &self,
        zone: &str,
        interface_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<InterfaceValue>>>;

    async fn disk_monitor(
        &self,
        zone: &str,
        disk_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<DiskValue>>>;
}

/// Monitors shared by every appliance class
#[async_trait]
pub trait ApplianceMonitorApi: Send + Sync {
    async fn appliance_cpu_monitor(
        &self,
        zone: &str,
        appliance_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<CpuTimeValue>>>;

    /// Traffic of the appliance's `index`-th interface
    async fn appliance_interface_monitor(
        &self,
        zone: &str,
        appliance_id: &str,
        index: usize,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<InterfaceValue>>>;
}

#[async_trait]
pub trait DatabaseApi: ApplianceMonitorApi {
    async fn list_databases(&self, zone: &str) -> ApiResult<Vec<Database>>;

    async fn database_disk_monitor(
        &self,
        zone: &str,
        database_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<DiskValue>>>;

    async fn database_monitor(
        &self,
        zone: &str,
        database_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<DatabaseValue>>>;
}

#[async_trait]
pub trait LoadBalancerApi: ApplianceMonitorApi {
    async fn list_load_balancers(&self, zone: &str) -> ApiResult<Vec<LoadBalancer>>;

    async fn load_balancer_status(
        &self,
        zone: &str,
        load_balancer_id: &str,
    ) -> ApiResult<Vec<LoadBalancerVipStatus>>;
}

#[async_trait]
pub trait VpcRouterApi: ApplianceMonitorApi {
    async fn list_vpc_routers(&self, zone: &str) -> ApiResult<Vec<VpcRouter>>;

    async fn vpc_router_status(&self, zone: &str, router_id: &str) -> ApiResult<VpcRouterStatus>;
}

#[async_trait]
pub trait NfsApi: ApplianceMonitorApi {
    async fn list_nfs(&self, zone: &str) -> ApiResult<Vec<Nfs>>;

    async fn nfs_free_disk_monitor(
        &self,
        zone: &str,
        nfs_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<FreeDiskSizeValue>>>;
}

#[async_trait]
pub trait InternetApi: Send + Sync {
    async fn list_internets(&self, zone: &str) -> ApiResult<Vec<Internet>>;

    async fn internet_monitor(
        &self,
        zone: &str,
        internet_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<RouterValue>>>;
}

#[async_trait]
pub trait AutoBackupApi: Send + Sync {
    async fn list_auto_backups(&self, zone: &str) -> ApiResult<Vec<AutoBackup>>;

    /// Archives produced by one auto-backup schedule
    async fn list_auto_backup_archives(
        &self,
        zone: &str,
        backup: &AutoBackup,
    ) -> ApiResult<Vec<Archive>>;
}

/// Proxy load balancers are global and always queried through [`GLOBAL_ZONE`]
#[async_trait]
pub trait ProxyLbApi: Send + Sync {
    async fn list_proxy_lbs(&self, zone: &str) -> ApiResult<Vec<ProxyLb>>;

    async fn proxy_lb_health(&self, zone: &str, proxy_lb_id: &str) -> ApiResult<ProxyLbHealth>;

    async fn proxy_lb_monitor(
        &self,
        zone: &str,
        proxy_lb_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<ConnectionValue>>>;
}

#[async_trait]
pub trait BillingApi: Send + Sync {
    /// Identity behind the configured credentials
    async fn auth_status(&self) -> ApiResult<AuthStatus>;

    async fn bills(&self, account_id: &str) -> ApiResult<Vec<Bill>>;

    async fn coupons(&self, account_id: &str) -> ApiResult<Vec<Coupon>>;
}

/// Everything the exporter needs from upstream
pub trait CloudApi:
    ServerApi
    + DatabaseApi
    + LoadBalancerApi
    + VpcRouterApi
    + NfsApi
    + InternetApi
    + AutoBackupApi
    + ProxyLbApi
    + BillingApi
{
}

impl<T> CloudApi for T where
    T: ServerApi
        + DatabaseApi
        + LoadBalancerApi
        + VpcRouterApi
        + NfsApi
        + InternetApi
        + AutoBackupApi
        + ProxyLbApi
        + BillingApi
{
}
