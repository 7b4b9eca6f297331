//! HTTP implementation of the API traits

use super::monitor::{parse_samples, MonitorResponse, MonitorValue};
use super::types::{
    Archive, AuthStatus, AutoBackup, Bill, Coupon, Database, Internet, LoadBalancer,
    LoadBalancerVipStatus, Nfs, ProxyLb, ProxyLbHealth, Server, VpcRouter, VpcRouterStatus,
};
use super::{
    ApiError, ApiResult, ApplianceMonitorApi, AutoBackupApi, BillingApi, DatabaseApi, InternetApi,
    LoadBalancerApi, NfsApi, ProxyLbApi, ServerApi, VpcRouterApi, GLOBAL_ZONE,
};
use crate::models::{
    ConnectionValue, CpuTimeValue, DatabaseValue, DiskValue, FreeDiskSizeValue, InterfaceValue,
    MonitorSample, MonitorWindow, RouterValue,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::{form_urlencoded, Url};

pub const DEFAULT_ROOT_URL: &str = "https://secure.sakura.ad.jp/cloud/zone";

/// Upper bound on list results; the API pages at this size
const LIST_COUNT: u32 = 10_000;

/// Connection settings for [`ApiClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub root_url: String,
    pub token: String,
    pub secret: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            root_url: DEFAULT_ROOT_URL.to_string(),
            token: String::new(),
            secret: String::new(),
            timeout: Duration::from_secs(20),
            user_agent: format!("sakuracloud-exporter/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_msg: Option<String>,
}

/// Client for the zone-scoped cloud API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    root_url: String,
    token: String,
    secret: String,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(ApiError::Client)?;

        // Fail on a malformed root up front rather than on the first scrape.
        Url::parse(&config.root_url)?;

        Ok(Self {
            http,
            root_url: config.root_url.trim_end_matches('/').to_string(),
            token: config.token,
            secret: config.secret,
        })
    }

    fn endpoint(&self, zone: &str, path: &str, query: Option<&Value>) -> ApiResult<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}/api/cloud/1.1/{}",
            self.root_url, zone, path
        ))?;
        if let Some(query) = query {
            let encoded: String =
                form_urlencoded::byte_serialize(query.to_string().as_bytes()).collect();
            url.set_query(Some(&encoded));
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        zone: &str,
        path: &str,
        query: Option<Value>,
    ) -> ApiResult<T> {
        let url = self.endpoint(zone, path, query.as_ref())?;
        debug!(zone = %zone, path = %path, "GET");

        let transport = |source| ApiError::Transport {
            path: path.to_string(),
            source,
        };
        let response = self
            .http
            .get(url)
            .basic_auth(&self.token, Some(&self.secret))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error_msg)
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }

    /// GET and pull one top-level field out of the envelope
    async fn get_field<T: DeserializeOwned + Default>(
        &self,
        zone: &str,
        path: &str,
        query: Option<Value>,
        field: &str,
    ) -> ApiResult<T> {
        let mut body: Value = self.get(zone, path, query).await?;
        match body.get_mut(field).map(Value::take) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value).map_err(|source| ApiError::Decode {
                path: path.to_string(),
                source,
            }),
        }
    }

    async fn list<T: DeserializeOwned>(
        &self,
        zone: &str,
        path: &str,
        filter: Option<Value>,
        field: &str,
    ) -> ApiResult<Vec<T>> {
        let mut query = json!({ "Count": LIST_COUNT, "From": 0 });
        if let Some(filter) = filter {
            query["Filter"] = filter;
        }
        self.get_field(zone, path, Some(query), field).await
    }

    async fn monitor<V: MonitorValue>(
        &self,
        zone: &str,
        path: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<V>>> {
        let query = json!({
            "Start": window.start.to_rfc3339(),
            "End": window.end.to_rfc3339(),
        });
        let response: MonitorResponse = self.get(zone, path, Some(query)).await?;
        Ok(parse_samples(response))
    }

    async fn list_appliances<T: DeserializeOwned>(
        &self,
        zone: &str,
        class: &str,
    ) -> ApiResult<Vec<T>> {
        self.list(zone, "appliance", Some(json!({ "Class": class })), "Appliances")
            .await
    }
}

#[async_trait]
impl ServerApi for ApiClient {
    async fn list_servers(&self, zone: &str) -> ApiResult<Vec<Server>> {
        self.list(zone, "server", None, "Servers").await
    }

    async fn server_cpu_monitor(
        &self,
        zone: &str,
        server_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<CpuTimeValue>>> {
        self.monitor(zone, &format!("server/{server_id}/monitor"), window)
            .await
    }

    async fn interface_monitor(
        &self,
        zone: &str,
        interface_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<InterfaceValue>>> {
        self.monitor(zone, &format!("interface/{interface_id}/monitor"), window)
            .await
    }

    async fn disk_monitor(
        &self,
        zone: &str,
        disk_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<DiskValue>>> {
        self.monitor(zone, &format!("disk/{disk_id}/monitor"), window)
            .await
    }
}

#[async_trait]
impl ApplianceMonitorApi for ApiClient {
    async fn appliance_cpu_monitor(
        &self,
        zone: &str,
        appliance_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<CpuTimeValue>>> {
        self.monitor(zone, &format!("appliance/{appliance_id}/cpu/monitor"), window)
            .await
    }

    async fn appliance_interface_monitor(
        &self,
        zone: &str,
        appliance_id: &str,
        index: usize,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<InterfaceValue>>> {
        self.monitor(
            zone,
            &format!("appliance/{appliance_id}/interface/{index}/monitor"),
            window,
        )
        .await
    }
}

#[async_trait]
impl DatabaseApi for ApiClient {
    async fn list_databases(&self, zone: &str) -> ApiResult<Vec<Database>> {
        self.list_appliances(zone, "database").await
    }

    async fn database_disk_monitor(
        &self,
        zone: &str,
        database_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<DiskValue>>> {
        self.monitor(zone, &format!("appliance/{database_id}/disk/0/monitor"), window)
            .await
    }

    async fn database_monitor(
        &self,
        zone: &str,
        database_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<DatabaseValue>>> {
        self.monitor(
            zone,
            &format!("appliance/{database_id}/database/monitor"),
            window,
        )
        .await
    }
}

#[async_trait]
impl LoadBalancerApi for ApiClient {
    async fn list_load_balancers(&self, zone: &str) -> ApiResult<Vec<LoadBalancer>> {
        self.list_appliances(zone, "loadbalancer").await
    }

    async fn load_balancer_status(
        &self,
        zone: &str,
        load_balancer_id: &str,
    ) -> ApiResult<Vec<LoadBalancerVipStatus>> {
        self.get_field(
            zone,
            &format!("appliance/{load_balancer_id}/status"),
            None,
            "LoadBalancer",
        )
        .await
    }
}

#[async_trait]
impl VpcRouterApi for ApiClient {
    async fn list_vpc_routers(&self, zone: &str) -> ApiResult<Vec<VpcRouter>> {
        self.list_appliances(zone, "vpcrouter").await
    }

    async fn vpc_router_status(&self, zone: &str, router_id: &str) -> ApiResult<VpcRouterStatus> {
        self.get_field(zone, &format!("appliance/{router_id}/status"), None, "Router")
            .await
    }
}

#[async_trait]
impl NfsApi for ApiClient {
    async fn list_nfs(&self, zone: &str) -> ApiResult<Vec<Nfs>> {
        self.list_appliances(zone, "nfs").await
    }

    async fn nfs_free_disk_monitor(
        &self,
        zone: &str,
        nfs_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<FreeDiskSizeValue>>> {
        self.monitor(zone, &format!("appliance/{nfs_id}/nfs/monitor"), window)
            .await
    }
}

#[async_trait]
impl InternetApi for ApiClient {
    async fn list_internets(&self, zone: &str) -> ApiResult<Vec<Internet>> {
        self.list(zone, "internet", None, "Internet").await
    }

    async fn internet_monitor(
        &self,
        zone: &str,
        internet_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<RouterValue>>> {
        self.monitor(zone, &format!("internet/{internet_id}/monitor"), window)
            .await
    }
}

#[async_trait]
impl AutoBackupApi for ApiClient {
    async fn list_auto_backups(&self, zone: &str) -> ApiResult<Vec<AutoBackup>> {
        self.list(
            zone,
            "commonserviceitem",
            Some(json!({ "Provider.Class": "autobackup" })),
            "CommonServiceItems",
        )
        .await
    }

    async fn list_auto_backup_archives(
        &self,
        zone: &str,
        backup: &AutoBackup,
    ) -> ApiResult<Vec<Archive>> {
        let tag = format!("autobackup-{}", backup.id);
        self.list(zone, "archive", Some(json!({ "Tags.Name": [tag] })), "Archives")
            .await
    }
}

#[async_trait]
impl ProxyLbApi for ApiClient {
    async fn list_proxy_lbs(&self, zone: &str) -> ApiResult<Vec<ProxyLb>> {
        self.list(
            zone,
            "commonserviceitem",
            Some(json!({ "Provider.Class": "proxylb" })),
            "CommonServiceItems",
        )
        .await
    }

    async fn proxy_lb_health(&self, zone: &str, proxy_lb_id: &str) -> ApiResult<ProxyLbHealth> {
        self.get_field(
            zone,
            &format!("commonserviceitem/{proxy_lb_id}/health"),
            None,
            "ProxyLB",
        )
        .await
    }

    async fn proxy_lb_monitor(
        &self,
        zone: &str,
        proxy_lb_id: &str,
        window: MonitorWindow,
    ) -> ApiResult<Vec<MonitorSample<ConnectionValue>>> {
        self.monitor(
            zone,
            &format!("commonserviceitem/{proxy_lb_id}/activity/proxylb/monitor"),
            window,
        )
        .await
    }
}

#[async_trait]
impl BillingApi for ApiClient {
    async fn auth_status(&self) -> ApiResult<AuthStatus> {
        self.get(GLOBAL_ZONE, "auth-status", None).await
    }

    async fn bills(&self, account_id: &str) -> ApiResult<Vec<Bill>> {
        self.get_field(
            GLOBAL_ZONE,
            &format!("bill/by-contract/{account_id}"),
            None,
            "Bills",
        )
        .await
    }

    async fn coupons(&self, account_id: &str) -> ApiResult<Vec<Coupon>> {
        self.get_field(GLOBAL_ZONE, &format!("coupon/{account_id}"), None, "Coupons")
            .await
    }
}
