//! Upstream resource records
//!
//! Only the fields the collectors read are modelled. The API is loose about
//! number encoding (IDs and counters arrive as strings or numbers, lists as
//! `null`), so the lenient deserializers below are used wherever that shows up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Accept strings, numbers or null and keep them as text
pub(crate) fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(s)) => s,
        Some(Scalar::Int(n)) => n.to_string(),
        Some(Scalar::Float(n)) => n.to_string(),
        Some(Scalar::Bool(b)) => b.to_string(),
        None => String::new(),
    })
}

/// Accept numbers, numeric strings or null as `f64`
pub(crate) fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(n)) => Ok(n as f64),
        Some(Scalar::Float(n)) => Ok(n),
        Some(Scalar::Text(s)) if s.trim().is_empty() => Ok(0.0),
        Some(Scalar::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom),
        Some(Scalar::Bool(b)) => Ok(if b { 1.0 } else { 0.0 }),
        None => Ok(0.0),
    }
}

/// Treat `null` like a missing field
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reference to another resource (zone, host, plan, switch)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NamedRef {
    #[serde(rename = "ID", default, deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instance {
    #[serde(default, deserialize_with = "text")]
    pub status: String,
    #[serde(default, deserialize_with = "null_default")]
    pub host: NamedRef,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SwitchRef {
    #[serde(rename = "ID", default, deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub scope: String,
}

/// Network interface of a server or appliance
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Interface {
    #[serde(rename = "ID", default, deserialize_with = "text")]
    pub id: String,
    #[serde(rename = "MACAddress", default, deserialize_with = "text")]
    pub mac_address: String,
    #[serde(rename = "IPAddress", default, deserialize_with = "text")]
    pub ip_address: String,
    #[serde(rename = "UserIPAddress", default, deserialize_with = "text")]
    pub user_ip_address: String,
    #[serde(default)]
    pub switch: Option<SwitchRef>,
}

impl Interface {
    /// What the interface is connected to: `shared`, `switch` or `disconnected`
    pub fn upstream_type(&self) -> &'static str {
        match &self.switch {
            None => "disconnected",
            Some(switch) if switch.scope == "shared" => "shared",
            Some(_) => "switch",
        }
    }

    /// Address assigned by upstream, falling back to the user-set one
    pub fn address(&self) -> &str {
        if self.ip_address.is_empty() {
            &self.user_ip_address
        } else {
            &self.ip_address
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerPlan {
    #[serde(rename = "CPU", default)]
    pub cpu: u32,
    #[serde(rename = "MemoryMB", default)]
    pub memory_mb: u64,
    #[serde(default, deserialize_with = "text")]
    pub commitment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerDisk {
    #[serde(rename = "ID", default, deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(rename = "SizeMB", default)]
    pub size_mb: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub plan: NamedRef,
    #[serde(default, deserialize_with = "text")]
    pub connection: String,
}

/// Virtual server
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Server {
    #[serde(rename = "ID", deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "text")]
    pub availability: String,
    #[serde(default, deserialize_with = "null_default")]
    pub server_plan: ServerPlan,
    #[serde(default, deserialize_with = "null_default")]
    pub instance: Instance,
    #[serde(default, deserialize_with = "null_default")]
    pub interfaces: Vec<Interface>,
    #[serde(default, deserialize_with = "null_default")]
    pub disks: Vec<ServerDisk>,
}

impl Server {
    pub fn is_up(&self) -> bool {
        self.instance.status == "up"
    }
}

/// Fields shared by every appliance class
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplianceCommon {
    #[serde(rename = "ID", deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "text")]
    pub availability: String,
    #[serde(default, deserialize_with = "null_default")]
    pub plan: NamedRef,
    #[serde(default, deserialize_with = "null_default")]
    pub instance: Instance,
    #[serde(default, deserialize_with = "null_default")]
    pub interfaces: Vec<Interface>,
}

impl ApplianceCommon {
    pub fn is_up(&self) -> bool {
        self.instance.status == "up"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseCommonRemark {
    #[serde(default, deserialize_with = "text")]
    pub database_name: String,
    #[serde(default, deserialize_with = "text")]
    pub database_version: String,
    #[serde(default, deserialize_with = "text")]
    pub database_revision: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseConfRemark {
    #[serde(default, deserialize_with = "null_default")]
    pub common: DatabaseCommonRemark,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatabaseRemark {
    #[serde(rename = "DBConf", default, deserialize_with = "null_default")]
    pub db_conf: DatabaseConfRemark,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseCommonSettings {
    /// `false`, `true` or the URL of the web UI
    #[serde(rename = "WebUI", default, deserialize_with = "text")]
    pub web_ui: String,
    #[serde(default, deserialize_with = "text")]
    pub service_port: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseReplication {
    #[serde(default, deserialize_with = "text")]
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseConfSettings {
    #[serde(default, deserialize_with = "null_default")]
    pub common: DatabaseCommonSettings,
    #[serde(default)]
    pub replication: Option<DatabaseReplication>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatabaseSettings {
    #[serde(rename = "DBConf", default, deserialize_with = "null_default")]
    pub db_conf: DatabaseConfSettings,
}

/// Database appliance
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Database {
    #[serde(flatten)]
    pub common: ApplianceCommon,
    #[serde(default, deserialize_with = "null_default")]
    pub remark: DatabaseRemark,
    #[serde(default, deserialize_with = "null_default")]
    pub settings: DatabaseSettings,
}

impl Database {
    /// `master`, `slave` or empty when replication is not configured
    pub fn replication_role(&self) -> &'static str {
        match self.settings.db_conf.replication.as_ref().map(|r| r.model.as_str()) {
            Some("Master-Slave") => "master",
            Some("Async-Replica") => "slave",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancerHealthCheck {
    #[serde(default, deserialize_with = "text")]
    pub protocol: String,
    #[serde(default, deserialize_with = "text")]
    pub path: String,
    #[serde(default, deserialize_with = "text")]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancerServer {
    #[serde(rename = "IPAddress", default, deserialize_with = "text")]
    pub ip_address: String,
    #[serde(default, deserialize_with = "text")]
    pub port: String,
    #[serde(default, deserialize_with = "null_default")]
    pub health_check: LoadBalancerHealthCheck,
    #[serde(default, deserialize_with = "text")]
    pub enabled: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancerVip {
    #[serde(rename = "VirtualIPAddress", default, deserialize_with = "text")]
    pub virtual_ip_address: String,
    #[serde(default, deserialize_with = "text")]
    pub port: String,
    #[serde(default, deserialize_with = "text")]
    pub delay_loop: String,
    #[serde(default, deserialize_with = "text")]
    pub sorry_server: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub servers: Vec<LoadBalancerServer>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Vrrp {
    #[serde(rename = "VRID", default, deserialize_with = "text")]
    pub vrid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoadBalancerRemark {
    #[serde(rename = "VRRP", default, deserialize_with = "null_default")]
    pub vrrp: Vrrp,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancerSettings {
    #[serde(default, deserialize_with = "null_default")]
    pub load_balancer: Vec<LoadBalancerVip>,
}

/// Load balancer appliance
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancer {
    #[serde(flatten)]
    pub common: ApplianceCommon,
    #[serde(default, deserialize_with = "null_default")]
    pub remark: LoadBalancerRemark,
    #[serde(default, deserialize_with = "null_default")]
    pub settings: LoadBalancerSettings,
}

/// Live status of one load balancer VIP
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancerVipStatus {
    #[serde(rename = "VirtualIPAddress", default, deserialize_with = "text")]
    pub virtual_ip_address: String,
    #[serde(default, deserialize_with = "text")]
    pub port: String,
    #[serde(rename = "CPS", default, deserialize_with = "number")]
    pub cps: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub servers: Vec<LoadBalancerServerStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancerServerStatus {
    #[serde(rename = "IPAddress", default, deserialize_with = "text")]
    pub ip_address: String,
    #[serde(default, deserialize_with = "text")]
    pub port: String,
    #[serde(default, deserialize_with = "text")]
    pub status: String,
    #[serde(default, deserialize_with = "number")]
    pub active_conn: f64,
    #[serde(rename = "CPS", default, deserialize_with = "number")]
    pub cps: f64,
}

impl LoadBalancerServerStatus {
    pub fn is_up(&self) -> bool {
        self.status.eq_ignore_ascii_case("up")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcRouterInterfaceSetting {
    #[serde(rename = "IPAddress", default, deserialize_with = "null_default")]
    pub ip_address: Vec<String>,
    #[serde(rename = "VirtualIPAddress", default, deserialize_with = "text")]
    pub virtual_ip_address: String,
    #[serde(default, deserialize_with = "text")]
    pub network_mask_len: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnabledFlag {
    #[serde(default, deserialize_with = "text")]
    pub enabled: String,
}

impl EnabledFlag {
    pub fn is_enabled(&self) -> bool {
        self.enabled.eq_ignore_ascii_case("true")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SiteToSitePeerSetting {
    #[serde(default, deserialize_with = "text")]
    pub peer: String,
    #[serde(rename = "RemoteID", default, deserialize_with = "text")]
    pub remote_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SiteToSiteSetting {
    #[serde(default, deserialize_with = "null_default")]
    pub config: Vec<SiteToSitePeerSetting>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouterSetting {
    /// Indexed by interface slot; unused slots are `null`
    #[serde(default, deserialize_with = "null_default")]
    pub interfaces: Vec<Option<VpcRouterInterfaceSetting>>,
    #[serde(rename = "VRID", default, deserialize_with = "text")]
    pub vrid: String,
    #[serde(rename = "L2TPIPsecServer", default)]
    pub l2tp_ipsec_server: Option<EnabledFlag>,
    #[serde(rename = "PPTPServer", default)]
    pub pptp_server: Option<EnabledFlag>,
    #[serde(rename = "SiteToSiteIPsecVPN", default)]
    pub site_to_site: Option<SiteToSiteSetting>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcRouterSettings {
    #[serde(default, deserialize_with = "null_default")]
    pub router: RouterSetting,
}

/// VPC router appliance
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcRouter {
    #[serde(flatten)]
    pub common: ApplianceCommon,
    #[serde(default, deserialize_with = "null_default")]
    pub settings: VpcRouterSettings,
}

impl VpcRouter {
    /// Plan name derived from the numeric plan ID
    pub fn plan_name(&self) -> &'static str {
        match self.common.plan.id.as_str() {
            "1" => "standard",
            "2" => "premium",
            "3" => "highspec",
            "4" => "highspec4000",
            _ => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SiteToSitePeerStatus {
    #[serde(default, deserialize_with = "text")]
    pub peer: String,
    #[serde(default, deserialize_with = "text")]
    pub status: String,
}

/// Live status of a VPC router
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VpcRouterStatus {
    #[serde(rename = "DHCPServerLeases", default, deserialize_with = "null_default")]
    pub dhcp_server_leases: Vec<serde_json::Value>,
    #[serde(rename = "L2TPIPsecServerSessions", default, deserialize_with = "null_default")]
    pub l2tp_ipsec_server_sessions: Vec<serde_json::Value>,
    #[serde(rename = "PPTPServerSessions", default, deserialize_with = "null_default")]
    pub pptp_server_sessions: Vec<serde_json::Value>,
    #[serde(rename = "SiteToSiteIPsecVPNPeers", default, deserialize_with = "null_default")]
    pub site_to_site_peers: Vec<SiteToSitePeerStatus>,
    #[serde(rename = "SessionCount", default, deserialize_with = "number")]
    pub session_count: f64,
}

/// NFS appliance
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Nfs {
    #[serde(flatten)]
    pub common: ApplianceCommon,
}

/// Router ("internet") with its dedicated switch
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Internet {
    #[serde(rename = "ID", deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(rename = "BandWidthMbps", default, deserialize_with = "text")]
    pub band_width_mbps: String,
    #[serde(default, deserialize_with = "text")]
    pub network_mask_len: String,
    #[serde(default, deserialize_with = "null_default")]
    pub switch: NamedRef,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoBackupSpec {
    #[serde(default, deserialize_with = "null_default")]
    pub backup_span_weekdays: Vec<String>,
    #[serde(default, deserialize_with = "text")]
    pub maximum_number_of_archives: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoBackupSettings {
    #[serde(default, deserialize_with = "null_default")]
    pub autobackup: AutoBackupSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoBackupStatus {
    #[serde(rename = "DiskId", default, deserialize_with = "text")]
    pub disk_id: String,
    #[serde(default, deserialize_with = "text")]
    pub zone_name: String,
}

/// Auto-backup schedule for one disk
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoBackup {
    #[serde(rename = "ID", deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub settings: AutoBackupSettings,
    #[serde(default, deserialize_with = "null_default")]
    pub status: AutoBackupStatus,
}

/// Disk archive
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Archive {
    #[serde(rename = "ID", deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(rename = "SizeMB", default)]
    pub size_mb: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BindPort {
    #[serde(default, deserialize_with = "text")]
    pub proxy_mode: String,
    #[serde(default, deserialize_with = "text")]
    pub port: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyLbServer {
    #[serde(rename = "IPAddress", default, deserialize_with = "text")]
    pub ip_address: String,
    #[serde(default, deserialize_with = "text")]
    pub port: String,
    #[serde(default, deserialize_with = "text")]
    pub enabled: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyLbHealthCheck {
    #[serde(default, deserialize_with = "text")]
    pub protocol: String,
    #[serde(default, deserialize_with = "text")]
    pub path: String,
    #[serde(default, deserialize_with = "text")]
    pub delay_loop: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyLbSpec {
    #[serde(default, deserialize_with = "null_default")]
    pub bind_ports: Vec<BindPort>,
    #[serde(default, deserialize_with = "null_default")]
    pub servers: Vec<ProxyLbServer>,
    #[serde(default, deserialize_with = "null_default")]
    pub health_check: ProxyLbHealthCheck,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProxyLbSettings {
    #[serde(rename = "ProxyLB", default, deserialize_with = "null_default")]
    pub proxy_lb: ProxyLbSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyLbStatusInfo {
    #[serde(rename = "FQDN", default, deserialize_with = "text")]
    pub fqdn: String,
    #[serde(default, deserialize_with = "text")]
    pub region: String,
    #[serde(default, deserialize_with = "null_default")]
    pub proxy_networks: Vec<String>,
}

/// Enhanced (proxy) load balancer, a global resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyLb {
    #[serde(rename = "ID", deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "text")]
    pub availability: String,
    #[serde(default, deserialize_with = "text")]
    pub service_class: String,
    #[serde(default, deserialize_with = "null_default")]
    pub settings: ProxyLbSettings,
    #[serde(default, deserialize_with = "null_default")]
    pub status: ProxyLbStatusInfo,
}

impl ProxyLb {
    pub fn is_available(&self) -> bool {
        self.availability == "available"
    }

    /// Connections-per-second plan, the last segment of the service class
    pub fn plan_cps(&self) -> &str {
        self.service_class.rsplit('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyLbServerHealth {
    #[serde(rename = "IPAddress", default, deserialize_with = "text")]
    pub ip_address: String,
    #[serde(default, deserialize_with = "text")]
    pub port: String,
    #[serde(default, deserialize_with = "text")]
    pub status: String,
    #[serde(default, deserialize_with = "number")]
    pub active_conn: f64,
    #[serde(rename = "CPS", default, deserialize_with = "number")]
    pub cps: f64,
}

impl ProxyLbServerHealth {
    pub fn is_up(&self) -> bool {
        self.status.eq_ignore_ascii_case("up")
    }
}

/// Live health of a proxy load balancer
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyLbHealth {
    #[serde(default, deserialize_with = "number")]
    pub active_conn: f64,
    #[serde(rename = "CPS", default, deserialize_with = "number")]
    pub cps: f64,
    #[serde(rename = "CurrentVIP", default, deserialize_with = "text")]
    pub current_vip: String,
    #[serde(default, deserialize_with = "null_default")]
    pub servers: Vec<ProxyLbServerHealth>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
    #[serde(rename = "ID", default, deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub code: String,
}

/// Identity of the credentials in use
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthStatus {
    #[serde(default, deserialize_with = "null_default")]
    pub account: Account,
}

/// Monthly bill
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bill {
    #[serde(rename = "BillID", default, deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "number")]
    pub amount: f64,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "MemberID", default, deserialize_with = "text")]
    pub member_id: String,
    #[serde(default)]
    pub paid: bool,
}

/// Discount coupon
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Coupon {
    #[serde(rename = "CouponID", default, deserialize_with = "text")]
    pub id: String,
    #[serde(rename = "MemberID", default, deserialize_with = "text")]
    pub member_id: String,
    #[serde(rename = "ContractID", default, deserialize_with = "text")]
    pub contract_id: String,
    #[serde(default, deserialize_with = "number")]
    pub discount: f64,
    #[serde(default)]
    pub applied_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_accepts_numeric_and_string_ids() {
        let server: Server = serde_json::from_value(json!({
            "ID": 112233445566u64,
            "Name": "web",
            "Tags": null,
            "ServerPlan": {"CPU": 2, "MemoryMB": 4096},
            "Instance": {"Status": "up", "Host": {"Name": "sac-is1a-sv001"}},
            "Interfaces": [{"ID": "998877", "IPAddress": "203.0.113.10", "Switch": {"ID": "1", "Scope": "shared"}}],
            "Disks": [{"ID": 5, "Name": "disk", "SizeMB": 20480, "Plan": {"ID": 4, "Name": "SSD"}}]
        }))
        .unwrap();

        assert_eq!(server.id, "112233445566");
        assert!(server.tags.is_empty());
        assert!(server.is_up());
        assert_eq!(server.instance.host.name, "sac-is1a-sv001");
        assert_eq!(server.interfaces[0].upstream_type(), "shared");
        assert_eq!(server.disks[0].id, "5");
        assert_eq!(server.disks[0].plan.name, "SSD");
    }

    #[test]
    fn test_interface_without_switch_is_disconnected() {
        let nic: Interface = serde_json::from_value(json!({"ID": "1", "UserIPAddress": "192.168.0.1"})).unwrap();
        assert_eq!(nic.upstream_type(), "disconnected");
        assert_eq!(nic.address(), "192.168.0.1");
    }

    #[test]
    fn test_database_flattens_common_fields() {
        let db: Database = serde_json::from_value(json!({
            "ID": "123",
            "Class": "database",
            "Name": "db",
            "Availability": "available",
            "Plan": {"ID": 10},
            "Instance": {"Status": "down"},
            "Remark": {"DBConf": {"Common": {"DatabaseName": "MariaDB", "DatabaseVersion": "10.11"}}},
            "Settings": {"DBConf": {"Common": {"WebUI": true}, "Replication": {"Model": "Master-Slave"}}}
        }))
        .unwrap();

        assert_eq!(db.common.id, "123");
        assert_eq!(db.common.plan.id, "10");
        assert!(!db.common.is_up());
        assert_eq!(db.remark.db_conf.common.database_name, "MariaDB");
        assert_eq!(db.settings.db_conf.common.web_ui, "true");
        assert_eq!(db.replication_role(), "master");
    }

    #[test]
    fn test_load_balancer_status_parses_string_counters() {
        let status: Vec<LoadBalancerVipStatus> = serde_json::from_value(json!([{
            "VirtualIPAddress": "192.0.2.10",
            "Port": "80",
            "CPS": "12",
            "Servers": [{"IPAddress": "192.0.2.21", "Port": "80", "Status": "UP", "ActiveConn": "3", "CPS": "1.5"}]
        }]))
        .unwrap();

        assert_eq!(status[0].cps, 12.0);
        assert!(status[0].servers[0].is_up());
        assert_eq!(status[0].servers[0].active_conn, 3.0);
        assert_eq!(status[0].servers[0].cps, 1.5);
    }

    #[test]
    fn test_vpc_router_interfaces_keep_empty_slots() {
        let router: VpcRouter = serde_json::from_value(json!({
            "ID": "1",
            "Plan": {"ID": 2},
            "Settings": {"Router": {
                "Interfaces": [{"IPAddress": ["192.0.2.1"]}, null, {"VirtualIPAddress": "10.0.0.1", "NetworkMaskLen": 24}],
                "L2TPIPsecServer": {"Enabled": "True"}
            }}
        }))
        .unwrap();

        let interfaces = &router.settings.router.interfaces;
        assert_eq!(interfaces.len(), 3);
        assert!(interfaces[1].is_none());
        assert_eq!(interfaces[2].as_ref().unwrap().network_mask_len, "24");
        assert_eq!(router.plan_name(), "premium");
        assert!(router.settings.router.l2tp_ipsec_server.as_ref().unwrap().is_enabled());
    }

    #[test]
    fn test_proxy_lb_plan_from_service_class() {
        let lb = ProxyLb {
            id: "1".into(),
            service_class: "cloud/proxylb/plain/1000".into(),
            ..Default::default()
        };
        assert_eq!(lb.plan_cps(), "1000");
    }

    #[test]
    fn test_bill_dates_parse_with_offset() {
        let bill: Bill = serde_json::from_value(json!({
            "BillID": 1, "Amount": 1234, "Date": "2024-04-30T15:00:00+09:00", "MemberID": "abc"
        }))
        .unwrap();

        assert_eq!(bill.amount, 1234.0);
        assert_eq!(bill.date.unwrap().to_rfc3339(), "2024-04-30T06:00:00+00:00");
    }
}
