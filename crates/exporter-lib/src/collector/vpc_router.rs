//! VPC router appliances

use super::template::{flatten_tags, CollectContext};
use super::{extend_labels, Collector};
use crate::client::types::{VpcRouter, VpcRouterInterfaceSetting, VpcRouterStatus};
use crate::client::VpcRouterApi;
use crate::metrics::{bool_value, GaugeDesc, MetricSample};
use crate::models::Zoned;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

const IDENT: &[&str] = &["id", "name", "zone"];
const NIC_LABELS: &[&str] = &["id", "name", "zone", "nic_index", "vip", "ipaddress", "nw_mask_len"];
const PEER_LABELS: &[&str] = &["id", "name", "zone", "peer_index", "peer_address"];

const UP: GaugeDesc = GaugeDesc::new("sakuracloud_vpc_router_up", "If 1 the vpc_router is up and running, 0 otherwise", IDENT);
const INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_vpc_router_info",
    "A metric with a constant '1' value labeled by vpc_router information",
    &["id", "name", "zone", "plan", "host", "ha", "vrid", "vip", "ipaddress1", "ipaddress2", "nw_mask_len", "tags", "description"],
);
const SESSION_COUNT: GaugeDesc = GaugeDesc::new("sakuracloud_vpc_router_session_count", "Current session count", IDENT);
const DHCP_LEASE_COUNT: GaugeDesc = GaugeDesc::new("sakuracloud_vpc_router_dhcp_lease_count", "Current DHCP lease count", IDENT);
const L2TP_SESSION_COUNT: GaugeDesc = GaugeDesc::new("sakuracloud_vpc_router_l2tp_session_count", "Current L2TP-IPsec session count", IDENT);
const PPTP_SESSION_COUNT: GaugeDesc = GaugeDesc::new("sakuracloud_vpc_router_pptp_session_count", "Current PPTP session count", IDENT);
const PEER_STATUS: GaugeDesc = GaugeDesc::new(
    "sakuracloud_vpc_router_site_to_site_peer_status",
    "The status of site-to-site IPsec VPN peer. If 1 the peer is up, 0 otherwise",
    PEER_LABELS,
);
const CPU_TIME: GaugeDesc = GaugeDesc::new("sakuracloud_vpc_router_cpu_time", "VPCRouter's CPU time (unit: ms)", IDENT);
const RECEIVE: GaugeDesc = GaugeDesc::new("sakuracloud_vpc_router_receive", "VPCRouter's receive bytes (unit: bps)", NIC_LABELS);
const SEND: GaugeDesc = GaugeDesc::new("sakuracloud_vpc_router_send", "VPCRouter's send bytes (unit: bps)", NIC_LABELS);

pub struct VpcRouterCollector {
    api: Arc<dyn VpcRouterApi>,
}

impl VpcRouterCollector {
    pub const NAME: &'static str = "vpc_router";

    pub fn new(api: Arc<dyn VpcRouterApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Collector for VpcRouterCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn collect(&self, ctx: &CollectContext) {
        let api = &self.api;
        let Some(routers) = ctx
            .list_all(|zone| {
                let api = Arc::clone(api);
                async move { api.list_vpc_routers(&zone).await }
            })
            .await
        else {
            return;
        };

        ctx.for_each_resource(routers, |ctx, router| {
            let api = Arc::clone(api);
            async move { vpc_router_metrics(api.as_ref(), &ctx, router).await }
        })
        .await;
    }
}

fn interface_setting(router: &VpcRouter, index: usize) -> Option<&VpcRouterInterfaceSetting> {
    router.settings.router.interfaces.get(index).and_then(Option::as_ref)
}

async fn vpc_router_metrics(
    api: &dyn VpcRouterApi,
    ctx: &CollectContext,
    item: Zoned<VpcRouter>,
) -> Vec<MetricSample> {
    let Zoned { zone, resource: router } = item;
    let zone = zone.as_str();
    let common = &router.common;
    let id = common.id.as_str();
    let ident = [id, common.name.as_str(), zone];
    let settings = &router.settings.router;

    let primary = interface_setting(&router, 0);
    let ip = |i: usize| {
        primary
            .and_then(|s| s.ip_address.get(i))
            .map(String::as_str)
            .unwrap_or_default()
    };
    let mut batch = vec![
        UP.sample(bool_value(common.is_up()), &ident),
        INFO.sample(
            1.0,
            &extend_labels(
                &ident,
                &[
                    router.plan_name(),
                    &common.instance.host.name,
                    if settings.vrid.is_empty() { "0" } else { "1" },
                    &settings.vrid,
                    primary.map(|s| s.virtual_ip_address.as_str()).unwrap_or_default(),
                    ip(0),
                    ip(1),
                    primary.map(|s| s.network_mask_len.as_str()).unwrap_or_default(),
                    &flatten_tags(&common.tags),
                    &common.description,
                ],
            ),
        ),
    ];

    let status = ctx.fetch("status", id, api.vpc_router_status(zone, id));
    let activity = async {
        if !common.is_up() {
            return (None, Vec::new());
        }
        let window = ctx.window();
        let cpu = ctx.settled("cpu_time", id, api.appliance_cpu_monitor(zone, id, window));
        // Only interfaces attached to a network report traffic.
        let nics = join_all(
            common
                .interfaces
                .iter()
                .enumerate()
                .filter(|(_, nic)| nic.switch.is_some())
                .map(|(index, _)| async move {
                    let sample = ctx
                        .settled("nic", id, api.appliance_interface_monitor(zone, id, index, window))
                        .await;
                    (index, sample)
                }),
        );
        tokio::join!(cpu, nics)
    };
    let (status, (cpu, nics)) = tokio::join!(status, activity);

    if let Some(status) = status {
        status_metrics(&router, &ident, &status, &mut batch);
    }

    if let Some(sample) = cpu {
        batch.push(CPU_TIME.sample(sample.value.cpu_time * 1000.0, &ident).at(sample.time));
    }

    for (index, sample) in nics {
        let Some(sample) = sample else { continue };
        let setting = interface_setting(&router, index);
        let nic_index = index.to_string();
        let labels = extend_labels(
            &ident,
            &[
                &nic_index,
                setting.map(|s| s.virtual_ip_address.as_str()).unwrap_or_default(),
                setting
                    .and_then(|s| s.ip_address.first())
                    .map(String::as_str)
                    .unwrap_or_default(),
                setting.map(|s| s.network_mask_len.as_str()).unwrap_or_default(),
            ],
        );
        batch.push(RECEIVE.sample(sample.value.receive * 8.0, &labels).at(sample.time));
        batch.push(SEND.sample(sample.value.send * 8.0, &labels).at(sample.time));
    }

    batch
}

fn status_metrics(
    router: &VpcRouter,
    ident: &[&str],
    status: &VpcRouterStatus,
    batch: &mut Vec<MetricSample>,
) {
    let settings = &router.settings.router;

    batch.push(SESSION_COUNT.sample(status.session_count, ident));
    batch.push(DHCP_LEASE_COUNT.sample(status.dhcp_server_leases.len() as f64, ident));

    if settings.l2tp_ipsec_server.as_ref().is_some_and(|f| f.is_enabled()) {
        batch.push(L2TP_SESSION_COUNT.sample(status.l2tp_ipsec_server_sessions.len() as f64, ident));
    }
    if settings.pptp_server.as_ref().is_some_and(|f| f.is_enabled()) {
        batch.push(PPTP_SESSION_COUNT.sample(status.pptp_server_sessions.len() as f64, ident));
    }

    let peers = settings
        .site_to_site
        .as_ref()
        .map(|s| s.config.as_slice())
        .unwrap_or_default();
    for (index, peer) in peers.iter().enumerate() {
        let up = status
            .site_to_site_peers
            .iter()
            .any(|s| s.peer == peer.peer && s.status.eq_ignore_ascii_case("up"));
        let index = index.to_string();
        batch.push(PEER_STATUS.sample(bool_value(up), &extend_labels(ident, &[&index, &peer.peer])));
    }
}
