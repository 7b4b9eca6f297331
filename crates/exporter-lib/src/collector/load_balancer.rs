//! Load balancer appliances

use super::template::{flatten_tags, CollectContext};
use super::{extend_labels, Collector};
use crate::client::types::{LoadBalancer, LoadBalancerVipStatus};
use crate::client::{ApplianceMonitorApi, LoadBalancerApi};
use crate::metrics::{bool_value, GaugeDesc, MetricSample};
use crate::models::Zoned;
use async_trait::async_trait;
use std::sync::Arc;

const IDENT: &[&str] = &["id", "name", "zone"];
const VIP_LABELS: &[&str] = &["id", "name", "zone", "vip_index", "vip"];
const SERVER_LABELS: &[&str] = &["id", "name", "zone", "vip_index", "vip", "server_index", "ipaddress"];

const UP: GaugeDesc = GaugeDesc::new("sakuracloud_loadbalancer_up", "If 1 the loadbalancer is up and running, 0 otherwise", IDENT);
const INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_loadbalancer_info",
    "A metric with a constant '1' value labeled by loadbalancer information",
    &["id", "name", "zone", "plan", "host", "vrid", "ipaddress", "tags", "description"],
);
const VIP_INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_loadbalancer_vip_info",
    "A metric with a constant '1' value labeled by vip information",
    &["id", "name", "zone", "vip_index", "vip", "port", "interval", "sorry_server", "description"],
);
const SERVER_INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_loadbalancer_server_info",
    "A metric with a constant '1' value labeled by real-server information",
    &["id", "name", "zone", "vip_index", "vip", "server_index", "ipaddress", "port", "monitor", "path", "response_code"],
);
const VIP_CPS: GaugeDesc = GaugeDesc::new("sakuracloud_loadbalancer_vip_cps", "Connection count per second", VIP_LABELS);
const SERVER_UP: GaugeDesc = GaugeDesc::new("sakuracloud_loadbalancer_server_up", "If 1 the real-server is up, 0 otherwise", SERVER_LABELS);
const SERVER_CONNECTION: GaugeDesc = GaugeDesc::new("sakuracloud_loadbalancer_server_connection", "Current connection count", SERVER_LABELS);
const SERVER_CPS: GaugeDesc = GaugeDesc::new("sakuracloud_loadbalancer_server_cps", "Connection count per second", SERVER_LABELS);
const RECEIVE: GaugeDesc = GaugeDesc::new("sakuracloud_loadbalancer_receive", "Loadbalancer's receive bytes (unit: bps)", IDENT);
const SEND: GaugeDesc = GaugeDesc::new("sakuracloud_loadbalancer_send", "Loadbalancer's send bytes (unit: bps)", IDENT);

pub struct LoadBalancerCollector {
    api: Arc<dyn LoadBalancerApi>,
}

impl LoadBalancerCollector {
    pub const NAME: &'static str = "loadbalancer";

    pub fn new(api: Arc<dyn LoadBalancerApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Collector for LoadBalancerCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn collect(&self, ctx: &CollectContext) {
        let api = &self.api;
        let Some(load_balancers) = ctx
            .list_all(|zone| {
                let api = Arc::clone(api);
                async move { api.list_load_balancers(&zone).await }
            })
            .await
        else {
            return;
        };

        ctx.for_each_resource(load_balancers, |ctx, lb| {
            let api = Arc::clone(api);
            async move { load_balancer_metrics(api.as_ref(), &ctx, lb).await }
        })
        .await;
    }
}

async fn load_balancer_metrics(
    api: &dyn LoadBalancerApi,
    ctx: &CollectContext,
    item: Zoned<LoadBalancer>,
) -> Vec<MetricSample> {
    let Zoned { zone, resource: lb } = item;
    let zone = zone.as_str();
    let common = &lb.common;
    let id = common.id.as_str();
    let ident = [id, common.name.as_str(), zone];
    let address = common.interfaces.first().map(|nic| nic.address()).unwrap_or_default();

    let mut batch = vec![
        UP.sample(bool_value(common.is_up()), &ident),
        INFO.sample(
            1.0,
            &extend_labels(
                &ident,
                &[
                    &common.plan.id,
                    &common.instance.host.name,
                    &lb.remark.vrrp.vrid,
                    address,
                    &flatten_tags(&common.tags),
                    &common.description,
                ],
            ),
        ),
    ];

    for (vip_index, vip) in lb.settings.load_balancer.iter().enumerate() {
        let vip_index = vip_index.to_string();
        batch.push(VIP_INFO.sample(
            1.0,
            &extend_labels(
                &ident,
                &[&vip_index, &vip.virtual_ip_address, &vip.port, &vip.delay_loop, &vip.sorry_server, &vip.description],
            ),
        ));
        for (server_index, server) in vip.servers.iter().enumerate() {
            batch.push(SERVER_INFO.sample(
                1.0,
                &extend_labels(
                    &ident,
                    &[
                        &vip_index,
                        &vip.virtual_ip_address,
                        &server_index.to_string(),
                        &server.ip_address,
                        &server.port,
                        &server.health_check.protocol,
                        &server.health_check.path,
                        &server.health_check.status,
                    ],
                ),
            ));
        }
    }

    let status = ctx.fetch("status", id, api.load_balancer_status(zone, id));
    let traffic = async {
        if common.is_up() {
            ctx.settled("nic", id, api.appliance_interface_monitor(zone, id, 0, ctx.window()))
                .await
        } else {
            None
        }
    };
    let (status, traffic) = tokio::join!(status, traffic);

    if let Some(status) = status {
        status_metrics(&lb, &ident, &status, &mut batch);
    }
    if let Some(sample) = traffic {
        batch.push(RECEIVE.sample(sample.value.receive * 8.0, &ident).at(sample.time));
        batch.push(SEND.sample(sample.value.send * 8.0, &ident).at(sample.time));
    }

    batch
}

/// Match live VIP and real-server status to the configured entries
fn status_metrics(
    lb: &LoadBalancer,
    ident: &[&str],
    status: &[LoadBalancerVipStatus],
    batch: &mut Vec<MetricSample>,
) {
    for (vip_index, vip) in lb.settings.load_balancer.iter().enumerate() {
        let Some(vip_status) = status
            .iter()
            .find(|s| s.virtual_ip_address == vip.virtual_ip_address && s.port == vip.port)
        else {
            continue;
        };

        let vip_index = vip_index.to_string();
        let vip_labels = extend_labels(ident, &[&vip_index, &vip.virtual_ip_address]);
        batch.push(VIP_CPS.sample(vip_status.cps, &vip_labels));

        for (server_index, server) in vip.servers.iter().enumerate() {
            let Some(server_status) = vip_status
                .servers
                .iter()
                .find(|s| s.ip_address == server.ip_address && s.port == server.port)
            else {
                continue;
            };

            let server_index = server_index.to_string();
            let labels = extend_labels(&vip_labels, &[&server_index, &server.ip_address]);
            batch.push(SERVER_UP.sample(bool_value(server_status.is_up()), &labels));
            batch.push(SERVER_CONNECTION.sample(server_status.active_conn, &labels));
            batch.push(SERVER_CPS.sample(server_status.cps, &labels));
        }
    }
}
