//! Proxy (enhanced) load balancers
//!
//! These are global resources, listed once through the global zone and
//! labelled without a zone.

use super::template::{flatten_tags, CollectContext};
use super::{extend_labels, Collector};
use crate::client::types::{ProxyLb, ProxyLbHealth};
use crate::client::{ProxyLbApi, GLOBAL_ZONE};
use crate::metrics::{bool_value, GaugeDesc, MetricSample};
use crate::models::Zoned;
use async_trait::async_trait;
use std::sync::Arc;

const IDENT: &[&str] = &["id", "name"];
const SERVER_LABELS: &[&str] = &["id", "name", "server_index", "ipaddress", "port"];

const UP: GaugeDesc = GaugeDesc::new("sakuracloud_proxylb_up", "If 1 the ProxyLB is available, 0 otherwise", IDENT);
const INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_proxylb_info",
    "A metric with a constant '1' value labeled by ProxyLB information",
    &["id", "name", "plan", "fqdn", "region", "proxy_networks", "health_check_protocol", "tags", "description"],
);
const BIND_PORT_INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_proxylb_bind_port_info",
    "A metric with a constant '1' value labeled by bind port information",
    &["id", "name", "bind_port_index", "proxy_mode", "port"],
);
const SERVER_INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_proxylb_server_info",
    "A metric with a constant '1' value labeled by real-server information",
    &["id", "name", "server_index", "ipaddress", "port", "enabled"],
);
const SERVER_UP: GaugeDesc = GaugeDesc::new("sakuracloud_proxylb_server_up", "If 1 the real-server is up, 0 otherwise", SERVER_LABELS);
const ACTIVE_CONNECTIONS: GaugeDesc = GaugeDesc::new("sakuracloud_proxylb_active_connections", "Active connection count", IDENT);
const CONNECTION_PER_SEC: GaugeDesc = GaugeDesc::new("sakuracloud_proxylb_connection_per_sec", "Connection count per second", IDENT);

pub struct ProxyLbCollector {
    api: Arc<dyn ProxyLbApi>,
}

impl ProxyLbCollector {
    pub const NAME: &'static str = "proxylb";

    pub fn new(api: Arc<dyn ProxyLbApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Collector for ProxyLbCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn collect(&self, ctx: &CollectContext) {
        let api = &self.api;
        let global = [GLOBAL_ZONE.to_string()];
        let Some(proxy_lbs) = ctx
            .list_in(&global, |zone| {
                let api = Arc::clone(api);
                async move { api.list_proxy_lbs(&zone).await }
            })
            .await
        else {
            return;
        };

        ctx.for_each_resource(proxy_lbs, |ctx, lb| {
            let api = Arc::clone(api);
            async move { proxy_lb_metrics(api.as_ref(), &ctx, lb).await }
        })
        .await;
    }
}

async fn proxy_lb_metrics(
    api: &dyn ProxyLbApi,
    ctx: &CollectContext,
    item: Zoned<ProxyLb>,
) -> Vec<MetricSample> {
    let Zoned { zone, resource: lb } = item;
    let zone = zone.as_str();
    let id = lb.id.as_str();
    let ident = [id, lb.name.as_str()];
    let spec = &lb.settings.proxy_lb;

    let mut batch = vec![
        UP.sample(bool_value(lb.is_available()), &ident),
        INFO.sample(
            1.0,
            &extend_labels(
                &ident,
                &[
                    lb.plan_cps(),
                    &lb.status.fqdn,
                    &lb.status.region,
                    &lb.status.proxy_networks.join(","),
                    &spec.health_check.protocol,
                    &flatten_tags(&lb.tags),
                    &lb.description,
                ],
            ),
        ),
    ];

    for (index, port) in spec.bind_ports.iter().enumerate() {
        batch.push(BIND_PORT_INFO.sample(
            1.0,
            &extend_labels(&ident, &[&index.to_string(), &port.proxy_mode, &port.port]),
        ));
    }
    for (index, server) in spec.servers.iter().enumerate() {
        batch.push(SERVER_INFO.sample(
            1.0,
            &extend_labels(&ident, &[&index.to_string(), &server.ip_address, &server.port, &server.enabled]),
        ));
    }

    let health = ctx.fetch("health", id, api.proxy_lb_health(zone, id));
    let connections = async {
        if lb.is_available() {
            ctx.settled("connections", id, api.proxy_lb_monitor(zone, id, ctx.window()))
                .await
        } else {
            None
        }
    };
    let (health, connections) = tokio::join!(health, connections);

    if let Some(health) = health {
        health_metrics(&lb, &ident, &health, &mut batch);
    }
    if let Some(sample) = connections {
        batch.push(ACTIVE_CONNECTIONS.sample(sample.value.active_connections, &ident).at(sample.time));
        batch.push(CONNECTION_PER_SEC.sample(sample.value.connections_per_sec, &ident).at(sample.time));
    }

    batch
}

fn health_metrics(lb: &ProxyLb, ident: &[&str], health: &ProxyLbHealth, batch: &mut Vec<MetricSample>) {
    for (index, server) in lb.settings.proxy_lb.servers.iter().enumerate() {
        let up = health
            .servers
            .iter()
            .find(|s| s.ip_address == server.ip_address && s.port == server.port)
            .is_some_and(|s| s.is_up());
        let index = index.to_string();
        batch.push(SERVER_UP.sample(
            bool_value(up),
            &extend_labels(ident, &[&index, &server.ip_address, &server.port]),
        ));
    }
}
