//! NFS appliances

use super::template::{flatten_tags, CollectContext};
use super::{extend_labels, Collector};
use crate::client::types::Nfs;
use crate::client::{ApplianceMonitorApi, NfsApi};
use crate::metrics::{bool_value, GaugeDesc, MetricSample};
use crate::models::Zoned;
use async_trait::async_trait;
use std::sync::Arc;

const IDENT: &[&str] = &["id", "name", "zone"];

const UP: GaugeDesc = GaugeDesc::new("sakuracloud_nfs_up", "If 1 the NFS is up and running, 0 otherwise", IDENT);
const INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_nfs_info",
    "A metric with a constant '1' value labeled by NFS information",
    &["id", "name", "zone", "plan", "host", "ipaddress", "tags", "description"],
);
const FREE_DISK_SIZE: GaugeDesc = GaugeDesc::new("sakuracloud_nfs_free_disk_size", "NFS's free disk size (unit: KB)", IDENT);
const NIC_RECEIVE: GaugeDesc = GaugeDesc::new("sakuracloud_nfs_nic_receive", "NIC's receive bytes (unit: bps)", IDENT);
const NIC_SEND: GaugeDesc = GaugeDesc::new("sakuracloud_nfs_nic_send", "NIC's send bytes (unit: bps)", IDENT);

pub struct NfsCollector {
    api: Arc<dyn NfsApi>,
}

impl NfsCollector {
    pub const NAME: &'static str = "nfs";

    pub fn new(api: Arc<dyn NfsApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Collector for NfsCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn collect(&self, ctx: &CollectContext) {
        let api = &self.api;
        let Some(appliances) = ctx
            .list_all(|zone| {
                let api = Arc::clone(api);
                async move { api.list_nfs(&zone).await }
            })
            .await
        else {
            return;
        };

        ctx.for_each_resource(appliances, |ctx, nfs| {
            let api = Arc::clone(api);
            async move { nfs_metrics(api.as_ref(), &ctx, nfs).await }
        })
        .await;
    }
}

async fn nfs_metrics(api: &dyn NfsApi, ctx: &CollectContext, item: Zoned<Nfs>) -> Vec<MetricSample> {
    let Zoned { zone, resource: nfs } = item;
    let zone = zone.as_str();
    let common = &nfs.common;
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
                    address,
                    &flatten_tags(&common.tags),
                    &common.description,
                ],
            ),
        ),
    ];

    if !common.is_up() {
        return batch;
    }

    let window = ctx.window();
    let (free, nic) = tokio::join!(
        ctx.settled("free_disk_size", id, api.nfs_free_disk_monitor(zone, id, window)),
        ctx.settled("nic", id, api.appliance_interface_monitor(zone, id, 0, window)),
    );

    if let Some(sample) = free {
        batch.push(FREE_DISK_SIZE.sample(sample.value.free_disk_size, &ident).at(sample.time));
    }
    if let Some(sample) = nic {
        batch.push(NIC_RECEIVE.sample(sample.value.receive * 8.0, &ident).at(sample.time));
        batch.push(NIC_SEND.sample(sample.value.send * 8.0, &ident).at(sample.time));
    }

    batch
}
