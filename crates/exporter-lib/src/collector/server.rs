//! Virtual servers

use super::template::{flatten_tags, CollectContext};
use super::{extend_labels, Collector};
use crate::client::types::Server;
use crate::client::ServerApi;
use crate::metrics::{bool_value, GaugeDesc, MetricSample};
use crate::models::Zoned;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

const IDENT: &[&str] = &["id", "name", "zone"];

const UP: GaugeDesc = GaugeDesc::new("sakuracloud_server_up", "If 1 the server is up and running, 0 otherwise", IDENT);
const INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_server_info",
    "A metric with a constant '1' value labeled by server information",
    &["id", "name", "zone", "cpus", "disks", "nics", "memories", "host", "commitment", "tags", "description"],
);
const CPUS: GaugeDesc = GaugeDesc::new("sakuracloud_server_cpus", "Number of server's vCPU cores", IDENT);
const MEMORIES: GaugeDesc = GaugeDesc::new("sakuracloud_server_memories", "Size of server's memories (unit: GB)", IDENT);
const NIC_INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_server_nic_info",
    "A metric with a constant '1' value labeled by nic information",
    &["id", "name", "zone", "interface_id", "nic_index", "upstream_type", "upstream_id", "upstream_name", "ipaddress"],
);
const DISK_INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_server_disk_info",
    "A metric with a constant '1' value labeled by disk information",
    &["id", "name", "zone", "disk_id", "disk_name", "index", "plan", "connection", "size"],
);
const CPU_TIME: GaugeDesc = GaugeDesc::new("sakuracloud_server_cpu_time", "Server's CPU time (unit: ms)", IDENT);

const NIC_LABELS: &[&str] = &["id", "name", "zone", "interface_id", "nic_index"];
const NIC_RECEIVE: GaugeDesc = GaugeDesc::new("sakuracloud_server_nic_receive", "NIC's receive bytes (unit: bps)", NIC_LABELS);
const NIC_SEND: GaugeDesc = GaugeDesc::new("sakuracloud_server_nic_send", "NIC's send bytes (unit: bps)", NIC_LABELS);

const DISK_LABELS: &[&str] = &["id", "name", "zone", "disk_id", "disk_name", "index"];
const DISK_READ: GaugeDesc = GaugeDesc::new("sakuracloud_server_disk_read", "Disk's read bytes (unit: Bps)", DISK_LABELS);
const DISK_WRITE: GaugeDesc = GaugeDesc::new("sakuracloud_server_disk_write", "Disk's write bytes (unit: Bps)", DISK_LABELS);

pub struct ServerCollector {
    api: Arc<dyn ServerApi>,
}

impl ServerCollector {
    pub const NAME: &'static str = "server";

    pub fn new(api: Arc<dyn ServerApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Collector for ServerCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn collect(&self, ctx: &CollectContext) {
        let api = &self.api;
        let Some(servers) = ctx
            .list_all(|zone| {
                let api = Arc::clone(api);
                async move { api.list_servers(&zone).await }
            })
            .await
        else {
            return;
        };

        ctx.for_each_resource(servers, |ctx, server| {
            let api = Arc::clone(api);
            async move { server_metrics(api.as_ref(), &ctx, server).await }
        })
        .await;
    }
}

async fn server_metrics(
    api: &dyn ServerApi,
    ctx: &CollectContext,
    item: Zoned<Server>,
) -> Vec<MetricSample> {
    let Zoned { zone, resource: server } = item;
    let zone = zone.as_str();
    let ident = [server.id.as_str(), server.name.as_str(), zone];

    let mut batch = vec![
        UP.sample(bool_value(server.is_up()), &ident),
        CPUS.sample(f64::from(server.server_plan.cpu), &ident),
        MEMORIES.sample(server.server_plan.memory_mb as f64 / 1024.0, &ident),
        INFO.sample(
            1.0,
            &extend_labels(
                &ident,
                &[
                    &server.server_plan.cpu.to_string(),
                    &server.disks.len().to_string(),
                    &server.interfaces.len().to_string(),
                    &(server.server_plan.memory_mb / 1024).to_string(),
                    &server.instance.host.name,
                    &server.server_plan.commitment,
                    &flatten_tags(&server.tags),
                    &server.description,
                ],
            ),
        ),
    ];

    for (index, nic) in server.interfaces.iter().enumerate() {
        let (upstream_id, upstream_name) = nic
            .switch
            .as_ref()
            .map(|s| (s.id.as_str(), s.name.as_str()))
            .unwrap_or_default();
        batch.push(NIC_INFO.sample(
            1.0,
            &extend_labels(
                &ident,
                &[&nic.id, &index.to_string(), nic.upstream_type(), upstream_id, upstream_name, nic.address()],
            ),
        ));
    }

    for (index, disk) in server.disks.iter().enumerate() {
        batch.push(DISK_INFO.sample(
            1.0,
            &extend_labels(
                &ident,
                &[
                    &disk.id,
                    &disk.name,
                    &index.to_string(),
                    &disk.plan.name,
                    &disk.connection,
                    &(disk.size_mb / 1024).to_string(),
                ],
            ),
        ));
    }

    if !server.is_up() {
        return batch;
    }

    let window = ctx.window();
    let cpu = ctx.settled("cpu_time", &server.id, api.server_cpu_monitor(zone, &server.id, window));
    let nics = join_all(server.interfaces.iter().enumerate().map(|(index, nic)| async move {
        let sample = ctx
            .settled("nic", &nic.id, api.interface_monitor(zone, &nic.id, window))
            .await;
        (index, nic, sample)
    }));
    let disks = join_all(server.disks.iter().enumerate().map(|(index, disk)| async move {
        let sample = ctx
            .settled("disk", &disk.id, api.disk_monitor(zone, &disk.id, window))
            .await;
        (index, disk, sample)
    }));
    let (cpu, nics, disks) = tokio::join!(cpu, nics, disks);

    if let Some(sample) = cpu {
        batch.push(CPU_TIME.sample(sample.value.cpu_time * 1000.0, &ident).at(sample.time));
    }

    for (index, nic, sample) in nics {
        let Some(sample) = sample else { continue };
        let index = index.to_string();
        let labels = extend_labels(&ident, &[&nic.id, &index]);
        batch.push(NIC_RECEIVE.sample(sample.value.receive * 8.0, &labels).at(sample.time));
        batch.push(NIC_SEND.sample(sample.value.send * 8.0, &labels).at(sample.time));
    }

    for (index, disk, sample) in disks {
        let Some(sample) = sample else { continue };
        let index = index.to_string();
        let labels = extend_labels(&ident, &[&disk.id, &disk.name, &index]);
        batch.push(DISK_READ.sample(sample.value.read, &labels).at(sample.time));
        batch.push(DISK_WRITE.sample(sample.value.write, &labels).at(sample.time));
    }

    batch
}
