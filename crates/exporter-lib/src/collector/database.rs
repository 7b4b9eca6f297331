//! Database appliances

use super::template::{flatten_tags, CollectContext};
use super::{extend_labels, Collector};
use crate::client::types::Database;
use crate::client::DatabaseApi;
use crate::metrics::{bool_value, GaugeDesc, MetricSample};
use crate::models::Zoned;
use async_trait::async_trait;
use std::sync::Arc;

const IDENT: &[&str] = &["id", "name", "zone"];

const UP: GaugeDesc = GaugeDesc::new("sakuracloud_database_up", "If 1 the database is up and running, 0 otherwise", IDENT);
const INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_database_info",
    "A metric with a constant '1' value labeled by database information",
    &[
        "id", "name", "zone", "plan", "host", "database_type", "database_version", "database_revision",
        "web_ui", "replication_enabled", "replication_role", "tags", "description",
    ],
);
const CPU_TIME: GaugeDesc = GaugeDesc::new("sakuracloud_database_cpu_time", "Database's CPU time (unit: ms)", IDENT);
const MEMORY_SIZE: GaugeDesc = GaugeDesc::new("sakuracloud_database_memory_size", "Database's total memory size (unit: MB)", IDENT);
const MEMORY_USED: GaugeDesc = GaugeDesc::new("sakuracloud_database_memory_used", "Database's used memory size (unit: MB)", IDENT);
const DISK_SYSTEM_SIZE: GaugeDesc = GaugeDesc::new("sakuracloud_database_disk_system_size", "Database's system disk size (unit: MB)", IDENT);
const DISK_SYSTEM_USED: GaugeDesc = GaugeDesc::new("sakuracloud_database_disk_system_used", "Database's used system disk size (unit: MB)", IDENT);
const DISK_BACKUP_SIZE: GaugeDesc = GaugeDesc::new("sakuracloud_database_disk_backup_size", "Database's backup disk size (unit: MB)", IDENT);
const DISK_BACKUP_USED: GaugeDesc = GaugeDesc::new("sakuracloud_database_disk_backup_used", "Database's used backup disk size (unit: MB)", IDENT);
const BINLOG_USED: GaugeDesc = GaugeDesc::new("sakuracloud_database_binlog_used", "Database's used binlog size (unit: KB)", IDENT);
const REPLICATION_DELAY: GaugeDesc = GaugeDesc::new("sakuracloud_database_replication_delay", "Replication delay time (unit: second)", IDENT);
const NIC_RECEIVE: GaugeDesc = GaugeDesc::new("sakuracloud_database_nic_receive", "NIC's receive bytes (unit: bps)", IDENT);
const NIC_SEND: GaugeDesc = GaugeDesc::new("sakuracloud_database_nic_send", "NIC's send bytes (unit: bps)", IDENT);
const DISK_READ: GaugeDesc = GaugeDesc::new("sakuracloud_database_disk_read", "Disk's read bytes (unit: Bps)", IDENT);
const DISK_WRITE: GaugeDesc = GaugeDesc::new("sakuracloud_database_disk_write", "Disk's write bytes (unit: Bps)", IDENT);

pub struct DatabaseCollector {
    api: Arc<dyn DatabaseApi>,
}

impl DatabaseCollector {
    pub const NAME: &'static str = "database";

    pub fn new(api: Arc<dyn DatabaseApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Collector for DatabaseCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn collect(&self, ctx: &CollectContext) {
        let api = &self.api;
        let Some(databases) = ctx
            .list_all(|zone| {
                let api = Arc::clone(api);
                async move { api.list_databases(&zone).await }
            })
            .await
        else {
            return;
        };

        ctx.for_each_resource(databases, |ctx, db| {
            let api = Arc::clone(api);
            async move { database_metrics(api.as_ref(), &ctx, db).await }
        })
        .await;
    }
}

async fn database_metrics(
    api: &dyn DatabaseApi,
    ctx: &CollectContext,
    item: Zoned<Database>,
) -> Vec<MetricSample> {
    let Zoned { zone, resource: db } = item;
    let zone = zone.as_str();
    let common = &db.common;
    let ident = [common.id.as_str(), common.name.as_str(), zone];
    let remark = &db.remark.db_conf.common;
    let role = db.replication_role();

    let mut batch = vec![
        UP.sample(bool_value(common.is_up()), &ident),
        INFO.sample(
            1.0,
            &extend_labels(
                &ident,
                &[
                    &common.plan.id,
                    &common.instance.host.name,
                    &remark.database_name,
                    &remark.database_version,
                    &remark.database_revision,
                    &db.settings.db_conf.common.web_ui,
                    if role.is_empty() { "0" } else { "1" },
                    role,
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
    let id = common.id.as_str();
    let (cpu, nic, disk, usage) = tokio::join!(
        ctx.settled("cpu_time", id, api.appliance_cpu_monitor(zone, id, window)),
        ctx.settled("nic", id, api.appliance_interface_monitor(zone, id, 0, window)),
        ctx.settled("disk", id, api.database_disk_monitor(zone, id, window)),
        ctx.settled("database", id, api.database_monitor(zone, id, window)),
    );

    if let Some(sample) = cpu {
        batch.push(CPU_TIME.sample(sample.value.cpu_time * 1000.0, &ident).at(sample.time));
    }
    if let Some(sample) = nic {
        batch.push(NIC_RECEIVE.sample(sample.value.receive * 8.0, &ident).at(sample.time));
        batch.push(NIC_SEND.sample(sample.value.send * 8.0, &ident).at(sample.time));
    }
    if let Some(sample) = disk {
        batch.push(DISK_READ.sample(sample.value.read, &ident).at(sample.time));
        batch.push(DISK_WRITE.sample(sample.value.write, &ident).at(sample.time));
    }
    if let Some(sample) = usage {
        let v = sample.value;
        for (desc, value) in [
            (MEMORY_SIZE, v.total_memory_size),
            (MEMORY_USED, v.used_memory_size),
            (DISK_SYSTEM_SIZE, v.total_disk1_size),
            (DISK_SYSTEM_USED, v.used_disk1_size),
            (DISK_BACKUP_SIZE, v.total_disk2_size),
            (DISK_BACKUP_USED, v.used_disk2_size),
            (BINLOG_USED, v.binlog_used_size_kib),
        ] {
            batch.push(desc.sample(value, &ident).at(sample.time));
        }
        if role == "slave" {
            batch.push(REPLICATION_DELAY.sample(v.delay_time_sec, &ident).at(sample.time));
        }
    }

    batch
}
