//! Auto-backup schedules and the archives they produced

use super::template::{flatten_tags, CollectContext};
use super::{extend_labels, Collector};
use crate::client::types::AutoBackup;
use crate::client::AutoBackupApi;
use crate::metrics::{GaugeDesc, MetricSample};
use crate::models::Zoned;
use async_trait::async_trait;
use std::sync::Arc;

const IDENT: &[&str] = &["id", "name", "zone"];

const INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_auto_backup_info",
    "A metric with a constant '1' value labeled by auto-backup information",
    &["id", "name", "zone", "disk_id", "max_backup_num", "weekdays", "tags", "description"],
);
const COUNT: GaugeDesc = GaugeDesc::new("sakuracloud_auto_backup_count", "A count of archives created by auto-backup", IDENT);
const LAST_TIME: GaugeDesc = GaugeDesc::new(
    "sakuracloud_auto_backup_last_time",
    "Creation time of the newest archive (unix time in milliseconds)",
    IDENT,
);
const ARCHIVE_INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_auto_backup_archive_info",
    "A metric with a constant '1' value labeled by backuped archive information",
    &["id", "name", "zone", "archive_id", "archive_name", "archive_tags", "archive_description"],
);

pub struct AutoBackupCollector {
    api: Arc<dyn AutoBackupApi>,
}

impl AutoBackupCollector {
    pub const NAME: &'static str = "auto_backup";

    pub fn new(api: Arc<dyn AutoBackupApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Collector for AutoBackupCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn collect(&self, ctx: &CollectContext) {
        let api = &self.api;
        let Some(backups) = ctx
            .list_all(|zone| {
                let api = Arc::clone(api);
                async move { api.list_auto_backups(&zone).await }
            })
            .await
        else {
            return;
        };

        ctx.for_each_resource(backups, |ctx, backup| {
            let api = Arc::clone(api);
            async move { auto_backup_metrics(api.as_ref(), &ctx, backup).await }
        })
        .await;
    }
}

async fn auto_backup_metrics(
    api: &dyn AutoBackupApi,
    ctx: &CollectContext,
    item: Zoned<AutoBackup>,
) -> Vec<MetricSample> {
    let Zoned { zone, resource: backup } = item;
    let zone = zone.as_str();
    let ident = [backup.id.as_str(), backup.name.as_str(), zone];
    let spec = &backup.settings.autobackup;

    let mut batch = vec![INFO.sample(
        1.0,
        &extend_labels(
            &ident,
            &[
                &backup.status.disk_id,
                &spec.maximum_number_of_archives,
                &spec.backup_span_weekdays.join(","),
                &flatten_tags(&backup.tags),
                &backup.description,
            ],
        ),
    )];

    let Some(archives) = ctx
        .fetch("archives", &backup.id, api.list_auto_backup_archives(zone, &backup))
        .await
    else {
        return batch;
    };

    batch.push(COUNT.sample(archives.len() as f64, &ident));
    if let Some(newest) = archives.iter().filter_map(|a| a.created_at).max() {
        batch.push(LAST_TIME.sample(newest.timestamp_millis() as f64, &ident));
    }
    for archive in &archives {
        batch.push(ARCHIVE_INFO.sample(
            1.0,
            &extend_labels(
                &ident,
                &[&archive.id, &archive.name, &flatten_tags(&archive.tags), &archive.description],
            ),
        ));
    }

    batch
}
