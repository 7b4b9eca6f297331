//! Routers ("internet" resources)
//!
//! Routers have no power state; the traffic monitor is always queried.

use super::template::{flatten_tags, CollectContext};
use super::{extend_labels, Collector};
use crate::client::types::Internet;
use crate::client::InternetApi;
use crate::metrics::{GaugeDesc, MetricSample};
use crate::models::Zoned;
use async_trait::async_trait;
use std::sync::Arc;

const IDENT: &[&str] = &["id", "name", "zone"];

const INFO: GaugeDesc = GaugeDesc::new(
    "sakuracloud_internet_info",
    "A metric with a constant '1' value labeled by internet information",
    &["id", "name", "zone", "switch_id", "bandwidth", "nw_mask_len", "tags", "description"],
);
const IN: GaugeDesc = GaugeDesc::new("sakuracloud_internet_in", "Internet's receive bytes (unit: Kbps)", IDENT);
const OUT: GaugeDesc = GaugeDesc::new("sakuracloud_internet_out", "Internet's send bytes (unit: Kbps)", IDENT);

pub struct InternetCollector {
    api: Arc<dyn InternetApi>,
}

impl InternetCollector {
    pub const NAME: &'static str = "internet";

    pub fn new(api: Arc<dyn InternetApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Collector for InternetCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn collect(&self, ctx: &CollectContext) {
        let api = &self.api;
        let Some(routers) = ctx
            .list_all(|zone| {
                let api = Arc::clone(api);
                async move { api.list_internets(&zone).await }
            })
            .await
        else {
            return;
        };

        ctx.for_each_resource(routers, |ctx, router| {
            let api = Arc::clone(api);
            async move { internet_metrics(api.as_ref(), &ctx, router).await }
        })
        .await;
    }
}

async fn internet_metrics(
    api: &dyn InternetApi,
    ctx: &CollectContext,
    item: Zoned<Internet>,
) -> Vec<MetricSample> {
    let Zoned { zone, resource: router } = item;
    let zone = zone.as_str();
    let id = router.id.as_str();
    let ident = [id, router.name.as_str(), zone];

    let mut batch = vec![INFO.sample(
        1.0,
        &extend_labels(
            &ident,
            &[
                &router.switch.id,
                &router.band_width_mbps,
                &router.network_mask_len,
                &flatten_tags(&router.tags),
                &router.description,
            ],
        ),
    )];

    let traffic = ctx
        .settled("traffic", id, api.internet_monitor(zone, id, ctx.window()))
        .await;
    if let Some(sample) = traffic {
        batch.push(IN.sample(sample.value.inbound / 1000.0, &ident).at(sample.time));
        batch.push(OUT.sample(sample.value.outbound / 1000.0, &ident).at(sample.time));
    }

    batch
}
