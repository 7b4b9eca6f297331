//! Discount coupons of the account

use super::template::CollectContext;
use super::Collector;
use crate::cache::{DailyRefresh, ExpiringCache, DEFAULT_SWEEP_INTERVAL};
use crate::client::types::Coupon;
use crate::client::BillingApi;
use crate::metrics::{GaugeDesc, MetricSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const LABELS: &[&str] = &["id", "member_id", "contract_id"];

const DISCOUNT: GaugeDesc = GaugeDesc::new("sakuracloud_coupon_discount", "The balance of coupon (unit: JPY)", LABELS);
const REMAINING_DAYS: GaugeDesc = GaugeDesc::new(
    "sakuracloud_coupon_remaining_days",
    "The count of coupon's remaining days",
    LABELS,
);
const EXP_DATE: GaugeDesc = GaugeDesc::new(
    "sakuracloud_coupon_exp_date",
    "Coupon expiration date (unix time in milliseconds)",
    LABELS,
);

pub struct CouponCollector {
    api: Arc<dyn BillingApi>,
    account_id: String,
    cache: ExpiringCache<Vec<Coupon>>,
    refresh: DailyRefresh,
}

impl CouponCollector {
    pub const NAME: &'static str = "coupon";

    /// Must be called from within a tokio runtime (starts the cache sweeper)
    pub fn new(api: Arc<dyn BillingApi>, account_id: impl Into<String>) -> Self {
        Self {
            api,
            account_id: account_id.into(),
            cache: ExpiringCache::new(DEFAULT_SWEEP_INTERVAL),
            refresh: DailyRefresh::billing(),
        }
    }
}

#[async_trait]
impl Collector for CouponCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn collect(&self, ctx: &CollectContext) {
        let Some(coupons) = ctx
            .cached(&self.cache, &self.refresh, "coupons", self.api.coupons(&self.account_id))
            .await
        else {
            return;
        };

        ctx.emit(coupon_metrics(&coupons, Utc::now()));
    }
}

/// Metrics for the coupons usable at `now`
fn coupon_metrics(coupons: &[Coupon], now: DateTime<Utc>) -> Vec<MetricSample> {
    let mut batch = Vec::new();

    for coupon in coupons {
        let Some(until) = coupon.until_at else {
            continue;
        };
        let started = coupon.applied_at.map_or(true, |at| at <= now);
        if !started || until <= now {
            continue;
        }

        let labels = [coupon.id.as_str(), coupon.member_id.as_str(), coupon.contract_id.as_str()];
        // Partial days count as a full remaining day.
        let remaining = (until - now).num_seconds();
        let remaining_days = (remaining + 86_399) / 86_400;

        batch.push(DISCOUNT.sample(coupon.discount, &labels));
        batch.push(REMAINING_DAYS.sample(remaining_days as f64, &labels));
        batch.push(EXP_DATE.sample(until.timestamp_millis() as f64, &labels));
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn coupon(id: &str, applied: DateTime<Utc>, until: DateTime<Utc>) -> Coupon {
        Coupon {
            id: id.into(),
            member_id: "m".into(),
            contract_id: "c".into(),
            discount: 20000.0,
            applied_at: Some(applied),
            until_at: Some(until),
        }
    }

    #[test]
    fn test_only_active_coupons_are_reported() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let coupons = vec![
            coupon("active", now - Duration::days(10), now + Duration::days(20)),
            coupon("expired", now - Duration::days(40), now - Duration::days(1)),
            coupon("future", now + Duration::days(1), now + Duration::days(30)),
        ];

        let samples = coupon_metrics(&coupons, now);

        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| s.label("id") == Some("active")));
    }

    #[test]
    fn test_remaining_days_rounds_up() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let until = now + Duration::days(2) + Duration::hours(1);
        let samples = coupon_metrics(&[coupon("a", now, until)], now);

        let remaining = samples
            .iter()
            .find(|s| s.name == "sakuracloud_coupon_remaining_days")
            .unwrap();
        assert_eq!(remaining.value, 3.0);

        let exp = samples
            .iter()
            .find(|s| s.name == "sakuracloud_coupon_exp_date")
            .unwrap();
        assert_eq!(exp.value, until.timestamp_millis() as f64);
    }
}
