//! Monthly bill of the account
//!
//! Bills are recalculated upstream once a day, so the list is cached until
//! the next refresh instead of being fetched on every scrape.

use super::template::CollectContext;
use super::Collector;
use crate::cache::{DailyRefresh, ExpiringCache, DEFAULT_SWEEP_INTERVAL};
use crate::client::types::Bill;
use crate::client::BillingApi;
use crate::metrics::{bool_value, GaugeDesc};
use async_trait::async_trait;
use chrono::FixedOffset;
use std::sync::Arc;

const AMOUNT: GaugeDesc = GaugeDesc::new(
    "sakuracloud_bill_amount",
    "Amount billed for the latest month (unit: JPY)",
    &["member_id", "bill_id", "month", "paid"],
);

pub struct BillCollector {
    api: Arc<dyn BillingApi>,
    account_id: String,
    cache: ExpiringCache<Vec<Bill>>,
    refresh: DailyRefresh,
}

impl BillCollector {
    pub const NAME: &'static str = "bill";

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
impl Collector for BillCollector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn collect(&self, ctx: &CollectContext) {
        let Some(bills) = ctx
            .cached(&self.cache, &self.refresh, "bills", self.api.bills(&self.account_id))
            .await
        else {
            return;
        };

        let Some(latest) = bills.iter().max_by_key(|b| b.date) else {
            return;
        };

        // Billing months follow Tokyo local time.
        let month = latest
            .date
            .zip(FixedOffset::east_opt(9 * 3600))
            .map(|(date, tokyo)| date.with_timezone(&tokyo).format("%Y-%m").to_string())
            .unwrap_or_default();
        let paid = bool_value(latest.paid).to_string();

        ctx.emit(vec![AMOUNT.sample(
            latest.amount,
            &[&latest.member_id, &latest.id, &month, &paid],
        )]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::{AuthStatus, Coupon};
    use crate::client::ApiResult;
    use crate::metrics::channel;
    use crate::observability::ErrorCounter;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoErrors;

    impl ErrorCounter for NoErrors {
        fn increment(&self, _collector: &str) {}
    }

    #[derive(Default)]
    struct FakeBilling {
        bill_calls: AtomicUsize,
    }

    #[async_trait]
    impl BillingApi for FakeBilling {
        async fn auth_status(&self) -> ApiResult<AuthStatus> {
            Ok(AuthStatus::default())
        }

        async fn bills(&self, _account_id: &str) -> ApiResult<Vec<Bill>> {
            self.bill_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                Bill {
                    id: "1".into(),
                    amount: 1000.0,
                    date: Some(Utc.with_ymd_and_hms(2024, 3, 31, 15, 0, 0).unwrap()),
                    member_id: "m".into(),
                    paid: true,
                },
                Bill {
                    id: "2".into(),
                    amount: 2500.0,
                    date: Some(Utc.with_ymd_and_hms(2024, 4, 30, 15, 0, 0).unwrap()),
                    member_id: "m".into(),
                    paid: false,
                },
            ])
        }

        async fn coupons(&self, _account_id: &str) -> ApiResult<Vec<Coupon>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_reports_latest_bill_and_caches() {
        let api = Arc::new(FakeBilling::default());
        let collector = BillCollector::new(api.clone(), "account");

        for _ in 0..2 {
            let (sink, stream) = channel();
            let ctx = CollectContext::new(BillCollector::NAME, Arc::from(Vec::new()), sink, Arc::new(NoErrors));
            collector.collect(&ctx).await;
            drop(ctx);

            let samples = stream.collect_all().await;
            assert_eq!(samples.len(), 1);
            assert_eq!(samples[0].value, 2500.0);
            assert_eq!(samples[0].label("bill_id"), Some("2"));
            assert_eq!(samples[0].label("month"), Some("2024-05"));
            assert_eq!(samples[0].label("paid"), Some("0"));
        }

        assert_eq!(api.bill_calls.load(Ordering::SeqCst), 1);
    }
}
