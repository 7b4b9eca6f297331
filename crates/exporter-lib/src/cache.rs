//! Time-bounded cache for slow account-scoped reads
//!
//! Billing and coupon data are refreshed upstream once a day at a fixed
//! wall-clock time, so there is no point asking for them on every scrape.
//! [`ExpiringCache`] holds one value until an absolute expiry; expiry is
//! checked on every read, and a background sweeper drops stale values so
//! they do not linger in memory.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveTime, TimeZone, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Default interval between background sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Offset of the upstream billing timezone (Asia/Tokyo, no DST)
const REFRESH_UTC_OFFSET_SECS: i32 = 9 * 60 * 60;

/// Errors returned by [`ExpiringCache::set`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cannot cache an empty item")]
    EmptyItem,
    #[error("expiry must not be zero")]
    ZeroExpiry,
}

#[derive(Debug)]
struct CacheEntry<T> {
    item: T,
    expires_at: DateTime<Utc>,
}

/// Single-slot cache with an absolute expiry
pub struct ExpiringCache<T> {
    slot: Arc<Mutex<Option<CacheEntry<T>>>>,
}

impl<T> ExpiringCache<T>
where
    T: Clone + Send + 'static,
{
    /// Create a cache and start its sweeper on the current tokio runtime
    ///
    /// The sweeper exits on its own once the cache is dropped.
    pub fn new(sweep_interval: Duration) -> Self {
        let slot = Arc::new(Mutex::new(None));
        tokio::spawn(sweep(Arc::downgrade(&slot), sweep_interval));
        Self { slot }
    }

    /// Store `item` until `expires_at`
    pub async fn set(&self, item: Option<T>, expires_at: DateTime<Utc>) -> Result<(), CacheError> {
        let item = item.ok_or(CacheError::EmptyItem)?;
        if expires_at.timestamp() == 0 && expires_at.timestamp_subsec_nanos() == 0 {
            return Err(CacheError::ZeroExpiry);
        }

        *self.slot.lock().await = Some(CacheEntry { item, expires_at });
        Ok(())
    }

    /// Cached value, if one is stored and has not expired yet
    pub async fn get(&self) -> Option<T> {
        self.get_at(Utc::now()).await
    }

    /// Cached value as seen at `now`
    pub async fn get_at(&self, now: DateTime<Utc>) -> Option<T> {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(entry) if now < entry.expires_at => Some(entry.item.clone()),
            _ => None,
        }
    }

    /// Remove the stored value if it has expired at `now`
    ///
    /// Returns true when a value was removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> bool {
        purge(&self.slot, now).await
    }
}

async fn purge<T>(slot: &Mutex<Option<CacheEntry<T>>>, now: DateTime<Utc>) -> bool {
    let mut slot = slot.lock().await;
    if slot.as_ref().is_some_and(|entry| now >= entry.expires_at) {
        *slot = None;
        true
    } else {
        false
    }
}

async fn sweep<T>(slot: Weak<Mutex<Option<CacheEntry<T>>>>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(slot) = slot.upgrade() else {
            break;
        };
        if purge(&slot, Utc::now()).await {
            debug!("Dropped expired cache entry");
        }
    }
}

/// Daily wall-clock instant at which upstream refreshes account data
#[derive(Debug, Clone, Copy)]
pub struct DailyRefresh {
    offset: FixedOffset,
    at: NaiveTime,
}

impl DailyRefresh {
    pub fn new(offset: FixedOffset, at: NaiveTime) -> Self {
        Self { offset, at }
    }

    /// 04:30 Asia/Tokyo, when billing data is recalculated
    pub fn billing() -> Self {
        Self {
            offset: FixedOffset::east_opt(REFRESH_UTC_OFFSET_SECS).expect("valid UTC offset"),
            at: NaiveTime::from_hms_opt(4, 30, 0).expect("valid refresh time"),
        }
    }

    /// Next refresh instant strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.offset);
        let today = local.date_naive().and_time(self.at);
        let candidate = self
            .offset
            .from_local_datetime(&today)
            .single()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(now);

        if candidate > now {
            candidate
        } else {
            candidate + ChronoDuration::days(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jst(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_get_before_expiry_returns_item() {
        let cache = ExpiringCache::new(DEFAULT_SWEEP_INTERVAL);
        let expires = jst(2024, 5, 1, 4, 30);
        cache.set(Some(42u64), expires).await.unwrap();

        assert_eq!(cache.get_at(expires - ChronoDuration::seconds(1)).await, Some(42));
    }

    #[tokio::test]
    async fn test_get_at_or_after_expiry_is_absent() {
        let cache = ExpiringCache::new(DEFAULT_SWEEP_INTERVAL);
        let expires = jst(2024, 5, 1, 4, 30);
        cache.set(Some(42u64), expires).await.unwrap();

        assert_eq!(cache.get_at(expires).await, None);
        assert_eq!(cache.get_at(expires + ChronoDuration::hours(1)).await, None);
    }

    #[tokio::test]
    async fn test_empty_cache_is_absent() {
        let cache: ExpiringCache<String> = ExpiringCache::new(DEFAULT_SWEEP_INTERVAL);
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test]
    async fn test_set_rejects_missing_item() {
        let cache: ExpiringCache<u64> = ExpiringCache::new(DEFAULT_SWEEP_INTERVAL);
        let result = cache.set(None, jst(2024, 5, 1, 4, 30)).await;
        assert_eq!(result, Err(CacheError::EmptyItem));
    }

    #[tokio::test]
    async fn test_set_rejects_zero_expiry() {
        let cache = ExpiringCache::new(DEFAULT_SWEEP_INTERVAL);
        let result = cache.set(Some(1u64), Utc.timestamp_opt(0, 0).unwrap()).await;
        assert_eq!(result, Err(CacheError::ZeroExpiry));
    }

    #[tokio::test]
    async fn test_set_overwrites_previous_value() {
        let cache = ExpiringCache::new(DEFAULT_SWEEP_INTERVAL);
        let expires = jst(2024, 5, 2, 4, 30);
        cache.set(Some(1u64), expires).await.unwrap();
        cache.set(Some(2u64), expires).await.unwrap();

        assert_eq!(cache.get_at(jst(2024, 5, 1, 12, 0)).await, Some(2));
    }

    #[tokio::test]
    async fn test_purge_only_removes_expired_entry() {
        let cache = ExpiringCache::new(DEFAULT_SWEEP_INTERVAL);
        let expires = jst(2024, 5, 1, 4, 30);
        cache.set(Some(7u64), expires).await.unwrap();

        assert!(!cache.purge_expired(expires - ChronoDuration::minutes(1)).await);
        assert_eq!(cache.get_at(expires - ChronoDuration::minutes(1)).await, Some(7));

        assert!(cache.purge_expired(expires).await);
        assert_eq!(cache.get_at(expires - ChronoDuration::minutes(1)).await, None);
    }

    #[tokio::test]
    async fn test_sweeper_clears_expired_entry() {
        let cache = ExpiringCache::new(Duration::from_millis(20));
        cache
            .set(Some(1u64), Utc::now() - ChronoDuration::seconds(1))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.slot.lock().await.is_none());
    }

    #[test]
    fn test_next_refresh_same_day_before_refresh() {
        let refresh = DailyRefresh::billing();
        assert_eq!(
            refresh.next_after(jst(2024, 5, 1, 4, 0)),
            jst(2024, 5, 1, 4, 30)
        );
        assert_eq!(
            refresh.next_after(jst(2024, 5, 1, 0, 0)),
            jst(2024, 5, 1, 4, 30)
        );
    }

    #[test]
    fn test_next_refresh_rolls_to_next_day() {
        let refresh = DailyRefresh::billing();
        assert_eq!(
            refresh.next_after(jst(2024, 5, 1, 4, 30)),
            jst(2024, 5, 2, 4, 30)
        );
        assert_eq!(
            refresh.next_after(jst(2024, 5, 1, 23, 59)),
            jst(2024, 5, 2, 4, 30)
        );
    }

    #[test]
    fn test_next_refresh_crosses_month_end() {
        let refresh = DailyRefresh::billing();
        assert_eq!(
            refresh.next_after(jst(2024, 2, 29, 18, 0)),
            jst(2024, 3, 1, 4, 30)
        );
    }

    #[test]
    fn test_next_refresh_uses_tokyo_date_not_utc_date() {
        // 2024-05-01 20:00 UTC is already 05:00 on 2024-05-02 in Tokyo
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        assert_eq!(DailyRefresh::billing().next_after(now), jst(2024, 5, 3, 4, 30));
    }
}
