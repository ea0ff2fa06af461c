//! Local cache of expensive fetch results, persisted in the session store.
//!
//! One entry per resource kind. An entry is a JSON value plus the time it was
//! fetched; freshness is decided by the caller's window, not stored.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::domain::EpochMillis;
use crate::storage::{KeyValueStore, StorageKey, StoreError};

/// Cached resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Dashboard,
    PriceTrends,
}

impl CacheKey {
    pub const ALL: [Self; 2] = [Self::Dashboard, Self::PriceTrends];

    const fn value_key(self) -> StorageKey {
        match self {
            Self::Dashboard => StorageKey::DashboardData,
            Self::PriceTrends => StorageKey::PriceTrends,
        }
    }

    const fn fetched_at_key(self) -> StorageKey {
        match self {
            Self::Dashboard => StorageKey::LastFetchTime,
            Self::PriceTrends => StorageKey::PriceTrendsFetchTime,
        }
    }
}

/// Memoized successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    pub value: Value,
    pub fetched_at: EpochMillis,
}

/// `true` iff `now - entry.fetched_at < window`.
pub fn is_fresh(entry: &CacheEntry, window: Duration, now: EpochMillis) -> bool {
    // An entry stamped in the future is as fresh as one stamped now.
    now.saturating_since(entry.fetched_at) < window
}

/// Cache over the session store.
///
/// Value and timestamp live under two store keys; the lock makes a write of
/// both appear as one step to every reader going through this type.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    lock: Arc<RwLock<()>>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            lock: Arc::new(RwLock::new(())),
        }
    }

    /// Read the entry for `key`, fresh or not.
    ///
    /// A missing or unreadable value or timestamp reads as absent.
    pub async fn read(&self, key: CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        let _guard = self.lock.read().await;

        let Some(raw_time) = self.store.get(key.fetched_at_key().as_str())? else {
            return Ok(None);
        };
        let Some(raw_value) = self.store.get(key.value_key().as_str())? else {
            return Ok(None);
        };

        let Some(fetched_at) = EpochMillis::parse(&raw_time) else {
            tracing::warn!(?key, "ignoring cache entry with unreadable timestamp");
            return Ok(None);
        };

        match serde_json::from_str(&raw_value) {
            Ok(value) => Ok(Some(CacheEntry { value, fetched_at })),
            Err(error) => {
                tracing::warn!(?key, %error, "ignoring cache entry with unreadable value");
                Ok(None)
            }
        }
    }

    /// Store `value` stamped with the current time, replacing any prior entry.
    pub async fn write(&self, key: CacheKey, value: &Value) -> Result<CacheEntry, StoreError> {
        let _guard = self.lock.write().await;
        let fetched_at = self.clock.now();

        // `Value` always serializes.
        let serialized = serde_json::to_string(value).unwrap_or_else(|_| String::from("null"));

        // Timestamp first out, last in: an interrupted write reads as absent.
        self.store.remove(key.fetched_at_key().as_str())?;
        self.store.set(key.value_key().as_str(), &serialized)?;
        self.store
            .set(key.fetched_at_key().as_str(), &fetched_at.to_string())?;

        tracing::info!(?key, fetched_at = %fetched_at, "cache entry written");
        Ok(CacheEntry {
            value: value.clone(),
            fetched_at,
        })
    }

    pub async fn invalidate(&self, key: CacheKey) -> Result<(), StoreError> {
        let _guard = self.lock.write().await;
        self.store.remove(key.fetched_at_key().as_str())?;
        self.store.remove(key.value_key().as_str())
    }

    pub async fn invalidate_all(&self) -> Result<(), StoreError> {
        for key in CacheKey::ALL {
            self.invalidate(key).await?;
        }
        Ok(())
    }

    pub fn is_fresh(&self, entry: &CacheEntry, window: Duration) -> bool {
        is_fresh(entry, window, self.clock.now())
    }

    pub fn now(&self) -> EpochMillis {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache() -> (LocalCache, ManualClock, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(EpochMillis::new(1_700_000_000_000));
        let cache = LocalCache::new(store.clone(), Arc::new(clock.clone()));
        (cache, clock, store)
    }

    #[test]
    fn freshness_is_strictly_less_than_window() {
        let entry = CacheEntry {
            value: Value::Null,
            fetched_at: EpochMillis::new(0),
        };

        assert!(is_fresh(&entry, HOUR, EpochMillis::new(3_599_999)));
        assert!(!is_fresh(&entry, HOUR, EpochMillis::new(3_600_000)));
        assert!(!is_fresh(&entry, Duration::ZERO, EpochMillis::new(0)));
    }

    #[tokio::test]
    async fn entry_is_fresh_right_after_write() {
        let (cache, _clock, _store) = cache();

        let entry = cache
            .write(CacheKey::Dashboard, &json!({"stores": 3}))
            .await
            .expect("write");

        assert!(cache.is_fresh(&entry, Duration::from_millis(1)));
        assert!(cache.is_fresh(&entry, HOUR));
    }

    #[tokio::test]
    async fn write_persists_under_schema_keys() {
        let (cache, clock, store) = cache();

        cache
            .write(CacheKey::Dashboard, &json!({"items": [1, 2]}))
            .await
            .expect("write");

        assert_eq!(
            store.get("dashboardData").expect("get").as_deref(),
            Some(r#"{"items":[1,2]}"#)
        );
        assert_eq!(
            store.get("lastFetchTime").expect("get"),
            Some(clock.now().to_string())
        );
    }

    #[tokio::test]
    async fn overwrite_replaces_value_and_timestamp_together() {
        let (cache, clock, _store) = cache();

        cache
            .write(CacheKey::Dashboard, &json!({"v": 1}))
            .await
            .expect("write");
        clock.advance(Duration::from_secs(90 * 60));
        let second = cache
            .write(CacheKey::Dashboard, &json!({"v": 2}))
            .await
            .expect("write");

        let read = cache
            .read(CacheKey::Dashboard)
            .await
            .expect("read")
            .expect("present");
        assert_eq!(read, second);
    }

    #[tokio::test]
    async fn value_without_timestamp_reads_as_absent() {
        let (cache, _clock, store) = cache();
        store.set("dashboardData", r#"{"v":1}"#).expect("set");

        assert_eq!(cache.read(CacheKey::Dashboard).await.expect("read"), None);
    }

    #[tokio::test]
    async fn invalidate_all_clears_every_resource() {
        let (cache, _clock, store) = cache();
        cache
            .write(CacheKey::Dashboard, &json!(1))
            .await
            .expect("write");
        cache
            .write(CacheKey::PriceTrends, &json!(2))
            .await
            .expect("write");
        store.set("token", "keep-me").expect("set");

        cache.invalidate_all().await.expect("invalidate");

        assert_eq!(cache.read(CacheKey::Dashboard).await.expect("read"), None);
        assert_eq!(cache.read(CacheKey::PriceTrends).await.expect("read"), None);
        assert_eq!(store.get("token").expect("get").as_deref(), Some("keep-me"));
    }
}
