// SPDX-License-Identifier: GPL-3.0-only

//! Throttled TTL cache for key-slot lookups
//!
//! Lookup order for one `(device, kind)` key:
//!
//! 1. a request already in flight: return at once
//! 2. last fetch inside the throttle window: skip (cached value if any)
//! 3. cached entry inside its TTL: return it
//! 4. fetch; on failure other than "not encrypted", cache a zeroed record
//!
//! Different keys never wait on each other.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storage_contracts::KeyOpsAdapter;
use storage_types::{KeySlotInfo, SlotKind};
use tokio::time::Instant;

use crate::config::StatusCacheConfig;
use crate::lifecycle::Lifecycle;
use crate::lock;

type CacheKey = (String, SlotKind);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCacheEntry {
    pub info: KeySlotInfo,
    pub fetched_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Fetched(KeySlotInfo),
    Cached(KeySlotInfo),
    /// Another caller is fetching this key right now
    InFlight,
    /// Too soon after the last fetch; carries the cached value when there is one
    Throttled(Option<KeySlotInfo>),
    /// Device is not an encrypted container
    NotApplicable,
    /// Owner was torn down while the fetch was running
    Discarded,
}

impl CacheLookup {
    pub fn info(&self) -> Option<KeySlotInfo> {
        match *self {
            Self::Fetched(info) | Self::Cached(info) | Self::Throttled(Some(info)) => Some(info),
            _ => None,
        }
    }

    pub fn hit_backend(&self) -> bool {
        matches!(self, Self::Fetched(_) | Self::NotApplicable | Self::Discarded)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, StatusCacheEntry>,
    last_fetch: HashMap<CacheKey, Instant>,
    in_flight: HashSet<CacheKey>,
}

pub struct StatusCache {
    keys: Arc<dyn KeyOpsAdapter>,
    ttl: Duration,
    throttle: Duration,
    stagger: Duration,
    state: Arc<Mutex<CacheState>>,
    lifecycle: Lifecycle,
}

/// Removes the in-flight mark even if the fetch future is dropped
struct InFlight {
    state: Arc<Mutex<CacheState>>,
    key: CacheKey,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.state).in_flight.remove(&self.key);
    }
}

impl StatusCache {
    pub fn new(keys: Arc<dyn KeyOpsAdapter>, config: &StatusCacheConfig, lifecycle: Lifecycle) -> Self {
        Self {
            keys,
            ttl: config.ttl(),
            throttle: config.throttle(),
            stagger: config.stagger(),
            state: Arc::default(),
            lifecycle,
        }
    }

    pub async fn fetch(&self, device_path: &str, kind: SlotKind) -> CacheLookup {
        let key: CacheKey = (device_path.to_string(), kind);
        let now = Instant::now();

        let _in_flight = {
            let mut state = lock(&self.state);
            if state.in_flight.contains(&key) {
                tracing::trace!(device_path, ?kind, "slot lookup already in flight");
                return CacheLookup::InFlight;
            }
            if let Some(last) = state.last_fetch.get(&key)
                && now.duration_since(*last) < self.throttle
            {
                tracing::trace!(device_path, ?kind, "slot lookup throttled");
                return CacheLookup::Throttled(state.entries.get(&key).map(|e| e.info));
            }
            if let Some(entry) = state.entries.get(&key)
                && now.duration_since(entry.fetched_at) < self.ttl
            {
                return CacheLookup::Cached(entry.info);
            }
            state.in_flight.insert(key.clone());
            state.last_fetch.insert(key.clone(), now);
            InFlight {
                state: Arc::clone(&self.state),
                key: key.clone(),
            }
        };

        let result = self.keys.key_slot_info(device_path, kind).await;

        if !self.lifecycle.is_active() {
            return CacheLookup::Discarded;
        }

        let info = match result {
            Ok(info) => info,
            Err(err) if err.is_not_encrypted() => {
                tracing::debug!(device_path, ?kind, "not an encrypted container");
                return CacheLookup::NotApplicable;
            }
            Err(err) => {
                tracing::warn!(device_path, ?kind, error = %err, "slot lookup failed, caching empty record");
                KeySlotInfo::default()
            }
        };

        lock(&self.state).entries.insert(
            key,
            StatusCacheEntry {
                info,
                fetched_at: Instant::now(),
            },
        );
        CacheLookup::Fetched(info)
    }

    /// Fetch several keys in order, pausing between backend hits
    pub async fn fetch_staggered(&self, targets: &[(String, SlotKind)]) -> Vec<CacheLookup> {
        let mut results = Vec::with_capacity(targets.len());
        let mut previous_hit = false;
        for (device_path, kind) in targets {
            if previous_hit && !self.stagger.is_zero() {
                tokio::select! {
                    _ = self.lifecycle.cancelled() => break,
                    _ = tokio::time::sleep(self.stagger) => {}
                }
            }
            if !self.lifecycle.is_active() {
                break;
            }
            let lookup = self.fetch(device_path, *kind).await;
            previous_hit = lookup.hit_backend();
            results.push(lookup);
        }
        results
    }

    /// Latest known record regardless of age
    pub fn latest(&self, device_path: &str, kind: SlotKind) -> Option<KeySlotInfo> {
        lock(&self.state)
            .entries
            .get(&(device_path.to_string(), kind))
            .map(|entry| entry.info)
    }

    /// Forget everything about `device_path` so the next fetch goes to the backend
    pub fn invalidate(&self, device_path: &str) {
        let mut state = lock(&self.state);
        state.entries.retain(|(path, _), _| path != device_path);
        state.last_fetch.retain(|(path, _), _| path != device_path);
    }

    /// Drop all timing state; in-flight results are discarded on arrival
    pub fn teardown(&self) {
        self.lifecycle.teardown();
        let mut state = lock(&self.state);
        state.last_fetch.clear();
        state.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage_contracts::{KeyOperationReport, StorageError};
    use storage_types::{KeyOperationRequest, KeyUpdateRequest};

    #[derive(Default)]
    struct CountingKeys {
        calls: AtomicUsize,
        delay: Option<Duration>,
        fail: Option<StorageError>,
    }

    #[async_trait]
    impl KeyOpsAdapter for CountingKeys {
        async fn vault_device_path(&self) -> Result<String, StorageError> {
            Ok("/dev/sdv".to_string())
        }

        async fn key_slot_info(
            &self,
            _device_path: &str,
            _kind: SlotKind,
        ) -> Result<KeySlotInfo, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.fail {
                Some(err) => Err(err.clone()),
                None => Ok(KeySlotInfo {
                    total: 32,
                    used: 2,
                    available: 30,
                }),
            }
        }

        async fn create_keys(
            &self,
            _request: &KeyOperationRequest,
        ) -> Result<KeyOperationReport, StorageError> {
            unreachable!("not used by the cache")
        }

        async fn update_key(&self, _request: &KeyUpdateRequest) -> Result<(), StorageError> {
            unreachable!("not used by the cache")
        }
    }

    fn cache(keys: Arc<CountingKeys>) -> StatusCache {
        StatusCache::new(keys, &StatusCacheConfig::default(), Lifecycle::new())
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_window_collapses_fetches() {
        let keys = Arc::new(CountingKeys::default());
        let cache = cache(keys.clone());

        assert!(matches!(
            cache.fetch("/dev/sdb", SlotKind::External).await,
            CacheLookup::Fetched(_)
        ));
        let second = cache.fetch("/dev/sdb", SlotKind::External).await;
        assert!(matches!(second, CacheLookup::Throttled(Some(_))));
        assert_eq!(keys.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_serves_cache_then_expires() {
        let keys = Arc::new(CountingKeys::default());
        let cache = cache(keys.clone());

        cache.fetch("/dev/sdb", SlotKind::External).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(matches!(
            cache.fetch("/dev/sdb", SlotKind::External).await,
            CacheLookup::Cached(_)
        ));
        assert_eq!(keys.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(
            cache.fetch("/dev/sdb", SlotKind::External).await,
            CacheLookup::Fetched(_)
        ));
        assert_eq!(keys.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_fetch_for_same_key_is_deduplicated() {
        let keys = Arc::new(CountingKeys {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let cache = cache(keys.clone());

        let (first, second) = tokio::join!(
            cache.fetch("/dev/sdb", SlotKind::External),
            cache.fetch("/dev/sdb", SlotKind::External),
        );
        assert!(matches!(first, CacheLookup::Fetched(_)));
        assert_eq!(second, CacheLookup::InFlight);
        assert_eq!(keys.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_fetch_independently() {
        let keys = Arc::new(CountingKeys {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let cache = cache(keys.clone());

        let (first, second) = tokio::join!(
            cache.fetch("/dev/sdb", SlotKind::External),
            cache.fetch("/dev/sdc", SlotKind::External),
        );
        assert!(first.hit_backend() && second.hit_backend());
        assert_eq!(keys.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failure_caches_zeroed_record() {
        let keys = Arc::new(CountingKeys {
            fail: Some(StorageError::rejected("cryptsetup failed")),
            ..Default::default()
        });
        let cache = cache(keys.clone());

        let lookup = cache.fetch("/dev/sdb", SlotKind::External).await;
        assert_eq!(lookup, CacheLookup::Fetched(KeySlotInfo::default()));
        assert_eq!(
            cache.latest("/dev/sdb", SlotKind::External),
            Some(KeySlotInfo::default())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn not_encrypted_is_not_cached() {
        let keys = Arc::new(CountingKeys {
            fail: Some(StorageError::not_encrypted("/dev/sdb")),
            ..Default::default()
        });
        let cache = cache(keys.clone());

        assert_eq!(
            cache.fetch("/dev/sdb", SlotKind::External).await,
            CacheLookup::NotApplicable
        );
        assert_eq!(cache.latest("/dev/sdb", SlotKind::External), None);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_discards_in_flight_result() {
        let keys = Arc::new(CountingKeys {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let cache = Arc::new(cache(keys.clone()));

        let pending = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.fetch("/dev/sdb", SlotKind::External).await })
        };
        tokio::task::yield_now().await;
        cache.teardown();
        tokio::time::advance(Duration::from_millis(600)).await;

        assert_eq!(pending.await.unwrap(), CacheLookup::Discarded);
        assert_eq!(cache.latest("/dev/sdb", SlotKind::External), None);
    }

    #[tokio::test(start_paused = true)]
    async fn staggered_refresh_keeps_order_and_spacing() {
        let keys = Arc::new(CountingKeys::default());
        let cache = cache(keys.clone());
        let started = Instant::now();

        let results = cache
            .fetch_staggered(&[
                ("/dev/sdb".to_string(), SlotKind::External),
                ("/dev/sdc".to_string(), SlotKind::External),
                ("/dev/sdv".to_string(), SlotKind::Vault),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| matches!(r, CacheLookup::Fetched(_))));
        assert!(started.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_next_fetch() {
        let keys = Arc::new(CountingKeys::default());
        let cache = cache(keys.clone());

        cache.fetch("/dev/sdb", SlotKind::External).await;
        cache.invalidate("/dev/sdb");
        assert!(matches!(
            cache.fetch("/dev/sdb", SlotKind::External).await,
            CacheLookup::Fetched(_)
        ));
        assert_eq!(keys.calls.load(Ordering::SeqCst), 2);
    }
}
