//! Per-role whitelist cache
//!
//! Memoises [`WhitelistStore::load`] per role. Concurrent misses on the
//! same role are coalesced into a single store call by moka's per-key
//! initialisation, so a slow store only stalls callers waiting on that
//! role. Load failures are handed to every waiter and never cached.
//!
//! Every entry is stamped with the role's generation at load start.
//! `invalidate` bumps the generation, so a load that was already in
//! flight when the role was invalidated is discarded instead of served.

use crate::config::CacheConfig;
use crate::error::{AuditError, Result};
use crate::provider::WhitelistStore;
use crate::types::{RoleId, Whitelist};
use dashmap::DashMap;
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// (cache-wide epoch, per-role counter)
type Generation = (u64, u64);

#[derive(Clone)]
struct Entry {
    generation: Generation,
    whitelist: Arc<Whitelist>,
}

/// Bounded, invalidatable cache in front of a [`WhitelistStore`]
pub struct WhitelistCache {
    store: Arc<dyn WhitelistStore>,
    cache: Cache<RoleId, Entry>,
    epoch: AtomicU64,
    generations: DashMap<RoleId, u64>,
}

impl WhitelistCache {
    pub fn new(store: Arc<dyn WhitelistStore>, config: &CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);
        if let Some(ttl) = config.time_to_live() {
            builder = builder.time_to_live(ttl);
        }
        if let Some(tti) = config.time_to_idle() {
            builder = builder.time_to_idle(tti);
        }
        Self {
            store,
            cache: builder.build(),
            epoch: AtomicU64::new(0),
            generations: DashMap::new(),
        }
    }

    /// Forward the store's one-time bootstrap
    pub async fn setup(&self) -> Result<()> {
        self.store.setup().await
    }

    /// Whitelist directly assigned to `role`, loading it on a miss
    ///
    /// An entry loaded before the latest `invalidate` of `role` is
    /// dropped and reloaded.
    pub async fn get(&self, role: &RoleId) -> Result<Arc<Whitelist>> {
        loop {
            let entry = self
                .cache
                .try_get_with(role.clone(), self.load(role))
                .await
                .map_err(|e| AuditError::from_shared(&e))?;

            if entry.generation == self.generation(role) {
                return Ok(entry.whitelist);
            }
            tracing::debug!(role = %role, "Discarding whitelist loaded before invalidation");
            self.cache.invalidate(role).await;
        }
    }

    async fn load(&self, role: &RoleId) -> Result<Entry> {
        let generation = self.generation(role);
        tracing::debug!(role = %role, store = self.store.name(), "Whitelist cache miss");
        match self.store.load(role).await {
            Ok(whitelist) => Ok(Entry {
                generation,
                whitelist: Arc::new(whitelist),
            }),
            Err(e) => {
                tracing::warn!(role = %role, error = %e, "Failed to load whitelist");
                Err(e)
            }
        }
    }

    fn generation(&self, role: &RoleId) -> Generation {
        let counter = self.generations.get(role).map(|g| *g).unwrap_or(0);
        (self.epoch.load(Ordering::SeqCst), counter)
    }

    /// Whether `role` currently has a resident entry
    pub fn is_cached(&self, role: &RoleId) -> bool {
        self.cache.contains_key(role)
    }

    /// Drop the entry for `role`; the next `get` reloads from the store
    pub async fn invalidate(&self, role: &RoleId) {
        *self.generations.entry(role.clone()).or_insert(0) += 1;
        self.cache.invalidate(role).await;
        tracing::debug!(role = %role, "Whitelist cache entry invalidated");
    }

    /// Drop every entry
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
        tracing::debug!("Whitelist cache cleared");
    }

    /// Number of resident entries after pending maintenance has run
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub fn store(&self) -> &dyn WhitelistStore {
        self.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::MemoryWhitelistStore;
    use crate::resource::ResourceId;
    use crate::types::Permission;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Store that sleeps on every load and can be switched to fail
    struct SlowStore {
        loads: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
    }

    impl SlowStore {
        fn new(delay: Duration) -> Self {
            Self {
                loads: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                delay,
            }
        }
    }

    #[async_trait]
    impl WhitelistStore for SlowStore {
        async fn load(&self, _role: &RoleId) -> Result<Whitelist> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.failing.load(Ordering::SeqCst) {
                return Err(AuditError::Store("backend unavailable".to_string()));
            }
            Ok(Whitelist::new().with(ResourceId::data(), [Permission::Select]))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn role(name: &str) -> RoleId {
        RoleId::new(name)
    }

    #[tokio::test]
    async fn test_hit_after_miss() {
        let store = Arc::new(MemoryWhitelistStore::new());
        store
            .grant("svc", ResourceId::keyspace("ks"), [Permission::Select])
            .unwrap();
        let cache = WhitelistCache::new(store.clone(), &CacheConfig::default());

        assert!(!cache.is_cached(&role("svc")));
        let first = cache.get(&role("svc")).await.unwrap();
        let second = cache.get(&role("svc")).await.unwrap();

        assert!(first.permits(&ResourceId::keyspace("ks"), Permission::Select));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.is_cached(&role("svc")));
        assert_eq!(store.load_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_role_is_empty_not_error() {
        let cache = WhitelistCache::new(
            Arc::new(MemoryWhitelistStore::new()),
            &CacheConfig::default(),
        );
        assert!(cache.get(&role("nobody")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_reflects_store() {
        let store = Arc::new(MemoryWhitelistStore::new());
        let cache = WhitelistCache::new(store.clone(), &CacheConfig::default());
        let ks = ResourceId::keyspace("ks");

        assert!(cache.get(&role("svc")).await.unwrap().is_empty());

        store.grant("svc", ks.clone(), [Permission::Modify]).unwrap();
        // Stale until invalidated
        assert!(cache.get(&role("svc")).await.unwrap().is_empty());

        cache.invalidate(&role("svc")).await;
        assert!(cache
            .get(&role("svc"))
            .await
            .unwrap()
            .permits(&ks, Permission::Modify));
        assert_eq!(store.load_count(), 2);
    }

    /// Store whose answer is fixed when a load starts, not when it returns
    struct SnapshotStore {
        revoked: AtomicBool,
        delay: Duration,
    }

    #[async_trait]
    impl WhitelistStore for SnapshotStore {
        async fn load(&self, _role: &RoleId) -> Result<Whitelist> {
            let revoked = self.revoked.load(Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if revoked {
                return Ok(Whitelist::new());
            }
            Ok(Whitelist::new().with(ResourceId::data(), [Permission::Select]))
        }

        fn name(&self) -> &str {
            "snapshot"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_invalidate_during_load_discards_stale_result() {
        let store = Arc::new(SnapshotStore {
            revoked: AtomicBool::new(false),
            delay: Duration::from_millis(200),
        });
        let cache = Arc::new(WhitelistCache::new(store.clone(), &CacheConfig::default()));

        let in_flight = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&RoleId::new("svc")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        store.revoked.store(true, Ordering::SeqCst);
        cache.invalidate(&role("svc")).await;

        // A get issued after the invalidation must not join the stale load
        let fresh = cache.get(&role("svc")).await.unwrap();
        assert!(!fresh.permits(&ResourceId::data(), Permission::Select));

        in_flight.await.unwrap().unwrap();
        let after = cache.get(&role("svc")).await.unwrap();
        assert!(!after.permits(&ResourceId::data(), Permission::Select));
    }

    #[tokio::test]
    async fn test_invalidate_all_during_load_discards_stale_result() {
        let store = Arc::new(SnapshotStore {
            revoked: AtomicBool::new(false),
            delay: Duration::from_millis(200),
        });
        let cache = Arc::new(WhitelistCache::new(store.clone(), &CacheConfig::default()));

        let in_flight = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&RoleId::new("svc")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        store.revoked.store(true, Ordering::SeqCst);
        cache.invalidate_all();

        in_flight.await.unwrap().unwrap();
        let after = cache.get(&role("svc")).await.unwrap();
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let store = Arc::new(MemoryWhitelistStore::new());
        let cache = WhitelistCache::new(store.clone(), &CacheConfig::default());

        cache.get(&role("a")).await.unwrap();
        cache.get(&role("b")).await.unwrap();
        assert_eq!(cache.entry_count().await, 2);

        cache.invalidate_all();
        assert_eq!(cache.entry_count().await, 0);

        cache.get(&role("a")).await.unwrap();
        assert_eq!(store.load_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_single_load() {
        let store = Arc::new(SlowStore::new(Duration::from_millis(100)));
        let cache = Arc::new(WhitelistCache::new(store.clone(), &CacheConfig::default()));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get(&RoleId::new("svc")).await })
            })
            .collect();

        for handle in futures::future::join_all(handles).await {
            let whitelist = handle.unwrap().unwrap();
            assert!(whitelist.permits(&ResourceId::data(), Permission::Select));
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failure_shared_and_not_cached() {
        let store = Arc::new(SlowStore::new(Duration::from_millis(100)));
        store.failing.store(true, Ordering::SeqCst);
        let cache = Arc::new(WhitelistCache::new(store.clone(), &CacheConfig::default()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get(&RoleId::new("svc")).await })
            })
            .collect();

        for handle in futures::future::join_all(handles).await {
            let err = handle.unwrap().unwrap_err();
            assert!(matches!(err, AuditError::Store(ref m) if m == "backend unavailable"));
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert!(!cache.is_cached(&role("svc")));

        // Recovery: the failure was not memoised
        store.failing.store(false, Ordering::SeqCst);
        assert!(cache.get(&role("svc")).await.is_ok());
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_time_to_live_expires() {
        let store = Arc::new(MemoryWhitelistStore::new());
        let config = CacheConfig {
            time_to_live_millis: Some(50),
            ..CacheConfig::default()
        };
        let cache = WhitelistCache::new(store.clone(), &config);

        cache.get(&role("svc")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.get(&role("svc")).await.unwrap();

        assert_eq!(store.load_count(), 2);
    }
}
