// Request cache shared by every query handle.
// Entries are keyed by resource name + canonical JSON of the parameters, kept
// fresh for `stale_time`, dropped after `cache_time` without use. Identical
// concurrent fetches share one network call. Every resource carries an epoch;
// removing or invalidating it moves the epoch on, and a fetch that started
// under an older epoch is neither joined nor stored.

use std::{
    any::Any,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use dashmap::{mapref::entry::Entry, DashMap};
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{config::RetryConfig, error::ApiError};

/// Cache identity of a request. Two keys are equal when the resource matches
/// and the parameters serialize to the same JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: String,
    params: String,
}

impl QueryKey {
    pub fn new<P: Serialize>(resource: &str, params: &P) -> Result<Self, ApiError> {
        // serde_json::Value keeps object keys sorted, so field order never matters
        let params = serde_json::to_value(params)
            .map_err(|e| ApiError::Serialization(e.to_string()))?
            .to_string();
        Ok(Self {
            resource: resource.to_string(),
            params,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn params(&self) -> &str {
        &self.params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub stale_time: Duration,
    pub cache_time: Duration,
    pub retry: RetryConfig,
    pub keep_previous_data: bool,
}

const MINUTE: Duration = Duration::from_secs(60);

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            cache_time: 5 * MINUTE,
            retry: RetryConfig::default(),
            keep_previous_data: false,
        }
    }
}

impl QueryOptions {
    pub fn trip_list() -> Self {
        Self {
            stale_time: 2 * MINUTE,
            cache_time: 5 * MINUTE,
            keep_previous_data: true,
            ..Default::default()
        }
    }

    pub fn category_list() -> Self {
        Self {
            stale_time: 5 * MINUTE,
            cache_time: 30 * MINUTE,
            keep_previous_data: true,
            ..Default::default()
        }
    }

    pub fn featured() -> Self {
        Self {
            stale_time: 5 * MINUTE,
            cache_time: 30 * MINUTE,
            ..Default::default()
        }
    }

    pub fn detail() -> Self {
        Self {
            stale_time: 5 * MINUTE,
            cache_time: 5 * MINUTE,
            ..Default::default()
        }
    }

    pub fn bookings() -> Self {
        Self {
            stale_time: MINUTE,
            cache_time: 5 * MINUTE,
            keep_previous_data: true,
            ..Default::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub fetch_count: usize,
    pub dedup_count: usize,
    pub retry_count: usize,
    pub eviction_count: usize,
    pub invalidation_count: usize,
}

type CachedValue = Arc<dyn Any + Send + Sync>;
type SharedFetch = Shared<BoxFuture<'static, Result<CachedValue, ApiError>>>;

struct CacheEntry {
    value: CachedValue,
    updated_at: Instant,
    last_access: Instant,
    stale_time: Duration,
    cache_time: Duration,
    invalidated: bool,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        !self.invalidated && now.duration_since(self.updated_at) < self.stale_time
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.last_access) >= self.cache_time
    }
}

struct InFlight {
    id: u64,
    epoch: u64,
    future: SharedFetch,
}

#[derive(Default)]
struct CacheInner {
    entries: DashMap<QueryKey, CacheEntry>,
    in_flight: DashMap<QueryKey, InFlight>,
    next_fetch_id: AtomicU64,
    // bumped by operations covering every resource
    generation: AtomicU64,
    epochs: DashMap<String, u64>,
    stats: RwLock<CacheStats>,
}

/// Process-wide query cache. Cloning hands out another reference to the same
/// store.
#[derive(Clone, Default)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value when it is still fresh, otherwise fetches it
    /// (joining an identical in-flight fetch if there is one). `force` skips
    /// the freshness check.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: QueryKey,
        options: &QueryOptions,
        force: bool,
        fetcher: F,
    ) -> Result<Arc<T>, ApiError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        self.evict_expired();

        if !force {
            if let Some(value) = self.fresh_value(&key) {
                self.inner.stats.write().hit_count += 1;
                debug!(resource = %key.resource, "query cache hit");
                return downcast(value);
            }
        }

        let epoch = self.epoch(&key.resource);
        let shared = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) if existing.get().epoch == epoch => {
                self.inner.stats.write().dedup_count += 1;
                debug!(resource = %key.resource, "joining in-flight fetch");
                existing.get().future.clone()
            }
            slot => {
                self.inner.stats.write().miss_count += 1;
                let id = self.inner.next_fetch_id.fetch_add(1, Ordering::SeqCst);
                let future = self
                    .clone()
                    .network_fetch(key.clone(), id, epoch, options.clone(), fetcher)
                    .boxed()
                    .shared();
                let flight = InFlight {
                    id,
                    epoch,
                    future: future.clone(),
                };
                match slot {
                    Entry::Occupied(mut older) => {
                        older.insert(flight);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(flight);
                    }
                }
                future
            }
        };

        downcast(shared.await?)
    }

    async fn network_fetch<T, F, Fut>(
        self,
        key: QueryKey,
        id: u64,
        epoch: u64,
        options: QueryOptions,
        fetcher: F,
    ) -> Result<CachedValue, ApiError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let result = self.run_with_retry(&key, &options.retry, &fetcher).await;

        let outcome = result.map(|value| {
            let value: CachedValue = Arc::new(value);
            let now = Instant::now();
            // Checked under the shard lock so a concurrent remove cannot slip in between
            let slot = self.inner.entries.entry(key.clone());
            if self.epoch(&key.resource) == epoch {
                let entry = CacheEntry {
                    value: value.clone(),
                    updated_at: now,
                    last_access: now,
                    stale_time: options.stale_time,
                    cache_time: options.cache_time,
                    invalidated: false,
                };
                match slot {
                    Entry::Occupied(mut current) => {
                        current.insert(entry);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(entry);
                    }
                }
            } else {
                debug!(resource = %key.resource, "discarding result fetched before invalidation");
            }
            value
        });

        self.inner.in_flight.remove_if(&key, |_, flight| flight.id == id);
        outcome
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        key: &QueryKey,
        retry: &RetryConfig,
        fetcher: &F,
    ) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut retry_attempt = 0;
        loop {
            self.inner.stats.write().fetch_count += 1;
            match fetcher().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry_attempt < retry.max_retries => {
                    let backoff = retry.backoff(retry_attempt);
                    warn!(
                        resource = %key.resource,
                        attempt = retry_attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "query failed, retrying"
                    );
                    self.inner.stats.write().retry_count += 1;
                    tokio::time::sleep(backoff).await;
                    retry_attempt += 1;
                }
                Err(e) => {
                    debug!(resource = %key.resource, error = %e, "query failed");
                    return Err(e);
                }
            }
        }
    }

    fn epoch(&self, resource: &str) -> u64 {
        let own = self.inner.epochs.get(resource).map_or(0, |e| *e);
        self.inner.generation.load(Ordering::SeqCst) + own
    }

    // In-flight fetches of `resource` stop being joinable and will not be stored
    fn retire(&self, resource: &str) {
        *self.inner.epochs.entry(resource.to_string()).or_insert(0) += 1;
        self.inner
            .in_flight
            .retain(|key, _| key.resource != resource);
    }

    fn retire_all(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.in_flight.clear();
    }

    fn fresh_value(&self, key: &QueryKey) -> Option<CachedValue> {
        let now = Instant::now();
        let mut entry = self.inner.entries.get_mut(key)?;
        entry.last_access = now;
        entry.is_fresh(now).then(|| entry.value.clone())
    }

    /// Cached value regardless of staleness, as long as it has not been
    /// evicted. Used to show stale data while a refetch runs.
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let value = self.inner.entries.get(key)?.value.clone();
        value.downcast::<T>().ok()
    }

    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.is_fresh(Instant::now()))
            .unwrap_or(false)
    }

    /// Marks every entry of `resource` stale. Values stay readable through
    /// [`QueryCache::peek`] until the next fetch replaces them; a fetch already
    /// running is left to finish but its result is not cached.
    pub fn invalidate(&self, resource: &str) -> usize {
        self.retire(resource);
        let mut count = 0;
        for mut entry in self.inner.entries.iter_mut() {
            if entry.key().resource == resource && !entry.invalidated {
                entry.invalidated = true;
                count += 1;
            }
        }
        self.inner.stats.write().invalidation_count += count;
        debug!(resource, count, "invalidated queries");
        count
    }

    pub fn invalidate_all(&self) -> usize {
        self.retire_all();
        let mut count = 0;
        for mut entry in self.inner.entries.iter_mut() {
            if !entry.invalidated {
                entry.invalidated = true;
                count += 1;
            }
        }
        self.inner.stats.write().invalidation_count += count;
        count
    }

    // Drops the entries outright, in-flight results included; nothing stale stays visible
    pub fn remove(&self, resource: &str) -> usize {
        self.retire(resource);
        let before = self.inner.entries.len();
        self.inner
            .entries
            .retain(|key, _| key.resource != resource);
        before - self.inner.entries.len()
    }

    pub fn clear(&self) {
        self.retire_all();
        self.inner.entries.clear();
    }

    /// Removes entries nobody has read for longer than their cache time.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before.saturating_sub(self.inner.entries.len());
        if evicted > 0 {
            self.inner.stats.write().eviction_count += evicted;
            debug!(evicted, "evicted expired queries");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.inner.stats.read().clone();
        stats.entries = self.inner.entries.len();
        stats
    }
}

fn downcast<T: Send + Sync + 'static>(value: CachedValue) -> Result<Arc<T>, ApiError> {
    value
        .downcast::<T>()
        .map_err(|_| ApiError::Other("cached value has a different type".to_string()))
}
