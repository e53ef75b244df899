//! TTL-keyed response cache with single-flight request coalescing.
//!
//! Upstream sources are rate-limited shared resources, so the central
//! correctness property here is **at-most-one in-flight fetch per key**:
//! the first caller for a key becomes the leader and performs the fetch,
//! every concurrent co-caller awaits the leader's result over a watch
//! channel instead of issuing a duplicate upstream call.
//!
//! Expired entries are treated as absent for reads, but are retained for a
//! bounded stale window so deadline-bound callers can fall back to the last
//! known value ([`SingleFlightCache::get_stale`]).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex, RwLock};

use crate::data_source::SourceError;

/// Defines how a call interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read a non-expired entry if present, otherwise fetch and store.
    #[default]
    Use,
    /// Always fetch, bypassing any cached entry, and store the response.
    Refresh,
    /// Always fetch; neither read from nor write to the cache.
    Bypass,
}

/// What to do when a fetch fails and a still-valid prior entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Serve the prior non-expired entry; the failure does not poison the
    /// cache.
    #[default]
    ServeLastGood,
    /// Propagate the failure to the caller.
    FailFast,
}

/// A value returned by [`SingleFlightCache::get_or_fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<V> {
    pub value: V,
    /// True when served from a non-expired entry without an upstream call
    /// by this caller (includes coalesced waits on another caller's fetch).
    pub cache_hit: bool,
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

type FlightResult<V> = Option<Result<V, SourceError>>;

/// Thread-safe single-flight TTL cache.
///
/// `V` is the cached payload; failures are [`SourceError`] so coalesced
/// waiters can share the leader's outcome.
pub struct SingleFlightCache<V: Clone + Send + Sync + 'static> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    inflight: Mutex<HashMap<String, watch::Receiver<FlightResult<V>>>>,
    failure_policy: FailurePolicy,
    stale_retention: Duration,
}

impl<V: Clone + Send + Sync + 'static> SingleFlightCache<V> {
    pub fn new(failure_policy: FailurePolicy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            failure_policy,
            stale_retention: Duration::from_secs(600),
        }
    }

    pub fn with_stale_retention(mut self, retention: Duration) -> Self {
        self.stale_retention = retention;
        self
    }

    /// Fetch-through read with request coalescing.
    ///
    /// The fetch closure runs at most once per key across all concurrent
    /// callers; its result (success or failure) is shared with every waiter.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        mode: CacheMode,
        fetch: F,
    ) -> Result<CachedValue<V>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, SourceError>>,
    {
        if mode == CacheMode::Bypass {
            let value = fetch().await?;
            return Ok(CachedValue {
                value,
                cache_hit: false,
            });
        }

        if mode == CacheMode::Use {
            if let Some(value) = self.get_fresh(key).await {
                return Ok(CachedValue {
                    value,
                    cache_hit: true,
                });
            }
        }

        // Join an in-flight fetch for this key when one exists, otherwise
        // become the leader.
        let tx = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(key) {
                Some(rx) => {
                    let rx = rx.clone();
                    drop(inflight);
                    return self.await_leader(key, rx).await;
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.to_owned(), rx);
                    tx
                }
            }
        };

        let outcome = fetch().await;

        let result = match outcome {
            Ok(value) => {
                self.store(key, value.clone(), ttl).await;
                Ok(value)
            }
            Err(error) => match self.failure_policy {
                FailurePolicy::ServeLastGood => match self.get_fresh(key).await {
                    Some(value) => Ok(value),
                    None => Err(error),
                },
                FailurePolicy::FailFast => Err(error),
            },
        };

        {
            let mut inflight = self.inflight.lock().await;
            inflight.remove(key);
        }
        let _ = tx.send(Some(result.clone()));

        result.map(|value| CachedValue {
            value,
            cache_hit: false,
        })
    }

    async fn await_leader(
        &self,
        key: &str,
        mut rx: watch::Receiver<FlightResult<V>>,
    ) -> Result<CachedValue<V>, SourceError> {
        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result.map(|value| CachedValue {
                    value,
                    cache_hit: true,
                });
            }

            if rx.changed().await.is_err() {
                // Leader dropped without publishing (cancelled mid-fetch).
                // Clear the dead flight so the key is usable again, unless a
                // newer leader has already replaced it.
                let mut inflight = self.inflight.lock().await;
                if let Some(current) = inflight.get(key) {
                    if current.same_channel(&rx) {
                        inflight.remove(key);
                    }
                }
                return Err(SourceError::unavailable(
                    "coalesced fetch was cancelled before completion",
                ));
            }
        }
    }

    /// Non-expired entry for `key`, if any.
    pub async fn get_fresh(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries.get(key).and_then(|entry| {
            if Instant::now() <= entry.expires_at {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    /// Most recent entry for `key` regardless of expiry.
    ///
    /// Deadline-bound callers use this to proceed with stale data when a
    /// fetch cannot complete within the tick budget.
    pub async fn get_stale(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub async fn store(&self, key: &str, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_owned(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drop entries that have been expired for longer than the stale
    /// retention window.
    pub async fn purge_expired(&self) {
        let Some(cutoff) = Instant::now().checked_sub(self.stale_retention) else {
            return;
        };
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > cutoff);
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
