// =============================================================================
// Single-flight freshness cache
// =============================================================================
//
// Per (symbol, timeframe) state machine:
//
//   STALE ──get──▶ COMPUTING ──done──▶ FRESH ──ttl elapsed──▶ STALE
//                      │
//                      └──failed──▶ STALE
//
// Concurrent callers for a stale key share one computation.  The computation
// runs on its own task, so a caller that stops waiting never cancels it and
// the result still lands in the cache for everyone else.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::market_data::CandleKey;

// ---------------------------------------------------------------------------
// Expiry policies
// ---------------------------------------------------------------------------

/// Decides how long a computed value stays fresh.
pub trait ExpiryPolicy: Send + Sync {
    fn ttl(&self, key: &CandleKey) -> Duration;
}

/// Same time-to-live for every key.
#[derive(Debug, Clone, Copy)]
pub struct FixedTtl(pub Duration);

impl ExpiryPolicy for FixedTtl {
    fn ttl(&self, _key: &CandleKey) -> Duration {
        self.0
    }
}

/// Freshness windows for the three cached layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessWindows {
    pub market_data: Duration,
    pub indicators: Duration,
    pub analysis: Duration,
}

impl Default for FreshnessWindows {
    fn default() -> Self {
        Self {
            market_data: Duration::from_secs(5 * 60),
            indicators: Duration::from_secs(15 * 60),
            analysis: Duration::from_secs(30 * 60),
        }
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryState {
    Stale,
    Computing,
    Fresh,
}

type SharedResult<V> = Shared<BoxFuture<'static, Option<V>>>;

enum Slot<V: Clone> {
    Computing { flight: SharedResult<V>, generation: u64 },
    Fresh { value: V, stored_at: Instant },
}

struct Inner<V: Clone> {
    slots: HashMap<CandleKey, Slot<V>>,
    next_generation: u64,
}

/// Keyed cache with at most one in-flight computation per key.
pub struct SingleFlightCache<V: Clone> {
    name: &'static str,
    inner: Arc<Mutex<Inner<V>>>,
    policy: Arc<dyn ExpiryPolicy>,
}

impl<V: Clone> Clone for SingleFlightCache<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<V> SingleFlightCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, policy: Arc<dyn ExpiryPolicy>) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                next_generation: 0,
            })),
            policy,
        }
    }

    pub fn with_ttl(name: &'static str, ttl: Duration) -> Self {
        Self::new(name, Arc::new(FixedTtl(ttl)))
    }

    /// Return the fresh value for `key`, joining or starting the computation
    /// when the entry is stale.  `None` when the computation failed.
    pub async fn get_or_compute<F, Fut>(&self, key: &CandleKey, compute: F) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let (flight, generation) = {
            let mut inner = self.inner.lock();
            let ttl = self.policy.ttl(key);

            match inner.slots.get(key) {
                Some(Slot::Fresh { value, stored_at }) if stored_at.elapsed() < ttl => {
                    trace!(cache = self.name, key = %key, "cache hit");
                    return Some(value.clone());
                }
                Some(Slot::Computing { flight, generation }) => {
                    debug!(cache = self.name, key = %key, "joining in-flight computation");
                    (flight.clone(), *generation)
                }
                _ => {
                    debug!(cache = self.name, key = %key, "cache miss, computing");
                    let generation = inner.next_generation;
                    inner.next_generation += 1;

                    let flight = self.spawn_flight(key.clone(), generation, compute());
                    inner.slots.insert(
                        key.clone(),
                        Slot::Computing {
                            flight: flight.clone(),
                            generation,
                        },
                    );
                    (flight, generation)
                }
            }
        };

        let result = flight.await;
        if result.is_none() {
            // A panicked task never wrote back; make sure the key is retryable.
            self.clear_flight(key, generation);
        }
        result
    }

    fn spawn_flight<Fut>(&self, key: CandleKey, generation: u64, fut: Fut) -> SharedResult<V>
    where
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let name = self.name;

        let handle = tokio::spawn(async move {
            let result = fut.await;

            let mut guard = inner.lock();
            let still_ours = matches!(
                guard.slots.get(&key),
                Some(Slot::Computing { generation: g, .. }) if *g == generation
            );
            if still_ours {
                match &result {
                    Some(value) => {
                        guard.slots.insert(
                            key.clone(),
                            Slot::Fresh {
                                value: value.clone(),
                                stored_at: Instant::now(),
                            },
                        );
                    }
                    None => {
                        guard.slots.remove(&key);
                    }
                }
            }
            trace!(cache = name, key = %key, stored = still_ours && result.is_some(), "computation finished");
            result
        });

        handle.map(|joined| joined.ok().flatten()).boxed().shared()
    }

    fn clear_flight(&self, key: &CandleKey, generation: u64) {
        let mut inner = self.inner.lock();
        let ours = matches!(
            inner.slots.get(key),
            Some(Slot::Computing { generation: g, .. }) if *g == generation
        );
        if ours {
            inner.slots.remove(key);
        }
    }

    /// Fresh value for `key` without triggering a computation.
    pub fn peek(&self, key: &CandleKey) -> Option<V> {
        let inner = self.inner.lock();
        match inner.slots.get(key) {
            Some(Slot::Fresh { value, stored_at }) if stored_at.elapsed() < self.policy.ttl(key) => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    pub fn status(&self, key: &CandleKey) -> EntryState {
        let inner = self.inner.lock();
        match inner.slots.get(key) {
            Some(Slot::Computing { .. }) => EntryState::Computing,
            Some(Slot::Fresh { stored_at, .. }) if stored_at.elapsed() < self.policy.ttl(key) => EntryState::Fresh,
            _ => EntryState::Stale,
        }
    }

    /// Force the key stale.  An in-flight computation keeps running for its
    /// current waiters but its result is not stored.
    pub fn invalidate(&self, key: &CandleKey) {
        self.inner.lock().slots.remove(key);
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.slots.len();
        let policy = &self.policy;
        inner.slots.retain(|key, slot| match slot {
            Slot::Computing { .. } => true,
            Slot::Fresh { stored_at, .. } => stored_at.elapsed() < policy.ttl(key),
        });
        let purged = before - inner.slots.len();
        if purged > 0 {
            debug!(cache = self.name, purged, "expired entries purged");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
