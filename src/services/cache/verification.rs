//! In-process cache of introspection results.
//!
//! Entry lifetime is the shorter of:
//! - time left until the token's `exp`
//! - `max_staleness` (bounds how long a revocation can go unnoticed)
//!
//! Inactive results use `negative_ttl` (also capped by `max_staleness`).
//! Capacity is bounded with LRU eviction.

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::services::auth::bearer::TokenKey;
use crate::services::auth::introspection::IntrospectionResult;

pub const DEFAULT_MAX_STALENESS: Duration = Duration::from_secs(60);
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_staleness: Duration,
    pub negative_ttl: Duration,
    pub capacity: NonZeroUsize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_staleness: DEFAULT_MAX_STALENESS,
            negative_ttl: DEFAULT_NEGATIVE_TTL,
            capacity: NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl CachePolicy {
    /// Effective TTL for `result` observed at `now`. `None` means "do not cache".
    pub fn ttl_for(&self, result: &IntrospectionResult, now: DateTime<Utc>) -> Option<Duration> {
        let ttl = if result.is_active() {
            match result.expires_at() {
                Some(exp) => {
                    let left = (exp - now).to_std().ok()?;
                    left.min(self.max_staleness)
                }
                None => self.max_staleness,
            }
        } else {
            self.negative_ttl.min(self.max_staleness)
        };

        (!ttl.is_zero()).then_some(ttl)
    }
}

#[derive(Debug)]
struct CacheEntry {
    result: Arc<IntrospectionResult>,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) < self.ttl
    }
}

#[derive(Debug)]
pub struct VerificationCache {
    policy: CachePolicy,
    entries: Mutex<LruCache<TokenKey, CacheEntry>>,
}

impl VerificationCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(LruCache::new(policy.capacity)),
        }
    }

    /// Cached, still-valid result for `key`. Expired entries are dropped here.
    pub fn lookup(&self, key: &TokenKey) -> Option<Arc<IntrospectionResult>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => return Some(Arc::clone(&entry.result)),
            Some(_) => {}
            None => return None,
        }
        entries.pop(key);
        None
    }

    /// Insert or overwrite. A result that may not be cached removes any previous entry.
    pub fn store(&self, key: TokenKey, result: Arc<IntrospectionResult>) {
        self.store_at(key, result, Utc::now());
    }

    pub(crate) fn store_at(&self, key: TokenKey, result: Arc<IntrospectionResult>, now: DateTime<Utc>) {
        let ttl = self.policy.ttl_for(&result, now);
        let mut entries = self.entries.lock();

        match ttl {
            Some(ttl) => {
                entries.put(
                    key,
                    CacheEntry {
                        result,
                        fetched_at: Instant::now(),
                        ttl,
                    },
                );
            }
            None => {
                entries.pop(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
