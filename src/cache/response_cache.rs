//! Time-bounded server response cache with stale-while-revalidate.
//!
//! # Lookup
//! ```text
//! fresh entry                  → return it
//! expired entry, swr on        → return it, refresh once in the background
//! expired entry, swr off, miss → fetch, store, return
//! ```
//!
//! Refreshes go through an [`InFlight`] table, so concurrent misses and
//! repeated stale hits for one key trigger a single upstream call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::inflight::{Flight, InFlight};
use crate::cache::key::CacheKey;
use crate::cache::store::{CacheStore, StoredEntry};
use crate::error::Result;
use crate::observability::metrics::{record_cache_lookup, record_dedup_join, CacheOutcome};
use crate::request::RawResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: Duration,
    pub stale_while_revalidate: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(1),
            stale_while_revalidate: false,
        }
    }
}

pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    refreshing: Arc<InFlight<RawResponse>>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, policy: CachePolicy) -> Self {
        Self::with_clock(store, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CacheStore>, policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            clock,
            refreshing: InFlight::new(),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    /// Whether a refresh for `key` is currently running.
    pub fn is_refreshing(&self, key: &CacheKey) -> bool {
        self.refreshing.contains(key)
    }

    /// Serve `key` from the cache, calling `fetch` when a fresh value is needed.
    pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<RawResponse>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<RawResponse>> + Send + 'static,
    {
        let cached = match self.store.get(key).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(key = %key, backend = self.store.name(), error = %e, "Cache read failed, fetching");
                None
            }
        };

        match cached {
            Some(entry) if entry.is_fresh(self.clock.now_millis()) => {
                record_cache_lookup(CacheOutcome::Hit);
                Ok(entry.value)
            }
            Some(entry) if self.policy.stale_while_revalidate => {
                record_cache_lookup(CacheOutcome::Stale);
                let flight = self.refresh(key, fetch);
                if !flight.joined {
                    tracing::debug!(key = %key, "Serving stale entry, refreshing in background");
                }
                Ok(entry.value)
            }
            _ => {
                record_cache_lookup(CacheOutcome::Miss);
                let flight = self.refresh(key, fetch);
                if flight.joined {
                    record_dedup_join("server");
                }
                flight.future.await
            }
        }
    }

    /// Start (or join) the one refresh for `key`. The refresh stores its
    /// result and runs to completion whether or not anyone awaits it.
    fn refresh<F, Fut>(&self, key: &CacheKey, fetch: F) -> Flight<RawResponse>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<RawResponse>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let max_age = self.policy.max_age;
        let owned_key = key.clone();

        self.refreshing.join_or_start(key, move || async move {
            let response = match fetch().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(key = %owned_key, error = %e, "Cache refresh failed");
                    return Err(e);
                }
            };

            if response.status >= 500 {
                tracing::debug!(key = %owned_key, status = response.status, "Not caching server error");
                return Ok(response);
            }

            let entry = StoredEntry {
                key: owned_key.clone(),
                value: response.clone(),
                expires_at: clock.now_millis().saturating_add(max_age.as_millis() as u64),
            };
            if let Err(e) = store.set(entry).await {
                tracing::warn!(key = %owned_key, backend = store.name(), error = %e, "Cache write failed");
            }
            Ok(response)
        })
    }
}
