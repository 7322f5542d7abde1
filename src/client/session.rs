//! Per-session request state: the payload cache and the pending request table.
//!
//! A session replaces process-global maps. Each render pass (or each
//! long-lived consumer) owns one, so cached payloads never leak across
//! unrelated requests. Dropping the session drops its cache.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::{CacheKey, InFlight};
use crate::error::{Error, Result};
use crate::observability::metrics::record_dedup_join;
use crate::request::RawResponse;

#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub value: RawResponse,
    pub created_at: Instant,
}

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Store successful results and answer from the payload cache.
    pub cache: bool,
    /// Stops this caller from waiting. The shared call keeps running for
    /// other joined callers.
    pub signal: Option<CancellationToken>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            cache: true,
            signal: None,
        }
    }
}

pub struct Session {
    id: Uuid,
    payload: Arc<DashMap<CacheKey, CachedPayload>>,
    pending: Arc<InFlight<RawResponse>>,
    hydrating: AtomicBool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: Arc::new(DashMap::new()),
            pending: InFlight::new(),
            hydrating: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// While hydrating, cached payloads are served even to `cache = false` calls.
    pub fn set_hydrating(&self, hydrating: bool) {
        self.hydrating.store(hydrating, Ordering::SeqCst);
    }

    pub fn is_hydrating(&self) -> bool {
        self.hydrating.load(Ordering::SeqCst)
    }

    pub fn cached(&self, key: &CacheKey) -> Option<CachedPayload> {
        self.payload.get(key).map(|e| e.value().clone())
    }

    pub fn evict(&self, key: &CacheKey) -> bool {
        self.payload.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.payload.clear();
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn in_flight(&self, key: &CacheKey) -> bool {
        self.pending.contains(key)
    }

    /// Abort the call pending under `key`. Like any failed call, this also
    /// evicts the payload cached under `key`.
    pub fn cancel(&self, key: &CacheKey) -> bool {
        let cancelled = self.pending.cancel(key);
        if cancelled {
            self.payload.remove(key);
        }
        cancelled
    }

    /// Run `request` at most once per key at a time.
    ///
    /// A cached payload short-circuits the call. Concurrent callers with the
    /// same key share one call and its outcome. Success is cached when
    /// `opts.cache` is set; failure evicts whatever was cached under `key`.
    pub async fn execute<F, Fut>(&self, key: &CacheKey, opts: &ExecuteOptions, request: F) -> Result<RawResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RawResponse>> + Send + 'static,
    {
        if opts.cache || self.is_hydrating() {
            if let Some(hit) = self.payload.get(key) {
                tracing::trace!(session = %self.id, key = %key, "Payload cache hit");
                return Ok(hit.value().value.clone());
            }
        }

        let payload = Arc::clone(&self.payload);
        let owned_key = key.clone();
        let cache = opts.cache;
        let flight = self.pending.join_or_start(key, move || {
            let call = request();
            async move {
                let outcome = call.await;
                match &outcome {
                    Ok(value) if cache => {
                        payload.insert(
                            owned_key,
                            CachedPayload {
                                value: value.clone(),
                                created_at: Instant::now(),
                            },
                        );
                    }
                    Ok(_) => {}
                    Err(_) => {
                        payload.remove(&owned_key);
                    }
                }
                outcome
            }
        });

        if flight.joined {
            record_dedup_join("client");
            tracing::debug!(session = %self.id, key = %key, "Joined in-flight request");
        }

        match &opts.signal {
            Some(signal) => tokio::select! {
                _ = signal.cancelled() => Err(Error::Aborted),
                outcome = flight.future => outcome,
            },
            None => flight.future.await,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.pending.cancel_all();
    }
}
