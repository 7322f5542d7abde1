//! Pending request table.
//!
//! # Responsibilities
//! - At most one outstanding call per key; later callers join it
//! - Every joined caller observes the same settled outcome
//! - Remove the entry once the call settles, success or failure
//!
//! # Design Decisions
//! - The call runs on its own task, so it completes even if every caller
//!   drops its handle (the server SWR refresh relies on this)
//! - Entries carry a generation id; a settled call only removes its own entry,
//!   never a newer one started after a cancellation

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;

use crate::cache::key::CacheKey;
use crate::error::{Error, Result};

pub type SharedFlight<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Pending<T: Clone> {
    id: u64,
    future: SharedFlight<T>,
    cancel: CancellationToken,
}

/// Handle to an in-flight call.
pub struct Flight<T: Clone> {
    pub future: SharedFlight<T>,
    /// `true` when this caller attached to a call someone else started.
    pub joined: bool,
}

pub struct InFlight<T: Clone> {
    pending: DashMap<CacheKey, Pending<T>>,
    next_id: AtomicU64,
}

impl<T: Clone> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join the call pending under `key`, or spawn `start()` as the new one.
    ///
    /// `start` is only invoked when no call is pending. Check-and-insert happens
    /// under the map's entry lock, so two racing callers cannot both start.
    pub fn join_or_start<F, Fut>(self: &Arc<Self>, key: &CacheKey, start: F) -> Flight<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) => Flight {
                future: entry.get().future.clone(),
                joined: true,
            },
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let cancel = CancellationToken::new();
                let call = start();

                let table = Arc::clone(self);
                let owned_key = key.clone();
                let token = cancel.clone();
                let handle = tokio::spawn(async move {
                    let outcome = tokio::select! {
                        _ = token.cancelled() => Err(Error::Aborted),
                        outcome = call => outcome,
                    };
                    table.pending.remove_if(&owned_key, |_, p| p.id == id);
                    outcome
                });

                let future = async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) if e.is_cancelled() => Err(Error::Aborted),
                        Err(e) => Err(Error::Transport(format!("request task failed: {e}"))),
                    }
                }
                .boxed()
                .shared();

                entry.insert(Pending {
                    id,
                    future: future.clone(),
                    cancel,
                });
                Flight {
                    future,
                    joined: false,
                }
            }
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Abort the call pending under `key`. Joined callers observe `Aborted`.
    pub fn cancel(&self, key: &CacheKey) -> bool {
        match self.pending.remove(key) {
            Some((_, pending)) => {
                pending.cancel.cancel();
                tracing::debug!(key = %key, "Cancelled in-flight request");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        self.pending.retain(|_, pending| {
            pending.cancel.cancel();
            false
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
