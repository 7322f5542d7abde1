//! Re-derivation trigger for reactive consumers.
//!
//! A consumer whose inputs change (query, path, language) calls
//! [`Watcher::refresh`] with the new descriptor. When the derived key differs
//! from the previous one, the previous in-flight call is aborted first, so a
//! late answer for old inputs can never land in the payload cache after the
//! answer for the new ones.

use std::sync::Mutex;

use crate::cache::CacheKey;
use crate::client::api::{KirbyClient, RequestOptions};
use crate::error::Result;
use crate::request::{RawResponse, RequestDescriptor};

pub struct Watcher {
    client: KirbyClient,
    current: Mutex<Option<CacheKey>>,
}

impl Watcher {
    pub fn new(client: KirbyClient) -> Self {
        Self {
            client,
            current: Mutex::new(None),
        }
    }

    pub fn current_key(&self) -> Option<CacheKey> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub async fn refresh(&self, descriptor: RequestDescriptor, opts: RequestOptions) -> Result<RawResponse> {
        let key = self.client.key_for(&descriptor, &opts);
        let previous = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(key.clone());

        if let Some(previous) = previous.filter(|p| *p != key) {
            if self.client.session().cancel(&previous) {
                tracing::debug!(previous = %previous, next = %key, "Inputs changed, aborted previous request");
            }
        }

        self.client.execute(descriptor, opts.key(key)).await
    }
}
