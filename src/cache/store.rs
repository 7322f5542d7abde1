//! Storage backends for the server response cache.
//!
//! # Responsibilities
//! - Atomic get/set/delete per key; no cross-key locking
//! - Keep expired entries around (stale-while-revalidate still serves them)
//!
//! # Backends
//! - `MemoryStore`: bounded `DashMap`, evicts the entry closest to expiry when full
//! - `DiskStore`: one JSON file per key, written via rename so readers never
//!   see a partial entry

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cache::key::CacheKey;
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::request::RawResponse;

/// A cached upstream response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub key: CacheKey,
    pub value: RawResponse,
    /// Unix milliseconds after which the entry is stale.
    pub expires_at: u64,
}

impl StoredEntry {
    pub fn is_fresh(&self, now_millis: u64) -> bool {
        self.expires_at > now_millis
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<StoredEntry>>;
    async fn set(&self, entry: StoredEntry) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    fn name(&self) -> &'static str;
}

/// Build the backend named by the configuration.
pub fn open_store(config: &StorageConfig) -> Arc<dyn CacheStore> {
    match config {
        StorageConfig::Memory { max_entries } => Arc::new(MemoryStore::new(*max_entries)),
        StorageConfig::Disk { dir } => Arc::new(DiskStore::new(dir.clone())),
    }
}

pub struct MemoryStore {
    entries: DashMap<CacheKey, StoredEntry>,
    max_entries: usize,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_if_full(&self, incoming: &CacheKey) {
        if self.entries.len() < self.max_entries || self.entries.contains_key(incoming) {
            return;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().expires_at)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            tracing::debug!(key = %key, "Evicted cache entry");
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<StoredEntry>> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn set(&self, entry: StoredEntry) -> Result<()> {
        self.evict_if_full(&entry.key);
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Keys may be caller-supplied, so file names are derived from a digest.
    fn path_for(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{name}.json"))
    }
}

fn backend_error(action: &str, err: impl std::fmt::Display) -> Error {
    Error::CacheBackend(format!("{action}: {err}"))
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<StoredEntry>> {
        let path = self.path_for(key);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(backend_error("read", e)),
        };
        let entry: StoredEntry =
            serde_json::from_slice(&content).map_err(|e| backend_error("decode", e))?;
        // Digest collisions are not expected; a mismatch is treated as a miss.
        Ok((entry.key == *key).then_some(entry))
    }

    async fn set(&self, entry: StoredEntry) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| backend_error("create dir", e))?;

        let path = self.path_for(&entry.key);
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        let content = serde_json::to_vec(&entry).map_err(|e| backend_error("encode", e))?;

        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| backend_error("write", e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| backend_error("rename", e))
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(backend_error("delete", e)),
        }
    }

    fn name(&self) -> &'static str {
        "disk"
    }
}
