//! Cache key derivation.
//!
//! A key is a variant prefix followed by a truncated SHA-256 over the
//! canonical JSON of the request's semantic fields:
//!
//! ```text
//! query    → "$kql"   + hash([query, language, extra])
//! resource → "$kirby" + hash([path, queryParams, METHOD, body, extra])
//! ```
//!
//! Object keys are sorted recursively before hashing, so insertion order never
//! changes a key and keys stay stable across restarts.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::request::{RequestDescriptor, RouteKind};

pub const QUERY_KEY_PREFIX: &str = "$kql";
pub const RESOURCE_KEY_PREFIX: &str = "$kirby";

/// Digest bytes kept in a key (128 bits).
const DIGEST_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Caller-chosen key carrying the variant prefix for `kind`, so the
    /// proxy route resolves it to the right request shape.
    pub fn scoped(&self, kind: RouteKind) -> CacheKey {
        let prefix = kind.key_prefix();
        if self.0.starts_with(prefix) {
            self.clone()
        } else {
            CacheKey(format!("{prefix}{}", self.0))
        }
    }

    /// Whether the key has the exact shape [`derive_key`] produces.
    pub fn is_derived(&self) -> bool {
        let kind = RouteKind::from_key(&self.0);
        self.0
            .strip_prefix(kind.key_prefix())
            .is_some_and(|rest| {
                rest.len() == DIGEST_BYTES * 2
                    && rest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
            })
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

pub fn derive_key(descriptor: &RequestDescriptor) -> CacheKey {
    derive_key_with(descriptor, None)
}

/// Derive a key, folding an optional caller-supplied discriminator into the hash.
pub fn derive_key_with(descriptor: &RequestDescriptor, extra: Option<&Value>) -> CacheKey {
    let extra = extra.cloned().unwrap_or(Value::Null);
    let tuple = match descriptor {
        RequestDescriptor::Query { query, language } => {
            json!([query, language, extra])
        }
        RequestDescriptor::Resource(r) => {
            json!([r.path, r.query_params, r.effective_method(), r.body, extra])
        }
    };

    let prefix = descriptor.kind().key_prefix();
    CacheKey(format!("{prefix}{}", digest(&tuple)))
}

fn digest(value: &Value) -> String {
    let canonical = canonicalize(value).to_string();
    let hash = Sha256::digest(canonical.as_bytes());
    hash.iter()
        .take(DIGEST_BYTES)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Rebuild `value` with object keys in sorted order at every level.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (k, v) in entries {
                sorted.insert(k.clone(), canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
