//! Caching subsystem.
//!
//! # Data Flow
//! ```text
//! Descriptor
//!     → key.rs (stable "$kql…" / "$kirby…" key)
//!     → client: inflight.rs joins duplicate calls, payload cache per session
//!     → server: response_cache.rs (max-age + SWR)
//!           → store.rs (memory or disk backend)
//!           → inflight.rs (one refresh per key)
//! ```
//!
//! # Design Decisions
//! - One key function for both tiers; the proxy route carries the key
//! - Expiry uses wall-clock millis via [`clock::Clock`] so tests can move time

pub mod clock;
pub mod inflight;
pub mod key;
pub mod response_cache;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use inflight::{Flight, InFlight};
pub use key::{derive_key, derive_key_with, CacheKey, QUERY_KEY_PREFIX, RESOURCE_KEY_PREFIX};
pub use response_cache::{CachePolicy, ResponseCache};
pub use store::{open_store, CacheStore, DiskStore, MemoryStore, StoredEntry};
