//! Client layer.
//!
//! # Data Flow
//! ```text
//! query(QueryRequest) / fetch(ResourceRequest) + RequestOptions
//!     → api.rs (validate, derive key, retry/timeout policy)
//!     → session.rs (payload cache hit? join in-flight? else start)
//!     → transport.rs (proxy endpoint, or direct to upstream)
//! watch.rs: key changed → abort the previous call → execute
//! ```
//!
//! # Design Decisions
//! - All mutable request state lives in a `Session`, never in globals
//! - Failures are shared by every joined caller and evict the cached value

pub mod api;
pub mod session;
pub mod transport;
pub mod watch;

pub use api::{KirbyClient, RequestOptions};
pub use session::{CachedPayload, ExecuteOptions, Session};
pub use transport::{DirectTransport, ProxyTransport, Transport, TransportRequest};
pub use watch::Watcher;
