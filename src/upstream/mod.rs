//! Upstream (content API) access.
//!
//! # Data Flow
//! ```text
//! RequestDescriptor + caller headers
//!     → forwarder.rs (method/path/body, auth header merged last)
//!     → client.rs (reqwest, byte-exact RawResponse for any status)
//! ```

pub mod client;
pub mod forwarder;

pub use client::{OutboundRequest, Upstream, UpstreamClient};
pub use forwarder::Forwarder;
