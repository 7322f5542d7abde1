//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! POST {route_prefix}/{key}
//!     → server.rs (Axum setup, request ID, body limit, timeout)
//!     → handler.rs (rebuild + validate descriptor, cache, forward)
//!     → response.rs (filter headers, split cookies)
//!     → Send to client
//! ```
//!
//! headers.rs holds the header list shared by every layer above.

pub mod handler;
pub mod headers;
pub mod response;
pub mod server;

pub use handler::ProxyHandler;
pub use headers::HeaderList;
pub use server::HttpServer;
