//! Request data model shared by the client layer and the proxy endpoint.
//!
//! # Data Flow
//! ```text
//! caller (query object or resource path + options)
//!     → descriptor.rs (RequestDescriptor, validated)
//!     → cache::key (cache key from the semantic fields)
//!     → ServerFetchOptions (JSON body of POST /api/__kirby__/{key})
//!     → proxy rebuilds the descriptor from the route key prefix
//!     → raw.rs (RawResponse: status, headers, bytes)
//! ```

pub mod descriptor;
pub mod raw;

pub use descriptor::{
    ensure_same_origin, Pagination, QueryRequest, RequestDescriptor, ResourceRequest, RouteKind,
    ServerFetchOptions, LANGUAGE_HEADER,
};
pub use raw::RawResponse;
