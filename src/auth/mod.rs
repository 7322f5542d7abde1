//! Upstream authentication.
//!
//! # Data Flow
//! ```text
//! AuthConfig (mode, token, credentials)
//!     → AuthContext (immutable per process)
//!     → header.rs (build Authorization header once, at startup)
//!     → merged over caller headers on every outbound request
//! ```
//!
//! # Design Decisions
//! - Header is built eagerly so missing credentials fail at startup,
//!   never at request time
//! - Credentials are redacted from `Debug` output

pub mod header;

pub use header::{build_auth_header, AuthContext, AuthMode};
