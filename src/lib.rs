//! Kirby content proxy.
//!
//! Forwards structured queries and resource requests from an application
//! frontend to a Kirby content API, keeping credentials server-side.
//!
//! # Architecture Overview
//!
//! ```text
//!   UI layer                                      Proxy process
//!  ┌───────────────────────────┐                 ┌──────────────────────────────────┐
//!  │ client::KirbyClient       │                 │ http::server (axum)              │
//!  │   validate → derive key   │  POST           │   POST /api/__kirby__/{key}      │
//!  │   Session                 │  /api/__kirby__ │     → http::handler              │
//!  │     payload cache         │ ──────────────▶ │         validate descriptor      │
//!  │     in-flight table       │  ServerFetch-   │         cache::ResponseCache     │
//!  │   retry + timeout         │  Options (JSON) │           (max-age + SWR)        │
//!  │   transport (proxy/direct)│ ◀────────────── │         upstream::Forwarder      │
//!  └───────────────────────────┘  RawResponse    │           + auth header          │
//!                                                │     → http::response (filter)    │
//!                                                └────────────────┬─────────────────┘
//!                                                                 ▼
//!                                                         Kirby content API
//! ```

// Data model
pub mod auth;
pub mod cache;
pub mod error;
pub mod request;

// Client and server
pub mod client;
pub mod http;
pub mod upstream;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use client::KirbyClient;
pub use config::ProxyConfig;
pub use error::{Error, ErrorShape, Result};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
