//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), optional
//!     → loader.rs (parse & deserialize)
//!     → KIRBY_* environment overrides
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{from_env, load_config, ConfigError};
pub use schema::{
    AuthConfig, ClientConfig, Credentials, ListenerConfig, ObservabilityConfig, ProxyConfig,
    RetryConfig, ServerConfig, StorageConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
