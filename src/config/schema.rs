//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::auth::{AuthContext, AuthMode};

/// Root configuration for the content proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Content API location.
    pub upstream: UpstreamConfig,

    /// Credentials used against the content API.
    pub auth: AuthConfig,

    /// Server-side response cache and error reporting.
    pub server: ServerConfig,

    /// Client layer settings.
    pub client: ClientConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the content API (e.g., "https://cms.example.com").
    pub url: String,

    /// Structured query endpoint. Empty means the default for the auth mode.
    pub query_path: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            query_path: String::new(),
            connect_timeout_secs: 5,
        }
    }
}

impl UpstreamConfig {
    /// `api/query` for basic auth and `api/kql` for bearer, unless set explicitly.
    pub fn resolved_query_path(&self, mode: AuthMode) -> String {
        let explicit = self.query_path.trim().trim_start_matches('/');
        if !explicit.is_empty() {
            return explicit.to_string();
        }
        match mode {
            AuthMode::Bearer => "api/kql".to_string(),
            AuthMode::Basic | AuthMode::None => "api/query".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,

    /// Bearer token.
    pub token: Option<String>,

    /// Basic auth credentials.
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn context(&self) -> AuthContext {
        AuthContext {
            mode: self.mode,
            token: self.token.clone(),
            username: self.credentials.as_ref().map(|c| c.username.clone()),
            password: self.credentials.as_ref().map(|c| c.password.clone()),
        }
    }
}

/// Server cache backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory {
        #[serde(default = "default_max_entries")]
        max_entries: usize,
    },
    Disk {
        dir: PathBuf,
    },
}

fn default_max_entries() -> usize {
    10_000
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory {
            max_entries: default_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Enable the server response cache.
    pub cache: bool,

    pub storage: StorageConfig,

    /// Serve expired entries while refreshing in the background.
    pub swr: bool,

    pub max_age_secs: u64,

    /// Log the full failing query object, not just its selector.
    pub verbose_errors: bool,

    /// Mount point of the proxy endpoint.
    pub route_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cache: false,
            storage: StorageConfig::default(),
            swr: false,
            max_age_secs: 1,
            verbose_errors: false,
            route_prefix: default_route_prefix(),
        }
    }
}

fn default_route_prefix() -> String {
    "/api/__kirby__".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Send requests straight to the content API instead of through the proxy.
    pub direct: bool,

    /// Origin of a running proxy (e.g., "http://127.0.0.1:8080").
    pub proxy_url: String,

    pub route_prefix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            direct: false,
            proxy_url: "http://127.0.0.1:8080".to_string(),
            route_prefix: default_route_prefix(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-call deadline in seconds. Zero disables it.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts. Unset means 0 for queries and 1 for resource GETs.
    pub attempts: Option<u32>,

    /// Base delay between attempts in milliseconds.
    pub delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Response statuses that may be retried.
    pub status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: None,
            delay_ms: 0,
            max_delay_ms: 2000,
            status_codes: vec![408, 409, 425, 429, 500, 502, 503, 504],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
