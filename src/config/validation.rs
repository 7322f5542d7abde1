//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the upstream URL and the credentials required by the auth mode
//! - Validate value ranges (max-age > 0 with caching on, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::auth::build_auth_header;
use crate::config::schema::{ProxyConfig, StorageConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.upstream.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(_) if config.upstream.url.trim().is_empty() => {
            errors.push(ValidationError::new("upstream.url", "base URL is required"))
        }
        Err(e) => errors.push(ValidationError::new("upstream.url", e.to_string())),
    }

    if let Err(e) = build_auth_header(&config.auth.context()) {
        errors.push(ValidationError::new("auth", e.to_string()));
    }

    if config.server.cache {
        if config.server.max_age_secs == 0 {
            errors.push(ValidationError::new(
                "server.max_age_secs",
                "must be greater than zero when caching is enabled",
            ));
        }
        match &config.server.storage {
            StorageConfig::Disk { dir } if dir.as_os_str().is_empty() => {
                errors.push(ValidationError::new("server.storage.dir", "directory is required"))
            }
            StorageConfig::Memory { max_entries: 0 } => errors.push(ValidationError::new(
                "server.storage.max_entries",
                "must be greater than zero",
            )),
            _ => {}
        }
    }

    if !config.server.route_prefix.starts_with('/') {
        errors.push(ValidationError::new("server.route_prefix", "must start with '/'"));
    }

    // Direct mode talks to upstream itself.
    if !config.client.direct && Url::parse(&config.client.proxy_url).is_err() {
        errors.push(ValidationError::new(
            "client.proxy_url",
            format!("'{}' is not a URL", config.client.proxy_url),
        ));
    }

    if config.retries.max_delay_ms < config.retries.delay_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            "must not be smaller than retries.delay_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMode;
    use crate::config::schema::Credentials;

    fn valid() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstream.url = "https://cms.example.com".into();
        config.auth.credentials = Some(Credentials {
            username: "editor".into(),
            password: "secret".into(),
        });
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_reports_every_failure() {
        let mut config = valid();
        config.upstream.url = String::new();
        config.auth.mode = AuthMode::Bearer;
        config.server.cache = true;
        config.server.max_age_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["upstream.url", "auth", "server.max_age_secs"]);
        assert!(errors[1].message.contains("token"));
    }

    #[test]
    fn test_auth_none_needs_no_credentials() {
        let mut config = valid();
        config.auth.mode = AuthMode::None;
        config.auth.credentials = None;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_disk_storage_requires_dir() {
        let mut config = valid();
        config.server.cache = true;
        config.server.storage = StorageConfig::Disk { dir: "".into() };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "server.storage.dir");
    }
}
