//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{Credentials, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};

pub const ENV_BASE_URL: &str = "KIRBY_BASE_URL";
pub const ENV_API_TOKEN: &str = "KIRBY_API_TOKEN";
pub const ENV_API_USERNAME: &str = "KIRBY_API_USERNAME";
pub const ENV_API_PASSWORD: &str = "KIRBY_API_PASSWORD";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Environment overrides are applied after parsing and before validation.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ProxyConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    finalize(config)
}

/// Build configuration from defaults plus environment variables only.
pub fn from_env() -> Result<ProxyConfig, ConfigError> {
    let mut config = ProxyConfig::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    finalize(config)
}

fn finalize(mut config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    config.upstream.query_path = config.upstream.resolved_query_path(config.auth.mode);
    Ok(config)
}

/// Overlay deployment secrets onto `config`. Empty variables are ignored.
pub fn apply_env_overrides(config: &mut ProxyConfig, lookup: impl Fn(&str) -> Option<String>) {
    let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(url) = var(ENV_BASE_URL) {
        config.upstream.url = url;
    }
    if let Some(token) = var(ENV_API_TOKEN) {
        config.auth.token = Some(token);
    }

    let username = var(ENV_API_USERNAME);
    let password = var(ENV_API_PASSWORD);
    if username.is_some() || password.is_some() {
        let credentials = config.auth.credentials.get_or_insert_with(Credentials::default);
        if let Some(username) = username {
            credentials.username = username;
        }
        if let Some(password) = password {
            credentials.password = password;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMode;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config: ProxyConfig = toml::from_str(
            r#"
            [upstream]
            url = "https://staging.example.com"

            [auth]
            mode = "basic"
            credentials = { username = "file-user", password = "file-pass" }
            "#,
        )
        .unwrap();

        apply_env_overrides(
            &mut config,
            env(&[
                (ENV_BASE_URL, "https://cms.example.com"),
                (ENV_API_PASSWORD, "env-pass"),
                (ENV_API_TOKEN, ""),
            ]),
        );

        assert_eq!(config.upstream.url, "https://cms.example.com");
        let credentials = config.auth.credentials.unwrap();
        assert_eq!(credentials.username, "file-user");
        assert_eq!(credentials.password, "env-pass");
        assert!(config.auth.token.is_none());
    }

    #[test]
    fn test_load_resolves_query_path() {
        let path = std::env::temp_dir().join(format!("kirby-proxy-{}.toml", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            r#"
            [upstream]
            url = "https://cms.example.com"

            [auth]
            mode = "bearer"
            token = "T"
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.auth.mode, AuthMode::Bearer);
        assert_eq!(config.upstream.query_path, "api/kql");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let path = std::env::temp_dir().join(format!("kirby-proxy-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[upstream\nurl = ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
        fs::remove_file(&path).unwrap();
    }
}
