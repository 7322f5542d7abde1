//! `Authorization` header derivation.

use axum::http::HeaderValue;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::http::headers::HeaderList;

/// Authentication scheme used against the content API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    #[default]
    Basic,
    Bearer,
}

/// Credentials consumed by [`build_auth_header`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub mode: AuthMode,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthContext {
    pub fn none() -> Self {
        Self::default().with_mode(AuthMode::None)
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mode: AuthMode::Basic,
            username: Some(username.into()),
            password: Some(password.into()),
            token: None,
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            mode: AuthMode::Bearer,
            token: Some(token.into()),
            username: None,
            password: None,
        }
    }

    fn with_mode(mut self, mode: AuthMode) -> Self {
        self.mode = mode;
        self
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("AuthContext")
            .field("mode", &self.mode)
            .field("token", &redact(&self.token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

/// Derive the `Authorization` header for `ctx`.
///
/// `none` yields an empty list. `basic` and `bearer` fail with a
/// [`ConfigurationError`] when their credentials are missing or empty.
pub fn build_auth_header(ctx: &AuthContext) -> Result<HeaderList, ConfigurationError> {
    let value = match ctx.mode {
        AuthMode::None => return Ok(HeaderList::new()),
        AuthMode::Basic => {
            let (username, password) = match (non_empty(&ctx.username), non_empty(&ctx.password)) {
                (Some(u), Some(p)) => (u, p),
                _ => return Err(ConfigurationError::MissingCredentials),
            };
            format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
        }
        AuthMode::Bearer => {
            let token = non_empty(&ctx.token).ok_or(ConfigurationError::MissingToken)?;
            let value = format!("Bearer {token}");
            if HeaderValue::from_str(&value).is_err() {
                return Err(ConfigurationError::InvalidHeaderValue("token"));
            }
            value
        }
    };

    Ok(HeaderList::from_pairs([("Authorization", value)]))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
