//! Error taxonomy and translation into the uniform wire shape.
//!
//! # Failure Classes
//! ```text
//! Configuration  → missing/invalid auth setup, fails at startup, never retried
//! Validation     → malformed descriptor, 400, never reaches the network
//! Upstream       → non-2xx from the content API, original status kept
//! Transport      → upstream unreachable, 503
//! Timeout        → per-call deadline exceeded, 504
//! Aborted        → superseded or cancelled by the caller
//! CacheBackend   → storage read/write failure, logged and bypassed
//! ```
//!
//! # Design Decisions
//! - `Error` is `Clone` so one settled outcome can be handed to every
//!   deduplicated caller
//! - `ErrorShape` is the only representation that crosses the proxy boundary;
//!   it never carries credentials or stack traces

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::{RawResponse, RouteKind};

/// Set on every error response the proxy writes itself. Upstream values for
/// it are stripped, so its presence means the body is an [`ErrorShape`].
pub const PROXY_ERROR_HEADER: &str = "x-kirby-proxy-error";

/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Invalid authentication setup. Raised while building headers, before any request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("basic auth requires a non-empty username and password")]
    MissingCredentials,

    #[error("bearer auth requires a non-empty token")]
    MissingToken,

    #[error("{0} contains characters that are not allowed in a header value")]
    InvalidHeaderValue(&'static str),
}

/// Crate-wide error.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("{0}")]
    Validation(String),

    #[error("{message} (status {status})")]
    Upstream {
        status: u16,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("upstream unreachable: {0}")]
    Transport(String),

    #[error("upstream did not respond in time")]
    Timeout,

    #[error("request aborted")]
    Aborted,

    #[error("response could not be decoded: {0}")]
    Decode(String),

    #[error("cache backend error: {0}")]
    CacheBackend(String),
}

/// Uniform error body: `{ statusCode, statusMessage, data? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorShape {
    pub status_code: u16,
    pub status_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Error {
    /// Stable status code for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Upstream { status, .. } => *status,
            Error::Transport(_) => 503,
            Error::Timeout => 504,
            Error::Aborted => 499,
            Error::Decode(_) => 502,
            Error::Configuration(_) | Error::CacheBackend(_) => 500,
        }
    }

    /// Human readable message that is safe to show to callers.
    pub fn status_message(&self) -> String {
        match self {
            Error::Validation(msg) => msg.clone(),
            Error::Upstream { message, .. } => message.clone(),
            Error::Transport(_) => "Service Unavailable".to_string(),
            Error::Timeout => "Gateway Timeout".to_string(),
            Error::Aborted => "Request Aborted".to_string(),
            Error::Decode(_) => "Bad Gateway".to_string(),
            Error::Configuration(_) | Error::CacheBackend(_) => "Internal Server Error".to_string(),
        }
    }

    pub fn shape(&self) -> ErrorShape {
        let data = match self {
            Error::Upstream { data, .. } => data.clone(),
            _ => None,
        };
        ErrorShape {
            status_code: self.status_code(),
            status_message: self.status_message(),
            data,
        }
    }

    /// Translate a non-2xx response into an `Upstream` error.
    ///
    /// Error bodies the proxy wrote itself (marked with [`PROXY_ERROR_HEADER`])
    /// keep their own message; anything else gets a message summarising the
    /// operation and the body attached as `data`.
    pub fn from_response(kind: RouteKind, response: &RawResponse) -> Self {
        if response.headers.get(PROXY_ERROR_HEADER).is_some() {
            if let Ok(shape) = serde_json::from_slice::<ErrorShape>(&response.body) {
                return Error::Upstream {
                    status: response.status,
                    message: shape.status_message,
                    data: shape.data,
                };
            }
        }

        Error::Upstream {
            status: response.status,
            message: kind.failure_message().to_string(),
            data: body_as_data(&response.body),
        }
    }

    /// Only transport-level failures and timeouts are inherently transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout)
    }
}

fn body_as_data(body: &[u8]) -> Option<serde_json::Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice(body).ok().or_else(|| {
        std::str::from_utf8(body)
            .ok()
            .map(|text| serde_json::Value::String(text.to_string()))
    })
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Error::Timeout;
        }
        if err.is_decode() {
            return Error::Decode(err.without_url().to_string());
        }
        Error::Transport(err.without_url().to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(PROXY_ERROR_HEADER, "1")], Json(self.shape())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::headers::HeaderList;
    use bytes::Bytes;

    fn response(status: u16, body: &'static str) -> RawResponse {
        RawResponse {
            status,
            status_text: String::new(),
            headers: HeaderList::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    fn proxy_response(status: u16, body: &'static str) -> RawResponse {
        let mut raw = response(status, body);
        raw.headers.insert(PROXY_ERROR_HEADER, "1");
        raw
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Validation("query is empty".into()).status_code(), 400);
        assert_eq!(Error::Transport("refused".into()).status_code(), 503);
        assert_eq!(Error::Timeout.status_code(), 504);
        assert_eq!(Error::from(ConfigurationError::MissingToken).status_code(), 500);
    }

    #[test]
    fn test_transport_shape_hides_details() {
        let shape = Error::Transport("tcp connect error: 10.0.0.3:443".into()).shape();
        assert_eq!(shape.status_code, 503);
        assert_eq!(shape.status_message, "Service Unavailable");
        assert!(shape.data.is_none());
    }

    #[test]
    fn test_upstream_error_keeps_body() {
        let err = Error::from_response(
            RouteKind::Query,
            &response(404, r#"{"code":404,"status":"error","message":"Page not found"}"#),
        );
        let shape = err.shape();
        assert_eq!(shape.status_code, 404);
        assert_eq!(shape.status_message, "failed to execute query");
        assert_eq!(shape.data.unwrap()["message"], "Page not found");
    }

    #[test]
    fn test_proxy_error_shape_passes_through() {
        let err = Error::from_response(
            RouteKind::Resource,
            &proxy_response(400, r#"{"statusCode":400,"statusMessage":"absolute URLs not allowed"}"#),
        );
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.status_message(), "absolute URLs not allowed");
    }

    #[test]
    fn test_unmarked_error_shape_is_upstream_body() {
        let err = Error::from_response(
            RouteKind::Query,
            &response(422, r#"{"statusCode":422,"statusMessage":"Invalid field"}"#),
        );
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.status_message(), "failed to execute query");
        assert_eq!(err.shape().data.unwrap()["statusMessage"], "Invalid field");
    }

    #[test]
    fn test_error_response_is_marked() {
        let response = Error::Validation("query is empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key(PROXY_ERROR_HEADER));
    }

    #[test]
    fn test_plain_text_body_becomes_string_data() {
        let err = Error::from_response(RouteKind::Resource, &response(500, "boom"));
        assert_eq!(err.shape().data, Some(serde_json::Value::String("boom".into())));
        assert_eq!(err.status_message(), "failed to fetch resource");
    }
}
