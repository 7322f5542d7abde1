//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip headers that must not be replayed to the caller
//! - Split combined `set-cookie` values into separate headers
//! - Turn a `RawResponse` into an axum response with the upstream status
//!
//! # Design Decisions
//! - Bodies are already decompressed and buffered, so `content-encoding` and
//!   `content-length` from upstream would be wrong and are dropped
//! - Hop-by-hop headers stripped automatically

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::PROXY_ERROR_HEADER;
use crate::http::headers::{split_cookies, HeaderList};
use crate::request::RawResponse;

const EXCLUDED_HEADERS: &[&str] = &[
    "content-encoding",
    "content-length",
    "server",
    "x-powered-by",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
];

fn is_excluded(name: &str) -> bool {
    EXCLUDED_HEADERS.contains(&name) || name == PROXY_ERROR_HEADER
}

/// Headers of `upstream` that may be sent on to the caller.
pub fn filter_response_headers(upstream: &HeaderList) -> HeaderList {
    let mut out = HeaderList::new();
    for (name, value) in upstream.iter() {
        if is_excluded(name) {
            continue;
        }
        if name == "set-cookie" {
            for cookie in split_cookies(value) {
                out.append(name, cookie);
            }
        } else {
            out.append(name, value);
        }
    }
    out
}

impl IntoResponse for RawResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in filter_response_headers(&self.headers).iter() {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        response
    }
}
