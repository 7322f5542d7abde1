//! How the client layer reaches the content API.
//!
//! ```text
//! ProxyTransport  → POST {proxy}/api/__kirby__/{key}, credentials stay server-side
//! DirectTransport → Forwarder → upstream, credentials attached locally
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::cache::CacheKey;
use crate::error::{Error, Result};
use crate::http::headers::HeaderList;
use crate::request::{RawResponse, RequestDescriptor, ServerFetchOptions};
use crate::upstream::Forwarder;

#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub descriptor: RequestDescriptor,
    pub headers: HeaderList,
    /// Whether the server may answer from its response cache.
    pub cache: bool,
}

/// Sends one request. Any HTTP status is returned as a `RawResponse`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, key: &CacheKey, request: &TransportRequest) -> Result<RawResponse>;
}

pub struct ProxyTransport {
    endpoint: Url,
    http: reqwest::Client,
}

impl ProxyTransport {
    pub fn new(proxy_url: &str, route_prefix: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Self::with_client(proxy_url, route_prefix, http)
    }

    pub fn with_client(proxy_url: &str, route_prefix: &str, http: reqwest::Client) -> Result<Self> {
        let joined = format!(
            "{}/{}",
            proxy_url.trim_end_matches('/'),
            route_prefix.trim_matches('/')
        );
        let endpoint = Url::parse(&joined)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| Error::Validation(format!("invalid proxy endpoint '{joined}'")))?;
        Ok(Self { endpoint, http })
    }

    /// The key is opaque to the route; it always lands in a single path segment.
    pub fn url_for(&self, key: &CacheKey) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(key.as_str());
        }
        url
    }
}

#[async_trait]
impl Transport for ProxyTransport {
    async fn send(&self, key: &CacheKey, request: &TransportRequest) -> Result<RawResponse> {
        let body = ServerFetchOptions::from_descriptor(&request.descriptor, &request.headers, request.cache);
        let response = self.http.post(self.url_for(key)).json(&body).send().await?;

        let status = response.status();
        let headers = HeaderList::from_header_map(response.headers());
        let body = response.bytes().await?;
        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

pub struct DirectTransport {
    forwarder: Arc<Forwarder>,
}

impl DirectTransport {
    pub fn new(forwarder: Arc<Forwarder>) -> Self {
        Self { forwarder }
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn send(&self, _key: &CacheKey, request: &TransportRequest) -> Result<RawResponse> {
        self.forwarder.forward(&request.descriptor, &request.headers).await
    }
}
