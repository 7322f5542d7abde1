//! HTTP client for the content API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use url::Url;

use crate::error::{Error, Result};
use crate::http::headers::HeaderList;
use crate::request::RawResponse;

/// Fully resolved outbound call, relative to the upstream base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: String,
    pub path: String,
    pub query_params: Option<BTreeMap<String, String>>,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderList,
}

/// Something that can execute an [`OutboundRequest`].
///
/// Any HTTP status is a successful send; only transport failures are errors.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse>;
}

/// `reqwest`-backed upstream.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    base_url: String,
    http: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    /// Join base URL and path with exactly one slash.
    fn url_for(&self, request: &OutboundRequest) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| Error::Validation(format!("invalid upstream URL: {e}")))?;
        if let Some(params) = &request.query_params {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl Upstream for UpstreamClient {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse> {
        let url = self.url_for(&request)?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::Validation(format!("invalid method '{}'", request.method)))?;

        let mut builder = self
            .http
            .request(method, url)
            .headers(request.headers.to_header_map());
        builder = match request.body {
            Some(serde_json::Value::String(raw)) => builder.body(raw),
            Some(body) => builder.json(&body),
            None => builder,
        };

        let response = builder.send().await?;
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

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str) -> OutboundRequest {
        OutboundRequest {
            method: "GET".into(),
            path: path.into(),
            query_params: None,
            body: None,
            headers: HeaderList::new(),
        }
    }

    #[test]
    fn test_url_join() {
        let client = UpstreamClient::new("https://cms.example.com/", Duration::from_secs(1)).unwrap();
        let url = client.url_for(&request("/api/query")).unwrap();
        assert_eq!(url.as_str(), "https://cms.example.com/api/query");

        let mut with_params = request("api/pages/blog");
        with_params.query_params = Some(BTreeMap::from([("select".to_string(), "title,url".to_string())]));
        let url = client.url_for(&with_params).unwrap();
        assert_eq!(url.as_str(), "https://cms.example.com/api/pages/blog?select=title%2Curl");
    }
}
