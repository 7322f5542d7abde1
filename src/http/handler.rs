//! Server proxy handler.
//!
//! # Responsibilities
//! - Rebuild and validate the descriptor named by the route key
//! - Forward through the response cache when caching is on and requested
//! - Report upstream 4xx/5xx without failing the request
//!
//! # Design Decisions
//! - Validation failures never reach the upstream
//! - Any failure contacting upstream becomes 503; details stay in the logs
//! - The route key doubles as the server cache key; a key in derived form is
//!   recomputed from the body so one body can't fill another body's entry

use std::sync::Arc;

use crate::cache::{derive_key, CacheKey, ResponseCache};
use crate::error::{Error, Result};
use crate::http::headers::HeaderList;
use crate::request::{RawResponse, RequestDescriptor, RouteKind, ServerFetchOptions};
use crate::upstream::Forwarder;

pub struct ProxyHandler {
    forwarder: Arc<Forwarder>,
    cache: Option<Arc<ResponseCache>>,
    verbose_errors: bool,
}

impl ProxyHandler {
    pub fn new(forwarder: Arc<Forwarder>) -> Self {
        Self {
            forwarder,
            cache: None,
            verbose_errors: false,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn verbose_errors(mut self, verbose: bool) -> Self {
        self.verbose_errors = verbose;
        self
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// Handle one proxy call. `body` is the serialized descriptor.
    pub async fn handle(&self, route_key: &str, body: &[u8]) -> Result<RawResponse> {
        let kind = RouteKind::from_key(route_key);
        let options: ServerFetchOptions = serde_json::from_slice(body)
            .map_err(|e| Error::Validation(format!("invalid request body: {e}")))?;
        let use_cache = options.cache;
        let (descriptor, headers) = options.into_descriptor(kind)?;

        let response = match &self.cache {
            Some(cache) if use_cache => {
                let key = server_cache_key(route_key, &descriptor);
                let forwarder = Arc::clone(&self.forwarder);
                let descriptor = descriptor.clone();
                let headers = headers.clone();
                cache
                    .get_or_fetch(&key, move || async move {
                        forwarder.forward(&descriptor, &headers).await
                    })
                    .await
            }
            _ => self.forwarder.forward(&descriptor, &headers).await,
        };

        let response = response.map_err(|e| self.unreachable(kind, &descriptor, e))?;
        if response.is_error() {
            self.report(kind, &descriptor, &headers, &response);
        }
        Ok(response)
    }

    fn unreachable(&self, kind: RouteKind, descriptor: &RequestDescriptor, err: Error) -> Error {
        match err {
            Error::Validation(_) => err,
            other => {
                tracing::error!(
                    kind = kind.as_str(),
                    target = %descriptor.describe(),
                    error = %other,
                    "Upstream unreachable"
                );
                Error::Transport(other.to_string())
            }
        }
    }

    fn report(&self, kind: RouteKind, descriptor: &RequestDescriptor, headers: &HeaderList, response: &RawResponse) {
        if self.verbose_errors {
            let detail = match descriptor {
                RequestDescriptor::Query { query, .. } => serde_json::to_string(query).unwrap_or_default(),
                RequestDescriptor::Resource(r) => serde_json::to_string(r).unwrap_or_default(),
            };
            tracing::error!(
                kind = kind.as_str(),
                status = response.status,
                target = %descriptor.describe(),
                detail = %detail,
                language = headers.get(crate::request::LANGUAGE_HEADER).unwrap_or_default(),
                body = %response.text(),
                "{}",
                kind.failure_message()
            );
        } else {
            tracing::error!(
                kind = kind.as_str(),
                status = response.status,
                target = %descriptor.describe(),
                "{}",
                kind.failure_message()
            );
        }
    }
}

/// Key for the server cache. Caller-chosen keys are used as given.
fn server_cache_key(route_key: &str, descriptor: &RequestDescriptor) -> CacheKey {
    let key = CacheKey::from(route_key);
    if !key.is_derived() {
        return key;
    }
    let derived = derive_key(descriptor);
    if derived != key {
        tracing::debug!(route_key = %key, derived = %derived, "Route key does not match request body");
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthContext;
    use crate::cache::{CachePolicy, MemoryStore};
    use crate::upstream::{OutboundRequest, Upstream};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockUpstream {
        calls: AtomicUsize,
        last: Mutex<Option<OutboundRequest>>,
        status: u16,
        fail: bool,
    }

    #[async_trait]
    impl Upstream for MockUpstream {
        async fn send(&self, request: OutboundRequest) -> Result<RawResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request);
            if self.fail {
                return Err(Error::Transport("connection refused".into()));
            }
            Ok(RawResponse::new(self.status, r#"{"result":"ok"}"#))
        }
    }

    fn handler(upstream: Arc<MockUpstream>) -> ProxyHandler {
        let forwarder = Forwarder::new(upstream, &AuthContext::basic("a", "b"), "api/query").unwrap();
        ProxyHandler::new(Arc::new(forwarder))
    }

    fn ok_upstream() -> Arc<MockUpstream> {
        Arc::new(MockUpstream {
            status: 200,
            ..MockUpstream::default()
        })
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_upstream() {
        let upstream = ok_upstream();
        let body = json!({ "query": { "query": "" } }).to_string();

        let err = handler(upstream.clone()).handle("$kqlabc", body.as_bytes()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.status_message(), "query is empty");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_absolute_path_rejected_before_upstream() {
        let upstream = ok_upstream();
        let body = json!({ "path": "http://evil.example/x" }).to_string();

        let err = handler(upstream.clone()).handle("$kirbyabc", body.as_bytes()).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.status_message(), "absolute URLs not allowed");
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let upstream = ok_upstream();
        let err = handler(upstream.clone()).handle("$kqlabc", b"not json").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_forwarded_with_auth_and_language() {
        let upstream = ok_upstream();
        let body = json!({
            "query": { "query": "site", "select": { "title": true } },
            "headers": { "X-Language": "de", "Authorization": "Bearer forged" }
        })
        .to_string();

        let response = handler(upstream.clone()).handle("$kqlabc", body.as_bytes()).await.unwrap();
        assert_eq!(response.status, 200);

        let sent = upstream.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.method, "POST");
        assert_eq!(sent.path, "api/query");
        assert_eq!(sent.headers.get("x-language"), Some("de"));
        assert_eq!(sent.headers.get("authorization"), Some("Basic YTpi"));
    }

    #[tokio::test]
    async fn test_upstream_error_status_passed_through() {
        let upstream = Arc::new(MockUpstream {
            status: 404,
            ..MockUpstream::default()
        });
        let body = json!({ "path": "api/pages/missing" }).to_string();

        let response = handler(upstream).handle("$kirbyabc", body.as_bytes()).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_network_failure_is_service_unavailable() {
        let upstream = Arc::new(MockUpstream {
            fail: true,
            ..MockUpstream::default()
        });
        let body = json!({ "path": "api/site" }).to_string();

        let err = handler(upstream).handle("$kirbyabc", body.as_bytes()).await.unwrap_err();
        assert_eq!(err.status_code(), 503);
        assert_eq!(err.shape().status_message, "Service Unavailable");
        assert!(err.shape().data.is_none());
    }

    #[tokio::test]
    async fn test_cache_used_only_when_requested() {
        let upstream = ok_upstream();
        let cache = Arc::new(ResponseCache::new(
            Arc::new(MemoryStore::new(10)),
            CachePolicy {
                max_age: Duration::from_secs(60),
                stale_while_revalidate: false,
            },
        ));
        let handler = handler(upstream.clone()).with_cache(cache);

        let cached = json!({ "path": "api/site" }).to_string();
        handler.handle("$kirbysite", cached.as_bytes()).await.unwrap();
        handler.handle("$kirbysite", cached.as_bytes()).await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);

        let uncached = json!({ "path": "api/site", "cache": false }).to_string();
        handler.handle("$kirbysite", uncached.as_bytes()).await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_derived_route_key_recomputed_from_body() {
        let upstream = ok_upstream();
        let cache = Arc::new(ResponseCache::new(
            Arc::new(MemoryStore::new(10)),
            CachePolicy {
                max_age: Duration::from_secs(60),
                stale_while_revalidate: false,
            },
        ));
        let handler = handler(upstream.clone()).with_cache(cache.clone());

        let site = RequestDescriptor::query(crate::request::QueryRequest::new("site"));
        let children = RequestDescriptor::query(crate::request::QueryRequest::new("site.children"));
        let (site_key, children_key) = (derive_key(&site), derive_key(&children));
        let site_body = json!({ "query": { "query": "site" } }).to_string();
        let children_body = json!({ "query": { "query": "site.children" } }).to_string();

        // body for "site" sent under the key of "site.children"
        handler.handle(children_key.as_str(), site_body.as_bytes()).await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);

        handler.handle(children_key.as_str(), children_body.as_bytes()).await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);

        handler.handle(site_key.as_str(), site_body.as_bytes()).await.unwrap();
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_custom_route_key_used_as_given() {
        let site = RequestDescriptor::query(crate::request::QueryRequest::new("site"));
        assert_eq!(server_cache_key("$kqlnavigation", &site).as_str(), "$kqlnavigation");
        assert_eq!(server_cache_key(derive_key(&site).as_str(), &site), derive_key(&site));
    }
}
