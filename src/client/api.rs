//! Inbound API for the UI layer.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::cache::{derive_key, CacheKey};
use crate::client::session::{ExecuteOptions, Session};
use crate::client::transport::{DirectTransport, ProxyTransport, Transport, TransportRequest};
use crate::config::{ProxyConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::http::headers::HeaderList;
use crate::request::{QueryRequest, RawResponse, RequestDescriptor, ResourceRequest};
use crate::resilience::{retry, with_timeout, RetryPolicy};
use crate::upstream::{Forwarder, UpstreamClient};

/// Per-call options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Use the session payload cache and allow the server cache. Default `true`.
    pub cache: bool,
    pub language: Option<String>,
    pub headers: HeaderList,
    /// Overrides the derived cache key.
    pub key: Option<CacheKey>,
    pub signal: Option<CancellationToken>,
    /// Extra attempts; defaults follow the method.
    pub retry: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            cache: true,
            language: None,
            headers: HeaderList::new(),
            key: None,
            signal: None,
            retry: None,
            timeout: None,
        }
    }
}

impl RequestOptions {
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn key(mut self, key: impl Into<CacheKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn retry(mut self, attempts: u32) -> Self {
        self.retry = Some(attempts);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Descriptor for a structured query; the language travels alongside it.
    pub fn query_descriptor(&self, query: QueryRequest) -> RequestDescriptor {
        RequestDescriptor::Query {
            query,
            language: self.language.clone(),
        }
    }

    /// Descriptor for a resource path; the language becomes a path prefix.
    pub fn resource_descriptor(&self, request: ResourceRequest) -> RequestDescriptor {
        match &self.language {
            Some(language) => RequestDescriptor::Resource(request.with_language(language)),
            None => RequestDescriptor::Resource(request),
        }
    }
}

#[derive(Clone)]
pub struct KirbyClient {
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    retries: RetryConfig,
    timeout: Option<Duration>,
}

impl KirbyClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            session: Arc::new(Session::new()),
            retries: RetryConfig::default(),
            timeout: None,
        }
    }

    /// Proxy or direct transport as configured. Direct mode needs valid
    /// credentials and fails here when they are missing.
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let transport: Arc<dyn Transport> = if config.client.direct {
            let upstream = UpstreamClient::new(
                config.upstream.url.clone(),
                Duration::from_secs(config.upstream.connect_timeout_secs),
            )?;
            let forwarder = Forwarder::new(
                Arc::new(upstream),
                &config.auth.context(),
                config.upstream.resolved_query_path(config.auth.mode),
            )?;
            Arc::new(DirectTransport::new(Arc::new(forwarder)))
        } else {
            Arc::new(ProxyTransport::new(
                &config.client.proxy_url,
                &config.client.route_prefix,
            )?)
        };

        let timeout = (config.timeouts.request_secs > 0)
            .then(|| Duration::from_secs(config.timeouts.request_secs));
        Ok(Self::new(transport)
            .with_retries(config.retries.clone())
            .with_timeout(timeout))
    }

    pub fn with_retries(mut self, retries: RetryConfig) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Same transport and settings, fresh session.
    pub fn fork(&self) -> Self {
        self.with_session(Arc::new(Session::new()))
    }

    pub fn with_session(&self, session: Arc<Session>) -> Self {
        Self {
            session,
            ..self.clone()
        }
    }

    /// Derived key, or the caller's key prefixed with the request variant.
    pub fn key_for(&self, descriptor: &RequestDescriptor, opts: &RequestOptions) -> CacheKey {
        match &opts.key {
            Some(key) => key.scoped(descriptor.kind()),
            None => derive_key(descriptor),
        }
    }

    pub async fn query(&self, query: QueryRequest, opts: RequestOptions) -> Result<RawResponse> {
        let descriptor = opts.query_descriptor(query);
        self.execute(descriptor, opts).await
    }

    pub async fn query_json<T: DeserializeOwned>(&self, query: QueryRequest, opts: RequestOptions) -> Result<T> {
        self.query(query, opts).await?.json()
    }

    pub async fn fetch(&self, request: ResourceRequest, opts: RequestOptions) -> Result<RawResponse> {
        let descriptor = opts.resource_descriptor(request);
        self.execute(descriptor, opts).await
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, request: ResourceRequest, opts: RequestOptions) -> Result<T> {
        self.fetch(request, opts).await?.json()
    }

    /// Validate, key, deduplicate and send `descriptor`.
    ///
    /// Invalid descriptors fail before any network activity. A non-2xx
    /// answer becomes [`Error::Upstream`].
    pub async fn execute(&self, descriptor: RequestDescriptor, opts: RequestOptions) -> Result<RawResponse> {
        descriptor.validate()?;

        let key = self.key_for(&descriptor, &opts);
        let kind = descriptor.kind();
        let method = match &descriptor {
            RequestDescriptor::Query { .. } => "POST".to_string(),
            RequestDescriptor::Resource(r) => r.effective_method(),
        };
        let mut policy = RetryPolicy::from_config(&self.retries, &method);
        if let Some(attempts) = opts.retry {
            policy = policy.with_attempts(attempts);
        }
        let timeout = opts.timeout.or(self.timeout);

        let transport = Arc::clone(&self.transport);
        let call_key = key.clone();
        let request = TransportRequest {
            descriptor,
            headers: opts.headers.clone(),
            cache: opts.cache,
        };
        let exec = ExecuteOptions {
            cache: opts.cache,
            signal: opts.signal.clone(),
        };

        self.session
            .execute(&key, &exec, move || async move {
                let (transport, key, request) = (&transport, &call_key, &request);
                retry(&policy, move |_| async move {
                    let raw = with_timeout(timeout, transport.send(key, request)).await?;
                    if raw.is_success() {
                        Ok(raw)
                    } else {
                        Err(Error::from_response(kind, &raw))
                    }
                })
                .await
            })
            .await
    }
}
