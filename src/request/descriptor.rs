//! Request descriptors and their serialized wire form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::key::{QUERY_KEY_PREFIX, RESOURCE_KEY_PREFIX};
use crate::error::{Error, Result};
use crate::http::headers::HeaderList;

/// Header carrying the locale discriminator for structured queries.
pub const LANGUAGE_HEADER: &str = "x-language";

/// Origin used to decide whether a resource path stays on the upstream host.
const SYNTHETIC_BASE: &str = "http://localhost";

/// A structured query against the content API, e.g. `page("blog").children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            select: None,
            pagination: None,
        }
    }

    pub fn select(mut self, select: serde_json::Value) -> Self {
        self.select = Some(select);
        self
    }

    pub fn paginate(mut self, limit: u32, page: u32) -> Self {
        self.pagination = Some(Pagination {
            limit: Some(limit),
            page: Some(page),
        });
        self
    }

    /// A query without a root selector cannot be executed.
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
    }
}

/// A raw request against an arbitrary path on the content API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<BTreeMap<String, String>>,
}

impl ResourceRequest {
    /// The leading slash is dropped so `/blog` and `blog` address the same resource.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: path.as_ref().trim_start_matches('/').to_string(),
            method: None,
            body: None,
            query_params: None,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Prefix the path with a language segment: `blog` → `de/blog`.
    pub fn with_language(mut self, language: &str) -> Self {
        let language = language.trim_matches('/');
        if !language.is_empty() {
            self.path = if self.path.is_empty() {
                language.to_string()
            } else {
                format!("{language}/{}", self.path)
            };
        }
        self
    }

    /// Upper-cased method, `GET` when unset.
    pub fn effective_method(&self) -> String {
        self.method
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .map(|m| m.trim().to_ascii_uppercase())
            .unwrap_or_else(|| "GET".to_string())
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(Error::Validation("path is empty".to_string()));
        }
        ensure_same_origin(&self.path)
    }
}

/// Reject paths that would escape the upstream origin (absolute or
/// scheme-relative URLs), so the proxy cannot be used as an open relay.
pub fn ensure_same_origin(path: &str) -> Result<()> {
    let rejected = || Error::Validation("absolute URLs not allowed".to_string());
    let base = Url::parse(SYNTHETIC_BASE).map_err(|_| rejected())?;
    match base.join(path) {
        Ok(resolved) if resolved.origin() == base.origin() => Ok(()),
        _ => Err(rejected()),
    }
}

/// Which upstream endpoint a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Query,
    Resource,
}

impl RouteKind {
    /// Recover the variant from a proxy route key.
    pub fn from_key(key: &str) -> Self {
        if key.starts_with(QUERY_KEY_PREFIX) {
            RouteKind::Query
        } else {
            RouteKind::Resource
        }
    }

    pub fn key_prefix(self) -> &'static str {
        match self {
            RouteKind::Query => QUERY_KEY_PREFIX,
            RouteKind::Resource => RESOURCE_KEY_PREFIX,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Query => "query",
            RouteKind::Resource => "resource",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            RouteKind::Query => "failed to execute query",
            RouteKind::Resource => "failed to fetch resource",
        }
    }
}

/// Semantic identity of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestDescriptor {
    Query {
        query: QueryRequest,
        language: Option<String>,
    },
    Resource(ResourceRequest),
}

impl RequestDescriptor {
    pub fn query(query: QueryRequest) -> Self {
        RequestDescriptor::Query {
            query,
            language: None,
        }
    }

    pub fn resource(request: ResourceRequest) -> Self {
        RequestDescriptor::Resource(request)
    }

    pub fn kind(&self) -> RouteKind {
        match self {
            RequestDescriptor::Query { .. } => RouteKind::Query,
            RequestDescriptor::Resource(_) => RouteKind::Resource,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            RequestDescriptor::Query { query, .. } if query.is_empty() => {
                Err(Error::Validation("query is empty".to_string()))
            }
            RequestDescriptor::Query { .. } => Ok(()),
            RequestDescriptor::Resource(resource) => resource.validate(),
        }
    }

    /// Short label for logs: the query selector or `METHOD path`.
    pub fn describe(&self) -> String {
        match self {
            RequestDescriptor::Query { query, .. } => query.query.clone(),
            RequestDescriptor::Resource(r) => format!("{} {}", r.effective_method(), r.path),
        }
    }
}

fn default_cache() -> bool {
    true
}

/// Body of a proxy endpoint call (the serialized descriptor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFetchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "HeaderList::is_empty")]
    pub headers: HeaderList,
    #[serde(default = "default_cache")]
    pub cache: bool,
}

impl ServerFetchOptions {
    /// Serialize a descriptor. The query language travels as `X-Language`.
    pub fn from_descriptor(descriptor: &RequestDescriptor, headers: &HeaderList, cache: bool) -> Self {
        let mut headers = headers.clone();
        match descriptor {
            RequestDescriptor::Query { query, language } => {
                if let Some(language) = language {
                    headers.insert(LANGUAGE_HEADER, language.clone());
                }
                Self {
                    query: Some(query.clone()),
                    path: None,
                    method: None,
                    body: None,
                    query_params: None,
                    headers,
                    cache,
                }
            }
            RequestDescriptor::Resource(r) => Self {
                query: None,
                path: Some(r.path.clone()),
                method: r.method.clone(),
                body: r.body.clone(),
                query_params: r.query_params.clone(),
                headers,
                cache,
            },
        }
    }

    /// Rebuild and validate the descriptor for a route of the given kind.
    ///
    /// Returns the descriptor and the caller headers that travel with it.
    pub fn into_descriptor(self, kind: RouteKind) -> Result<(RequestDescriptor, HeaderList)> {
        let descriptor = match kind {
            RouteKind::Query => {
                let query = self
                    .query
                    .ok_or_else(|| Error::Validation("query is empty".to_string()))?;
                let language = self.headers.get(LANGUAGE_HEADER).map(str::to_string);
                RequestDescriptor::Query { query, language }
            }
            RouteKind::Resource => RequestDescriptor::Resource(ResourceRequest {
                path: self.path.unwrap_or_default(),
                method: self.method,
                body: self.body,
                query_params: self.query_params,
            }),
        };
        descriptor.validate()?;
        Ok((descriptor, self.headers))
    }
}
