//! Outbound request builder.
//!
//! Turns a validated descriptor plus caller headers into the call the content
//! API expects, with the process credentials attached.

use std::sync::Arc;

use crate::auth::{build_auth_header, AuthContext};
use crate::error::Result;
use crate::http::headers::HeaderList;
use crate::request::{RawResponse, RequestDescriptor, LANGUAGE_HEADER};
use crate::upstream::client::{OutboundRequest, Upstream};

pub struct Forwarder {
    upstream: Arc<dyn Upstream>,
    auth: HeaderList,
    query_path: String,
}

impl Forwarder {
    /// Fails with a configuration error when `auth` is incomplete, so a
    /// misconfigured process never issues a request.
    pub fn new(upstream: Arc<dyn Upstream>, auth: &AuthContext, query_path: impl Into<String>) -> Result<Self> {
        Ok(Self {
            upstream,
            auth: build_auth_header(auth)?,
            query_path: query_path.into(),
        })
    }

    pub fn build(&self, descriptor: &RequestDescriptor, caller_headers: &HeaderList) -> OutboundRequest {
        let mut headers = caller_headers.clone();
        // Credentials always win over anything the caller sent.
        headers.merge(&self.auth);

        match descriptor {
            RequestDescriptor::Query { query, language } => {
                if let Some(language) = language {
                    headers.insert(LANGUAGE_HEADER, language.clone());
                }
                OutboundRequest {
                    method: "POST".to_string(),
                    path: self.query_path.clone(),
                    query_params: None,
                    body: serde_json::to_value(query).ok(),
                    headers,
                }
            }
            RequestDescriptor::Resource(r) => OutboundRequest {
                method: r.effective_method(),
                path: r.path.clone(),
                query_params: r.query_params.clone(),
                body: r.body.clone(),
                headers,
            },
        }
    }

    pub async fn forward(&self, descriptor: &RequestDescriptor, caller_headers: &HeaderList) -> Result<RawResponse> {
        self.upstream.send(self.build(descriptor, caller_headers)).await
    }
}
