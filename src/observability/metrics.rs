//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, cache outcomes, dedup joins)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `kirby_proxy_requests_total` (counter): requests by route kind, status
//! - `kirby_proxy_request_duration_seconds` (histogram): latency distribution
//! - `kirby_proxy_cache_lookups_total` (counter): server cache `hit|miss|stale`
//! - `kirby_proxy_dedup_joins_total` (counter): callers attached to an in-flight call
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing
//! - Labels stay low-cardinality: never the cache key or the path

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("kirby_proxy_requests_total", "kind" => kind, "status" => status.clone()).increment(1);
    histogram!("kirby_proxy_request_duration_seconds", "kind" => kind, "status" => status)
        .record(start.elapsed().as_secs_f64());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    Stale,
}

impl CacheOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
            CacheOutcome::Stale => "stale",
        }
    }
}

pub fn record_cache_lookup(outcome: CacheOutcome) {
    counter!("kirby_proxy_cache_lookups_total", "outcome" => outcome.as_str()).increment(1);
}

/// `tier` is `client` or `server`.
pub fn record_dedup_join(tier: &'static str) {
    counter!("kirby_proxy_dedup_joins_total", "tier" => tier).increment(1);
}
