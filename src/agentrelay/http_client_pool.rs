//! HTTP Client Pool for maintaining persistent connections.
//!
//! Orchestrators poll the same handful of agent listeners over and over, so each base URL gets
//! one pooled `reqwest::Client` that is reused across delegations instead of reconnecting per
//! request.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::time::Duration;

/// Global cache of HTTP clients indexed by base URL and request timeout.
static CLIENT_POOL: Lazy<DashMap<(String, Duration), reqwest::Client>> = Lazy::new(DashMap::new);

/// Creates or retrieves a shared HTTP client for the given base URL.
///
/// The client keeps up to 16 idle connections per host for 90 seconds and bounds every request
/// by `request_timeout`; the connect timeout is capped at the same value.
pub fn get_or_create_client(base_url: &str, request_timeout: Duration) -> reqwest::Client {
    CLIENT_POOL
        .entry((base_url.to_string(), request_timeout))
        .or_insert_with(|| create_pooled_client(request_timeout))
        .clone()
}

fn create_pooled_client(request_timeout: Duration) -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .pool_max_idle_per_host(16)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .connect_timeout(request_timeout.min(Duration::from_secs(10)))
        .timeout(request_timeout)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}
