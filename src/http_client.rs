//! Shared HTTP Client Module
//!
//! Provides global, lazy-initialized HTTP clients with connection pooling.
//! The API client talks to the DocManage backend; the image client fetches
//! pre-signed photo URLs from object storage and never carries the bearer
//! token, so it is kept as a separate pool with its own timeouts.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

use crate::config::ClientConfig;

/// Global HTTP client for DocManage API calls
///
/// - 30s timeout (uploads of several photos included)
/// - 10 idle connections per host
pub static API_CLIENT: Lazy<Client> = Lazy::new(|| {
    build_api_client(Duration::from_secs(ClientConfig::DEFAULT_REQUEST_TIMEOUT_SECS))
        .expect("Failed to create API HTTP client")
});

/// Global HTTP client for pre-signed image downloads
///
/// Object storage can be slower or rate-limited compared to the API, so the
/// timeout is longer and the pool is smaller.
pub static IMAGE_CLIENT: Lazy<Client> = Lazy::new(|| {
    build_image_client(Duration::from_secs(ClientConfig::DEFAULT_IMAGE_TIMEOUT_SECS))
        .expect("Failed to create image HTTP client")
});

/// Build an API client with a custom timeout
pub fn build_api_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
}

/// Build an image client with a custom timeout
pub fn build_image_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
}

/// API client for a configured timeout: the shared pool when the timeout is
/// the default, otherwise a dedicated client
pub fn api_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
    if uses_shared_api_client(timeout) {
        return Ok(api_client().clone());
    }
    build_api_client(timeout)
}

fn uses_shared_api_client(timeout: Duration) -> bool {
    timeout == Duration::from_secs(ClientConfig::DEFAULT_REQUEST_TIMEOUT_SECS)
}

/// Get the global API HTTP client
#[inline]
pub fn api_client() -> &'static Client {
    &API_CLIENT
}

/// Get the global image HTTP client
#[inline]
pub fn image_client() -> &'static Client {
    &IMAGE_CLIENT
}
