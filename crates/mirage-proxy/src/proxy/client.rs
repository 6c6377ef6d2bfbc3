//! HTTP client creation and configuration.
//!
//! One shared client serves all outbound calls: upstream forwarding and
//! remote middleware invocation. Bodies are always fully collected before
//! matching, so the client works on buffered `Full<Bytes>` bodies.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::info;

/// Type alias for the shared outbound HTTP client.
pub type HttpClient =
    Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Connection pool settings for the outbound client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout_secs: u64,
    pub keepalive_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            keepalive_timeout_secs: 60,
            idle_timeout_secs: 90,
            max_idle_per_host: 32,
        }
    }
}

/// Create the shared outbound client with connection pooling.
pub fn create_http_client(config: &ClientConfig) -> HttpClient {
    let mut http_connector = HttpConnector::new();
    http_connector.set_keepalive(Some(Duration::from_secs(config.keepalive_timeout_secs)));
    http_connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
    http_connector.enforce_http(false); // Allow both HTTP and HTTPS

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .expect("Failed to load native root certificates")
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .pool_max_idle_per_host(config.max_idle_per_host)
        .build(https_connector);

    info!(
        "outbound client configured (HTTP/1.1): max_idle={}, idle_timeout={}s, keepalive={}s",
        config.max_idle_per_host, config.idle_timeout_secs, config.keepalive_timeout_secs
    );

    client
}
