// # HTTP Address Source
//
// This crate provides an HTTP-based address source for fwsync.
//
// ## Purpose
//
// This is a **fallback address source** for:
// - Hosts where interface enumeration sees only a NAT66 or ULA address
// - CI/CD testing
// - Debugging and validation
//
// ## IMPORTANT: Not Primary
//
// Prefer the `interfaces` source (fwsync-ip-local). An echo service reports
// the address the host egresses from, which is not necessarily the one
// inbound traffic should reach.
//
// ## Architecture
//
// Fetches the address from an echo service that returns it as plain text
// (e.g., api6.ipify.org). One request per run, no caching.

use fwsync_core::config::AddressSourceConfig;
use fwsync_core::traits::{AddressSource, AddressSourceFactory};
use fwsync_core::{DriverRegistry, Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// HTTP-based address source
pub struct HttpAddressSource {
    /// URL returning the address as plain text
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpAddressSource {
    /// Create a new HTTP address source
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch the address from (e.g., "https://api6.ipify.org")
    /// - `timeout`: Per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Create with the default timeout
    pub fn with_default_timeout(url: impl Into<String>) -> Result<Self> {
        Self::new(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Fetch the address text from the echo service
    async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::http(format!("HTTP error: {}", response.status())));
        }

        response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response: {}", e)))
    }
}

/// Parse an echo service body into an address
fn parse_body(body: &str) -> Result<IpAddr> {
    let text = body.trim();
    text.parse()
        .map_err(|_| Error::parse(format!("Invalid IP address: {}", text)))
}

#[async_trait::async_trait]
impl AddressSource for HttpAddressSource {
    async fn candidates(&self) -> Result<Vec<IpAddr>> {
        let body = self.fetch().await?;
        let ip = parse_body(&body)?;
        tracing::debug!("{} reports {}", self.url, ip);
        Ok(vec![ip])
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

/// Factory for creating HTTP address sources
pub struct HttpFactory;

impl AddressSourceFactory for HttpFactory {
    fn create(&self, config: &AddressSourceConfig) -> Result<Box<dyn AddressSource>> {
        match config {
            AddressSourceConfig::Http { url, timeout_secs } => Ok(Box::new(HttpAddressSource::new(
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP address source")),
        }
    }
}

/// Register the HTTP address source with a registry
pub fn register(registry: &DriverRegistry) {
    registry.register_address_source("http", Box::new(HttpFactory));
}
