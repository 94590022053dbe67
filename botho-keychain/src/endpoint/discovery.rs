//! Recommended-endpoint discovery.
//!
//! The discovery service answers a plain GET with `{ "rpc": "<url>" }`. Any
//! failure is reported as [`KeychainError::Discovery`]; callers recover with
//! their hardcoded fallback.

use crate::{
    config::EndpointConfig,
    error::{KeychainError, KeychainResult},
};
use serde::Deserialize;
use std::future::Future;

/// Source of the endpoint the `DEFAULT` sentinel resolves to.
pub trait DiscoveryService: Send + Sync {
    fn recommended_endpoint(&self) -> impl Future<Output = KeychainResult<String>> + Send;
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    rpc: Option<String>,
}

/// Discovery over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDiscovery {
    client: reqwest::Client,
    url: String,
}

impl HttpDiscovery {
    pub fn new(config: &EndpointConfig) -> KeychainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.discovery_timeout())
            .build()
            .map_err(|e| KeychainError::Discovery(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.discovery_url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DiscoveryService for HttpDiscovery {
    async fn recommended_endpoint(&self) -> KeychainResult<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KeychainError::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeychainError::Discovery(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body: DiscoveryResponse = response
            .json()
            .await
            .map_err(|e| KeychainError::Discovery(format!("malformed response: {}", e)))?;

        body.rpc
            .filter(|rpc| !rpc.is_empty())
            .ok_or_else(|| KeychainError::Discovery("response has no endpoint".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uses_configured_url() {
        let config = EndpointConfig {
            discovery_url: "https://discovery.example/rpc".to_string(),
            ..Default::default()
        };
        let discovery = HttpDiscovery::new(&config).unwrap();
        assert_eq!(discovery.url(), "https://discovery.example/rpc");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        // Port 9 (discard) on localhost is not an HTTP server.
        let config = EndpointConfig {
            discovery_url: "http://127.0.0.1:9/rpc".to_string(),
            discovery_timeout_secs: 1,
            ..Default::default()
        };
        let discovery = HttpDiscovery::new(&config).unwrap();
        assert!(matches!(
            discovery.recommended_endpoint().await,
            Err(KeychainError::Discovery(_))
        ));
    }
}
