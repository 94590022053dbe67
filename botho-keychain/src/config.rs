//! Keychain configuration.
//!
//! Every field has a default so an empty TOML file is a valid configuration.

use crate::{
    error::{KeychainError, KeychainResult},
    idle::IdlePolicy,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Product name used to tag privileged-to-page messages.
pub const DEFAULT_PRODUCT: &str = "botho_keychain";

/// Page-to-privileged channel carrying the handshake probe.
pub const DEFAULT_HANDSHAKE_CHANNEL: &str = "swHandshake_botho";

/// Page-to-privileged channel carrying every typed request.
pub const DEFAULT_REQUEST_CHANNEL: &str = "swRequest_botho";

/// Discovery service returning the recommended endpoint as `{ "rpc": url }`.
pub const DEFAULT_DISCOVERY_URL: &str = "https://api.botho-keychain.io/bth/rpc";

/// Used whenever the discovery service cannot be reached.
pub const DEFAULT_FALLBACK_URL: &str = "https://rpc.botho.io/";

/// Explicit endpoints shipped with each release.
const DEFAULT_STATIC_ENDPOINTS: &[&str] = &[
    "https://rpc.botho.io/",
    "https://rpc2.botho.network",
    "https://botho-rpc.nodes.org",
];

/// Main configuration for the keychain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeychainConfig {
    /// Boundary channel naming
    #[serde(default)]
    pub boundary: BoundaryConfig,

    /// Endpoint selection and discovery
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Request dispatch behaviour
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Auto-lock policy
    #[serde(default)]
    pub idle: IdlePolicy,

    /// Advisory transfer warnings
    #[serde(default)]
    pub transfer: TransferValidatorConfig,
}

impl KeychainConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> KeychainResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            KeychainError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| KeychainError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Load configuration from a file if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> KeychainResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration as TOML.
    pub fn save(&self, path: &Path) -> KeychainResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(|e| KeychainError::Config(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

/// Names used on both sides of the trust boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Product name; responses are tagged `<product>_response` and
    /// `<product>_handshake`
    #[serde(default = "default_product")]
    pub product: String,

    /// Channel for the handshake probe
    #[serde(default = "default_handshake_channel")]
    pub handshake_channel: String,

    /// Channel for typed requests
    #[serde(default = "default_request_channel")]
    pub request_channel: String,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            product: default_product(),
            handshake_channel: default_handshake_channel(),
            request_channel: default_request_channel(),
        }
    }
}

impl BoundaryConfig {
    /// Discriminator of privileged-to-page responses.
    pub fn response_type(&self) -> String {
        format!("{}_response", self.product)
    }

    /// Discriminator of privileged-to-page handshake acknowledgements.
    pub fn handshake_type(&self) -> String {
        format!("{}_handshake", self.product)
    }
}

fn default_product() -> String {
    DEFAULT_PRODUCT.to_string()
}

fn default_handshake_channel() -> String {
    DEFAULT_HANDSHAKE_CHANNEL.to_string()
}

fn default_request_channel() -> String {
    DEFAULT_REQUEST_CHANNEL.to_string()
}

/// Endpoint registry and session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Discovery service queried when resolving `DEFAULT`
    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,

    /// Timeout for the discovery request (seconds)
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,

    /// Hardcoded endpoint used when discovery fails
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,

    /// Endpoint the network client is built with before any selection
    #[serde(default = "default_fallback_url")]
    pub initial_endpoint: String,

    /// Explicit endpoints placed between the `DEFAULT` and `TESTNET`
    /// sentinels in the static fallback list
    #[serde(default = "default_static_endpoints")]
    pub static_endpoints: Vec<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            discovery_url: default_discovery_url(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
            fallback_url: default_fallback_url(),
            initial_endpoint: default_fallback_url(),
            static_endpoints: default_static_endpoints(),
        }
    }
}

impl EndpointConfig {
    /// Discovery timeout as a Duration.
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

fn default_discovery_url() -> String {
    DEFAULT_DISCOVERY_URL.to_string()
}

fn default_discovery_timeout_secs() -> u64 {
    5
}

fn default_fallback_url() -> String {
    DEFAULT_FALLBACK_URL.to_string()
}

fn default_static_endpoints() -> Vec<String> {
    DEFAULT_STATIC_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}

/// Request dispatcher configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Pending requests older than this are dropped. `None` keeps them until
    /// a response arrives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl DispatcherConfig {
    /// Request timeout as a Duration, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// An exchange account and the tokens it accepts deposits in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Deposit account
    pub account: String,
    /// Accepted currencies
    pub tokens: Vec<String>,
}

/// Lists consulted by the transfer validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferValidatorConfig {
    /// Accounts known to be used for phishing
    #[serde(default)]
    pub phishing_accounts: Vec<String>,

    /// Exchange deposit accounts
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<ExchangeConfig>,
}

impl Default for TransferValidatorConfig {
    fn default() -> Self {
        Self {
            phishing_accounts: Vec::new(),
            exchanges: default_exchanges(),
        }
    }
}

fn default_exchanges() -> Vec<ExchangeConfig> {
    ["botho-gateway", "p2pb2b", "bitexchange"]
        .iter()
        .map(|account| ExchangeConfig {
            account: account.to_string(),
            tokens: vec!["BTH".to_string()],
        })
        .collect()
}

/// Builder for keychain configuration.
#[derive(Debug, Default)]
pub struct KeychainConfigBuilder {
    config: KeychainConfig,
}

impl KeychainConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the product name used to tag responses.
    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.config.boundary.product = product.into();
        self
    }

    /// Set the discovery service URL.
    pub fn discovery_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.discovery_url = url.into();
        self
    }

    /// Set the hardcoded fallback endpoint.
    pub fn fallback_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.fallback_url = url.into();
        self
    }

    /// Set the endpoint the session starts on.
    pub fn initial_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.initial_endpoint = url.into();
        self
    }

    /// Replace the shipped explicit endpoints.
    pub fn static_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.config.endpoints.static_endpoints = endpoints;
        self
    }

    /// Set the request timeout.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.dispatcher.request_timeout_secs = Some(secs);
        self
    }

    /// Set the idle policy.
    pub fn idle_policy(mut self, policy: IdlePolicy) -> Self {
        self.config.idle = policy;
        self
    }

    /// Set the phishing account list.
    pub fn phishing_accounts(mut self, accounts: Vec<String>) -> Self {
        self.config.transfer.phishing_accounts = accounts;
        self
    }

    /// Build the config.
    pub fn build(self) -> KeychainConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idle::LockMode;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = KeychainConfig::default();
        assert_eq!(config.boundary.product, "botho_keychain");
        assert_eq!(config.boundary.request_channel, "swRequest_botho");
        assert_eq!(config.boundary.handshake_channel, "swHandshake_botho");
        assert_eq!(config.endpoints.fallback_url, DEFAULT_FALLBACK_URL);
        assert!(config.dispatcher.request_timeout().is_none());
        assert_eq!(config.idle.mode, LockMode::Disabled);
    }

    #[test]
    fn test_response_discriminators() {
        let boundary = BoundaryConfig::default();
        assert_eq!(boundary.response_type(), "botho_keychain_response");
        assert_eq!(boundary.handshake_type(), "botho_keychain_handshake");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: KeychainConfig = toml::from_str("").unwrap();
        assert_eq!(config.endpoints.discovery_url, DEFAULT_DISCOVERY_URL);
        assert_eq!(config.endpoints.static_endpoints.len(), 3);
        assert_eq!(config.transfer.exchanges.len(), 3);
    }

    #[test]
    fn test_partial_toml() {
        let config: KeychainConfig = toml::from_str(
            r#"
            [endpoints]
            fallback_url = "https://backup.example"

            [dispatcher]
            request_timeout_secs = 30

            [idle]
            mode = "lock-on-idle"
            threshold_minutes = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoints.fallback_url, "https://backup.example");
        assert_eq!(config.endpoints.discovery_url, DEFAULT_DISCOVERY_URL);
        assert_eq!(
            config.dispatcher.request_timeout(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.idle.mode, LockMode::LockOnIdle);
        assert_eq!(config.idle.threshold_minutes, 10);
    }

    #[test]
    fn test_config_builder() {
        let config = KeychainConfigBuilder::new()
            .product("test_keychain")
            .fallback_url("https://fallback.example")
            .request_timeout_secs(5)
            .build();

        assert_eq!(config.boundary.response_type(), "test_keychain_response");
        assert_eq!(config.endpoints.fallback_url, "https://fallback.example");
        assert_eq!(config.dispatcher.request_timeout_secs, Some(5));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keychain.toml");

        let config = KeychainConfigBuilder::new()
            .phishing_accounts(vec!["scammer".to_string()])
            .build();
        config.save(&path).unwrap();

        let loaded = KeychainConfig::load(&path).unwrap();
        assert_eq!(loaded.transfer.phishing_accounts, vec!["scammer"]);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = KeychainConfig::load_or_default(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.boundary.product, DEFAULT_PRODUCT);
    }
}
