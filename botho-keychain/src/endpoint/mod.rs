//! Network endpoint selection.
//!
//! - [`registry`]: the ordered list of candidate endpoints and the user's
//!   persisted preference
//! - [`session`]: the endpoint currently applied to the network client, with
//!   one-shot rollback after scoped overrides
//! - [`discovery`]: the service resolving the `DEFAULT` sentinel
//! - [`store`]: key-value persistence backing the registry

pub mod discovery;
pub mod registry;
pub mod session;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_SENTINEL: &str = "DEFAULT";
const TESTNET_SENTINEL: &str = "TESTNET";

/// An endpoint identifier: a sentinel or an explicit URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EndpointId {
    /// Resolved through the discovery service
    Default,
    /// Test network placeholder; selecting it leaves the client untouched
    Testnet,
    /// Explicit endpoint URL
    Url(String),
}

impl EndpointId {
    pub fn url(url: impl Into<String>) -> Self {
        Self::from(url.into())
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, EndpointId::Url(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            EndpointId::Default => DEFAULT_SENTINEL,
            EndpointId::Testnet => TESTNET_SENTINEL,
            EndpointId::Url(url) => url,
        }
    }
}

impl From<String> for EndpointId {
    fn from(s: String) -> Self {
        match s.as_str() {
            DEFAULT_SENTINEL => EndpointId::Default,
            TESTNET_SENTINEL => EndpointId::Testnet,
            _ => EndpointId::Url(s),
        }
    }
}

impl From<&str> for EndpointId {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<EndpointId> for String {
    fn from(id: EndpointId) -> Self {
        match id {
            EndpointId::Url(url) => url,
            sentinel => sentinel.as_str().to_string(),
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub use discovery::{DiscoveryService, HttpDiscovery};
pub use registry::EndpointRegistry;
pub use session::EndpointSession;
pub use store::{FileStore, KeyValueStore, MemoryStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_parse() {
        assert_eq!(EndpointId::from("DEFAULT"), EndpointId::Default);
        assert_eq!(EndpointId::from("TESTNET"), EndpointId::Testnet);
        assert_eq!(
            EndpointId::from("https://rpc.botho.io/"),
            EndpointId::Url("https://rpc.botho.io/".to_string())
        );
        assert!(EndpointId::Default.is_sentinel());
        assert!(!EndpointId::url("https://a").is_sentinel());
    }

    #[test]
    fn test_serde_as_plain_strings() {
        let list = vec![
            EndpointId::Default,
            EndpointId::url("https://a"),
            EndpointId::Testnet,
        ];
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"["DEFAULT","https://a","TESTNET"]"#);

        let back: Vec<EndpointId> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, list);
    }
}
