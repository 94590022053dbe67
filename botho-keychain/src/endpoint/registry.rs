//! Endpoint registry.
//!
//! The list of candidate endpoints is rebuilt from storage on every query:
//! the preferred endpoint first, then the user-added endpoints, then the
//! static fallback list, with the preferred endpoint removed from the tail.

use super::{store::KeyValueStore, EndpointId};
use crate::{
    config::EndpointConfig,
    error::{KeychainError, KeychainResult},
};
use tracing::{debug, warn};

/// Storage key holding the JSON array of user-added endpoints.
pub const RPC_KEY: &str = "rpc";

/// Storage key holding the preferred endpoint identifier.
pub const CURRENT_RPC_KEY: &str = "current_rpc";

/// Ordered endpoint candidates backed by persisted preferences.
#[derive(Debug)]
pub struct EndpointRegistry<S> {
    store: S,
    fallback: Vec<EndpointId>,
}

impl<S: KeyValueStore> EndpointRegistry<S> {
    /// Create a registry whose static fallback is `DEFAULT`, the configured
    /// explicit endpoints, then `TESTNET`.
    pub fn new(store: S, config: &EndpointConfig) -> Self {
        let fallback = std::iter::once(EndpointId::Default)
            .chain(config.static_endpoints.iter().map(EndpointId::url))
            .chain(std::iter::once(EndpointId::Testnet))
            .collect();
        Self { store, fallback }
    }

    /// The static fallback list.
    pub fn fallback(&self) -> &[EndpointId] {
        &self.fallback
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Endpoints added by the user, oldest first.
    pub async fn custom(&self) -> KeychainResult<Vec<EndpointId>> {
        let Some(json) = self.store.get(RPC_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<EndpointId>>(&json) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!("Ignoring malformed '{}' entry: {}", RPC_KEY, e);
                Ok(Vec::new())
            }
        }
    }

    /// The user's preferred endpoint, `DEFAULT` if none was chosen.
    pub async fn preferred(&self) -> KeychainResult<EndpointId> {
        Ok(self
            .store
            .get(CURRENT_RPC_KEY)
            .await?
            .map(EndpointId::from)
            .unwrap_or(EndpointId::Default))
    }

    /// Build the candidate list, preferred endpoint first.
    pub async fn list(&self) -> KeychainResult<Vec<EndpointId>> {
        let preferred = self.preferred().await?;
        let tail: Vec<EndpointId> = self
            .custom()
            .await?
            .into_iter()
            .chain(self.fallback.iter().cloned())
            .filter(|id| *id != preferred)
            .collect();

        let mut list = Vec::with_capacity(tail.len() + 1);
        list.push(preferred);
        list.extend(tail);
        Ok(list)
    }

    /// Persist the preferred endpoint.
    pub async fn set_preferred(&self, id: &EndpointId) -> KeychainResult<()> {
        debug!("Saving preferred endpoint {}", id);
        self.store.set(CURRENT_RPC_KEY, id.to_string()).await
    }

    /// Add a user endpoint. Returns false if it was already present.
    pub async fn add_custom(&self, url: &str) -> KeychainResult<bool> {
        let id = validate_url(url)?;
        let mut custom = self.custom().await?;
        if custom.contains(&id) {
            return Ok(false);
        }
        custom.push(id);
        self.save_custom(&custom).await?;
        Ok(true)
    }

    /// Remove a user endpoint. Returns false if it was not present.
    ///
    /// If it was also the preferred endpoint the preference is reset to
    /// `DEFAULT`.
    pub async fn remove_custom(&self, url: &str) -> KeychainResult<bool> {
        let id = EndpointId::from(url);
        let mut custom = self.custom().await?;
        let before = custom.len();
        custom.retain(|e| *e != id);
        if custom.len() == before {
            return Ok(false);
        }
        self.save_custom(&custom).await?;

        if self.preferred().await? == id {
            self.store.remove(CURRENT_RPC_KEY).await?;
        }
        Ok(true)
    }

    async fn save_custom(&self, custom: &[EndpointId]) -> KeychainResult<()> {
        let json = serde_json::to_string(custom)?;
        self.store.set(RPC_KEY, json).await
    }
}

/// Only http(s) URLs may be added; sentinels are built in.
fn validate_url(url: &str) -> KeychainResult<EndpointId> {
    let parsed =
        url::Url::parse(url).map_err(|e| KeychainError::InvalidEndpoint(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(EndpointId::url(url)),
        scheme => Err(KeychainError::InvalidEndpoint(format!(
            "{}: unsupported scheme {}",
            url, scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::EndpointConfig, endpoint::store::MemoryStore};

    fn config() -> EndpointConfig {
        EndpointConfig {
            static_endpoints: vec!["https://s1".to_string(), "https://s2".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_storage_lists_fallback() {
        let registry = EndpointRegistry::new(MemoryStore::new(), &config());
        assert_eq!(
            registry.list().await.unwrap(),
            vec![
                EndpointId::Default,
                EndpointId::url("https://s1"),
                EndpointId::url("https://s2"),
                EndpointId::Testnet,
            ]
        );
    }

    #[tokio::test]
    async fn test_preferred_custom_endpoint_appears_once() {
        let store = MemoryStore::with_entries([
            (RPC_KEY, r#"["https://a"]"#),
            (CURRENT_RPC_KEY, "https://a"),
        ]);
        let registry = EndpointRegistry::new(store, &config());

        let list = registry.list().await.unwrap();
        assert_eq!(list[0], EndpointId::url("https://a"));
        assert_eq!(
            list.iter()
                .filter(|id| **id == EndpointId::url("https://a"))
                .count(),
            1
        );
        assert_eq!(list.len(), 5);
    }

    #[tokio::test]
    async fn test_custom_endpoints_precede_fallback() {
        let store = MemoryStore::with_entries([(RPC_KEY, r#"["https://a","https://b"]"#)]);
        let registry = EndpointRegistry::new(store, &config());

        let list = registry.list().await.unwrap();
        assert_eq!(
            list,
            vec![
                EndpointId::Default,
                EndpointId::url("https://a"),
                EndpointId::url("https://b"),
                EndpointId::url("https://s1"),
                EndpointId::url("https://s2"),
                EndpointId::Testnet,
            ]
        );
    }

    #[tokio::test]
    async fn test_preferred_sentinel_moves_to_head() {
        let store = MemoryStore::with_entries([(CURRENT_RPC_KEY, "TESTNET")]);
        let registry = EndpointRegistry::new(store, &config());

        let list = registry.list().await.unwrap();
        assert_eq!(list.first(), Some(&EndpointId::Testnet));
        assert_eq!(list.last(), Some(&EndpointId::url("https://s2")));
        assert_eq!(list.len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_custom_list_is_ignored() {
        let store = MemoryStore::with_entries([(RPC_KEY, "{not json")]);
        let registry = EndpointRegistry::new(store, &config());
        assert_eq!(registry.list().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_add_and_remove_custom() {
        let registry = EndpointRegistry::new(MemoryStore::new(), &config());

        assert!(registry.add_custom("https://mine.example").await.unwrap());
        assert!(!registry.add_custom("https://mine.example").await.unwrap());
        assert_eq!(
            registry.store().snapshot()[RPC_KEY],
            r#"["https://mine.example"]"#
        );

        registry
            .set_preferred(&EndpointId::url("https://mine.example"))
            .await
            .unwrap();
        assert!(registry.remove_custom("https://mine.example").await.unwrap());
        assert!(!registry.remove_custom("https://mine.example").await.unwrap());
        assert_eq!(registry.preferred().await.unwrap(), EndpointId::Default);
    }

    #[tokio::test]
    async fn test_add_custom_rejects_non_http() {
        let registry = EndpointRegistry::new(MemoryStore::new(), &config());
        assert!(matches!(
            registry.add_custom("wss://node.example").await,
            Err(KeychainError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            registry.add_custom("not a url").await,
            Err(KeychainError::InvalidEndpoint(_))
        ));
    }
}
