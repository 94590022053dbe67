//! Endpoint session.
//!
//! Tracks the endpoint applied to the network client and the one before it.
//! A selection marked as a scoped override is reverted by the next
//! [`EndpointSession::rollback`]; only one level is remembered, so a second
//! override before the rollback replaces the first one's target.

use super::{
    discovery::DiscoveryService, registry::EndpointRegistry, store::KeyValueStore, EndpointId,
};
use crate::{
    config::EndpointConfig,
    error::KeychainResult,
    network::{ClientOptions, NetworkClient},
};
use tracing::{debug, info, warn};

/// The active endpoint and its rollback state.
#[derive(Debug)]
pub struct EndpointSession<S, D, N> {
    registry: EndpointRegistry<S>,
    discovery: D,
    client: N,
    /// Used when `DEFAULT` cannot be resolved through discovery
    fallback_url: String,
    current: EndpointId,
    previous: Option<EndpointId>,
    pending_rollback: bool,
}

impl<S, D, N> EndpointSession<S, D, N>
where
    S: KeyValueStore,
    D: DiscoveryService,
    N: NetworkClient,
{
    /// Create a session. The client is assumed to already target
    /// `config.initial_endpoint`.
    pub fn new(
        registry: EndpointRegistry<S>,
        discovery: D,
        client: N,
        config: &EndpointConfig,
    ) -> Self {
        Self {
            registry,
            discovery,
            client,
            fallback_url: config.fallback_url.clone(),
            current: EndpointId::from(config.initial_endpoint.as_str()),
            previous: None,
            pending_rollback: false,
        }
    }

    pub fn current(&self) -> &EndpointId {
        &self.current
    }

    pub fn previous(&self) -> Option<&EndpointId> {
        self.previous.as_ref()
    }

    pub fn is_rollback_pending(&self) -> bool {
        self.pending_rollback
    }

    pub fn registry(&self) -> &EndpointRegistry<S> {
        &self.registry
    }

    pub fn client(&self) -> &N {
        &self.client
    }

    /// Switch to `id`.
    ///
    /// Selecting the current endpoint does nothing. An identifier missing
    /// from the registry list is replaced by the current endpoint. With
    /// `scoped_override` the next [`rollback`](Self::rollback) returns to the
    /// endpoint active before this call.
    pub async fn select_endpoint(&mut self, id: &EndpointId, scoped_override: bool) {
        if *id == self.current {
            return;
        }

        let recognized = match self.registry.list().await {
            Ok(list) => list.contains(id),
            Err(e) => {
                warn!("Could not read endpoint list: {}", e);
                false
            }
        };

        let target = if recognized {
            id.clone()
        } else {
            debug!("Endpoint {} is not registered, keeping {}", id, self.current);
            self.current.clone()
        };

        if target != self.current {
            self.apply(&target).await;
        }

        self.previous = Some(std::mem::replace(&mut self.current, target));
        self.pending_rollback = scoped_override;
        info!(
            "Now using {}, previous: {}",
            self.current,
            self.previous.as_ref().map(EndpointId::as_str).unwrap_or("none")
        );
    }

    /// Undo the last scoped override, once.
    pub async fn rollback(&mut self) {
        if !self.pending_rollback {
            return;
        }
        self.pending_rollback = false;

        if let Some(previous) = self.previous.clone() {
            info!("Rolling back to user defined endpoint {}", previous);
            self.select_endpoint(&previous, false).await;
        }
    }

    /// Persist `id` as the user's preference and switch to it.
    pub async fn select_preferred(&mut self, id: &EndpointId) -> KeychainResult<()> {
        self.registry.set_preferred(id).await?;
        self.select_endpoint(id, false).await;
        Ok(())
    }

    /// Resolve the `DEFAULT` sentinel to a URL.
    pub async fn resolve_default(&self) -> String {
        match self.discovery.recommended_endpoint().await {
            Ok(url) => {
                debug!("Using {} as default", url);
                url
            }
            Err(e) => {
                warn!("{}; using {} as default", e, self.fallback_url);
                self.fallback_url.clone()
            }
        }
    }

    async fn apply(&self, target: &EndpointId) {
        let url = match target {
            // Test network support is a placeholder: the client is left as is.
            EndpointId::Testnet => return,
            EndpointId::Default => self.resolve_default().await,
            EndpointId::Url(url) => url.clone(),
        };
        self.client.apply_options(ClientOptions::extended(url));
    }
}
