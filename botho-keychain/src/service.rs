//! Privileged request service.
//!
//! Receives envelopes emitted by pages, applies an optional per-request
//! endpoint override, runs the request through the signing service and posts
//! the tagged response back. The override is always rolled back once the
//! response is built.

use crate::{
    boundary::{handshake_message, response_message, BoundaryEvent, PrivilegedChannel},
    config::BoundaryConfig,
    endpoint::{
        discovery::DiscoveryService, session::EndpointSession, store::KeyValueStore, EndpointId,
    },
    error::KeychainResult,
    master_key::MasterKey,
    network::NetworkClient,
    request::{CorrelationId, KeychainRequest, RequestEnvelope},
    response::KeychainResponse,
    transfer_validator::{TransferValidator, TransferWarning},
};
use serde_json::{json, Value};
use std::{future::Future, sync::Arc};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Successful outcome of a signing operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningOutcome {
    pub result: Value,
    pub message: String,
}

/// Failed outcome of a signing operation, forwarded to the page as data.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningFailure {
    pub error: Value,
    pub message: String,
}

/// Performs the cryptographic part of a request against an endpoint.
pub trait SigningService: Send + Sync {
    fn execute(
        &self,
        request: &KeychainRequest,
        endpoint: &EndpointId,
    ) -> impl Future<Output = Result<SigningOutcome, SigningFailure>> + Send;
}

/// Privileged side of the boundary.
pub struct KeychainService<S, D, N, G, P> {
    session: Mutex<EndpointSession<S, D, N>>,
    signer: G,
    master_key: Arc<MasterKey>,
    channel: P,
    boundary: BoundaryConfig,
    validator: Option<TransferValidator>,
}

impl<S, D, N, G, P> KeychainService<S, D, N, G, P>
where
    S: KeyValueStore,
    D: DiscoveryService,
    N: NetworkClient,
    G: SigningService,
    P: PrivilegedChannel,
{
    pub fn new(
        session: EndpointSession<S, D, N>,
        signer: G,
        master_key: Arc<MasterKey>,
        channel: P,
        boundary: BoundaryConfig,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            signer,
            master_key,
            channel,
            boundary,
            validator: None,
        }
    }

    /// Attach advisory warnings to transfer responses.
    pub fn with_transfer_validator(mut self, validator: TransferValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn master_key(&self) -> &Arc<MasterKey> {
        &self.master_key
    }

    pub fn session(&self) -> &Mutex<EndpointSession<S, D, N>> {
        &self.session
    }

    /// Route a raw event emitted by a page.
    pub async fn handle_event(&self, event: BoundaryEvent) -> KeychainResult<()> {
        if event.channel == self.boundary.handshake_channel {
            return self.handle_handshake();
        }
        if event.channel != self.boundary.request_channel {
            debug!("Ignoring event on unknown channel {}", event.channel);
            return Ok(());
        }

        match serde_json::from_value::<RequestEnvelope>(event.payload.clone()) {
            Ok(envelope) => self.handle_envelope(envelope).await,
            Err(e) => self.reject_malformed(event.payload, e),
        }
    }

    /// Answer an unparseable request when its id can still be read, so the
    /// page callback is not left waiting.
    fn reject_malformed(&self, payload: Value, error: serde_json::Error) -> KeychainResult<()> {
        let Some(id) = payload.get("request_id").and_then(Value::as_u64) else {
            debug!("Dropping malformed request without id: {}", error);
            return Ok(());
        };
        debug!("Rejecting malformed request {}: {}", id, error);
        let response = KeychainResponse::failure(
            CorrelationId(id),
            json!("invalid request"),
            error.to_string(),
        )
        .with_data(payload);
        self.channel.post(response_message(&self.boundary, &response)?)
    }

    /// Acknowledge a handshake probe.
    pub fn handle_handshake(&self) -> KeychainResult<()> {
        self.channel.post(handshake_message(&self.boundary))
    }

    /// Answer a single request.
    pub async fn handle_envelope(&self, envelope: RequestEnvelope) -> KeychainResult<()> {
        let response = self.respond(&envelope).await;
        let message = response_message(&self.boundary, &response)?;
        self.channel.post(message)
    }

    /// Process events until the page side goes away.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<BoundaryEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle_event(event).await {
                warn!("Failed to answer request: {}", e);
            }
        }
        debug!("Page channel closed");
    }

    async fn respond(&self, envelope: &RequestEnvelope) -> KeychainResponse {
        let request_id = envelope.request_id;
        let request = &envelope.request;
        let data = serde_json::to_value(envelope).unwrap_or(Value::Null);

        let mut session = self.session.lock().await;
        if let Some(rpc) = request.rpc() {
            session.select_endpoint(&EndpointId::from(rpc), true).await;
        }

        let response = if !self.master_key.is_unlocked() {
            debug!(
                "Rejecting {} request {}: keychain locked",
                request.kind(),
                request_id
            );
            KeychainResponse::failure(request_id, json!("locked"), "The keychain is locked")
        } else {
            match self.signer.execute(request, session.current()).await {
                Ok(outcome) => {
                    KeychainResponse::success(request_id, outcome.result, outcome.message)
                }
                Err(failure) => {
                    KeychainResponse::failure(request_id, failure.error, failure.message)
                }
            }
        };

        session.rollback().await;
        drop(session);

        let mut response = response.with_data(data);
        if let Some(warning) = self.transfer_warning(request) {
            response
                .extra
                .insert("warning".to_string(), Value::String(warning.to_string()));
        }
        response
    }

    fn transfer_warning(&self, request: &KeychainRequest) -> Option<TransferWarning> {
        let validator = self.validator.as_ref()?;
        match request {
            KeychainRequest::Transfer {
                to, currency, memo, ..
            } => validator.validate(to, currency, !memo.is_empty()),
            _ => None,
        }
    }
}
