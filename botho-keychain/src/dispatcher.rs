//! Page-side request dispatcher.
//!
//! Every outgoing request gets a fresh [`CorrelationId`] and its callback is
//! parked in the pending map under that id. Responses come back through
//! [`RequestDispatcher::handle_message`] in any order; the callback whose id
//! matches is removed from the map and invoked exactly once.
//!
//! ## Trust boundary
//!
//! The handler faces untrusted pages, so it never reports anything about the
//! messages it drops:
//! - messages from another context are ignored outright
//! - responses for unknown, stale or already-resolved ids are dropped
//! - malformed payloads are dropped
//!
//! Only `trace!` events are emitted, and never with page-supplied content.

use crate::{
    boundary::{BoundaryMessage, MessageSource, PageChannel},
    config::KeychainConfig,
    error::{KeychainError, KeychainResult},
    handshake::HandshakeSlot,
    request::{CorrelationId, KeychainRequest, RequestEnvelope},
    response::KeychainResponse,
};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};
use tokio::sync::oneshot;
use tracing::trace;

/// Continuation invoked with the response to one request.
pub type ResponseCallback = Box<dyn FnOnce(KeychainResponse) + Send>;

struct PendingRequest {
    callback: ResponseCallback,
    dispatched_at: Instant,
}

struct DispatcherState {
    /// Next id to hand out; ids are never reused
    next_id: u64,
    pending: HashMap<CorrelationId, PendingRequest>,
}

/// Issues typed requests across the page boundary and routes responses back
/// to their callers.
pub struct RequestDispatcher<C> {
    pub(crate) channel: C,
    pub(crate) handshake_channel: String,
    pub(crate) handshake: HandshakeSlot,
    request_channel: String,
    response_type: String,
    handshake_type: String,
    pub(crate) request_timeout: Option<Duration>,
    state: Mutex<DispatcherState>,
}

impl<C: PageChannel> RequestDispatcher<C> {
    /// Create a dispatcher emitting on `channel`.
    pub fn new(channel: C, config: &KeychainConfig) -> Self {
        Self {
            channel,
            handshake_channel: config.boundary.handshake_channel.clone(),
            handshake: HandshakeSlot::default(),
            request_channel: config.boundary.request_channel.clone(),
            response_type: config.boundary.response_type(),
            handshake_type: config.boundary.handshake_type(),
            request_timeout: config.dispatcher.request_timeout(),
            state: Mutex::new(DispatcherState {
                next_id: 1,
                pending: HashMap::new(),
            }),
        }
    }

    /// Send `request` across the boundary; `callback` runs once its response
    /// arrives.
    ///
    /// Returns as soon as the envelope is emitted. If emitting fails the
    /// callback is discarded, but its id stays consumed.
    pub fn dispatch<F>(&self, request: KeychainRequest, callback: F) -> KeychainResult<CorrelationId>
    where
        F: FnOnce(KeychainResponse) + Send + 'static,
    {
        let id = {
            let mut state = self.state.lock().unwrap();
            let id = CorrelationId(state.next_id);
            state.next_id += 1;
            state.pending.insert(
                id,
                PendingRequest {
                    callback: Box::new(callback),
                    dispatched_at: Instant::now(),
                },
            );
            id
        };

        let emitted = serde_json::to_value(RequestEnvelope::new(id, request))
            .map_err(KeychainError::from)
            .and_then(|payload| self.channel.emit(&self.request_channel, payload));

        if let Err(e) = emitted {
            self.cancel(id);
            return Err(e);
        }

        trace!(%id, "request dispatched");
        Ok(id)
    }

    /// Dispatch `request` and wait for its response.
    ///
    /// Without a configured timeout this waits for as long as the privileged
    /// side takes to answer.
    pub async fn request(&self, request: KeychainRequest) -> KeychainResult<KeychainResponse> {
        let (tx, rx) = oneshot::channel();
        let id = self.dispatch(request, move |response| {
            let _ = tx.send(response);
        })?;

        match self.request_timeout {
            None => rx.await.map_err(|_| KeychainError::ChannelClosed),
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(result) => result.map_err(|_| KeychainError::ChannelClosed),
                Err(_) => {
                    self.cancel(id);
                    Err(KeychainError::Timeout)
                }
            },
        }
    }

    /// Handle a message posted to the page.
    pub fn handle_message(&self, message: &BoundaryMessage) {
        if message.source != MessageSource::SameContext {
            return;
        }

        let Some(kind) = message.data.get("type").and_then(Value::as_str) else {
            return;
        };

        if kind == self.response_type {
            if let Some(response) = message.data.get("response") {
                self.resolve(response);
            }
        } else if kind == self.handshake_type {
            self.handshake.fire();
        }
    }

    fn resolve(&self, response: &Value) {
        let Some(id) = response
            .get("request_id")
            .and_then(Value::as_u64)
            .map(CorrelationId)
        else {
            trace!("dropping response without an id");
            return;
        };

        let pending = self.state.lock().unwrap().pending.remove(&id);

        match pending {
            // The lock is released before the callback runs so that it may
            // dispatch again.
            Some(pending) => {
                (pending.callback)(KeychainResponse::from_payload(id, response.clone()))
            }
            None => trace!("dropping response without a pending request"),
        }
    }

    /// Withdraw a pending request. Its callback is dropped without being
    /// called.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        let removed = self.state.lock().unwrap().pending.remove(&id);
        removed.is_some()
    }

    /// Drop every pending request older than the configured timeout.
    ///
    /// Does nothing when no timeout is configured.
    pub fn prune_expired(&self) -> Vec<CorrelationId> {
        let Some(timeout) = self.request_timeout else {
            return Vec::new();
        };

        let expired: Vec<(CorrelationId, PendingRequest)> = {
            let mut state = self.state.lock().unwrap();
            let ids: Vec<CorrelationId> = state
                .pending
                .iter()
                .filter(|(_, pending)| pending.dispatched_at.elapsed() >= timeout)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| state.pending.remove(&id).map(|pending| (id, pending)))
                .collect()
        };

        expired.into_iter().map(|(id, _)| id).collect()
    }

    /// Number of requests still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Whether `id` is still waiting for a response.
    pub fn is_pending(&self, id: CorrelationId) -> bool {
        self.state.lock().unwrap().pending.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{boundary::event_channel, config::KeychainConfigBuilder};
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn vote() -> KeychainRequest {
        KeychainRequest::vote("alice", "post", "bob", 100).unwrap()
    }

    fn response_for(id: u64) -> BoundaryMessage {
        BoundaryMessage::same_context(json!({
            "type": "botho_keychain_response",
            "response": { "request_id": id, "success": true, "result": id },
        }))
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let (sender, mut rx) = event_channel();
        let dispatcher = RequestDispatcher::new(sender, &KeychainConfig::default());

        let first = dispatcher.dispatch(vote(), |_| {}).unwrap();
        let second = dispatcher.dispatch(vote(), |_| {}).unwrap();
        assert_eq!(first, CorrelationId(1));
        assert_eq!(second, CorrelationId(2));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.channel, "swRequest_botho");
        assert_eq!(event.payload["request_id"], 1);
        assert_eq!(event.payload["type"], "vote");
    }

    #[test]
    fn test_response_invokes_callback_once() {
        let (sender, _rx) = event_channel();
        let dispatcher = RequestDispatcher::new(sender, &KeychainConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let id = dispatcher
            .dispatch(vote(), move |response| {
                assert_eq!(response.result, Some(json!(1)));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        dispatcher.handle_message(&response_for(id.0));
        dispatcher.handle_message(&response_for(id.0));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[test]
    fn test_unknown_id_is_dropped() {
        let (sender, _rx) = event_channel();
        let dispatcher = RequestDispatcher::new(sender, &KeychainConfig::default());
        dispatcher.dispatch(vote(), |_| panic!("wrong callback")).unwrap();

        dispatcher.handle_message(&response_for(42));
        assert_eq!(dispatcher.pending_count(), 1);
    }

    #[test]
    fn test_foreign_source_is_ignored() {
        let (sender, _rx) = event_channel();
        let dispatcher = RequestDispatcher::new(sender, &KeychainConfig::default());
        let id = dispatcher.dispatch(vote(), |_| panic!("foreign response")).unwrap();

        let mut message = response_for(id.0);
        message.source = MessageSource::Foreign("https://evil.example".to_string());
        dispatcher.handle_message(&message);

        assert!(dispatcher.is_pending(id));
    }

    #[test]
    fn test_other_message_types_are_ignored() {
        let (sender, _rx) = event_channel();
        let dispatcher = RequestDispatcher::new(sender, &KeychainConfig::default());
        let id = dispatcher.dispatch(vote(), |_| panic!("unexpected")).unwrap();

        dispatcher.handle_message(&BoundaryMessage::same_context(json!({
            "type": "other_keychain_response",
            "response": { "request_id": id.0 },
        })));
        dispatcher.handle_message(&BoundaryMessage::same_context(json!("not an object")));
        dispatcher.handle_message(&BoundaryMessage::same_context(json!({
            "type": "botho_keychain_response",
            "response": { "request_id": "one" },
        })));

        assert!(dispatcher.is_pending(id));
    }

    #[test]
    fn test_matched_response_with_odd_fields_is_delivered() {
        let (sender, _rx) = event_channel();
        let dispatcher = RequestDispatcher::new(sender, &KeychainConfig::default());
        let payloads = [
            json!({ "request_id": 1, "success": false, "message": { "code": 5 } }),
            json!({ "request_id": 2, "success": null }),
            json!({ "request_id": 3, "success": true, "message": 42 }),
        ];
        let calls = Arc::new(AtomicUsize::new(0));

        for payload in payloads {
            let counter = calls.clone();
            dispatcher
                .dispatch(vote(), move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            dispatcher.handle_message(&BoundaryMessage::same_context(json!({
                "type": "botho_keychain_response",
                "response": payload,
            })));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[test]
    fn test_callback_may_dispatch_again() {
        let (sender, _rx) = event_channel();
        let dispatcher = Arc::new(RequestDispatcher::new(sender, &KeychainConfig::default()));

        let inner = dispatcher.clone();
        let id = dispatcher
            .dispatch(vote(), move |_| {
                inner.dispatch(vote(), |_| {}).unwrap();
            })
            .unwrap();

        dispatcher.handle_message(&response_for(id.0));
        assert!(dispatcher.is_pending(CorrelationId(2)));
    }

    #[test]
    fn test_failed_emit_consumes_id() {
        let (sender, rx) = event_channel();
        drop(rx);
        let dispatcher = RequestDispatcher::new(sender, &KeychainConfig::default());

        assert!(matches!(
            dispatcher.dispatch(vote(), |_| {}),
            Err(KeychainError::ChannelClosed)
        ));
        assert_eq!(dispatcher.pending_count(), 0);
        assert_eq!(dispatcher.state.lock().unwrap().next_id, 2);
    }

    #[test]
    fn test_prune_without_timeout_keeps_everything() {
        let (sender, _rx) = event_channel();
        let dispatcher = RequestDispatcher::new(sender, &KeychainConfig::default());
        dispatcher.dispatch(vote(), |_| {}).unwrap();

        assert!(dispatcher.prune_expired().is_empty());
        assert_eq!(dispatcher.pending_count(), 1);
    }

    #[test]
    fn test_prune_with_zero_timeout() {
        let (sender, _rx) = event_channel();
        let config = KeychainConfigBuilder::new().request_timeout_secs(0).build();
        let dispatcher = RequestDispatcher::new(sender, &config);
        let id = dispatcher.dispatch(vote(), |_| {}).unwrap();

        assert_eq!(dispatcher.prune_expired(), vec![id]);
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_request_resolves_from_response() {
        let (sender, mut rx) = event_channel();
        let dispatcher = Arc::new(RequestDispatcher::new(sender, &KeychainConfig::default()));

        let responder = dispatcher.clone();
        tokio::spawn(async move {
            let event = rx.recv().await.unwrap();
            let id = event.payload["request_id"].as_u64().unwrap();
            responder.handle_message(&response_for(id));
        });

        let response = dispatcher.request(vote()).await.unwrap();
        assert_eq!(response.request_id, CorrelationId(1));
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let (sender, _rx) = event_channel();
        let config = KeychainConfigBuilder::new().request_timeout_secs(1).build();
        let dispatcher = RequestDispatcher::new(sender, &config);

        let result = dispatcher.request(vote()).await;

        assert!(matches!(result, Err(KeychainError::Timeout)));
        assert_eq!(dispatcher.pending_count(), 0);
    }
}
