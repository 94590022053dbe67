//! The trust boundary between page scripts and the privileged context.
//!
//! Pages emit named events ([`BoundaryEvent`]) towards the privileged side;
//! the privileged side posts messages ([`BoundaryMessage`]) back through the
//! page's cross-context messaging primitive. Both directions carry plain JSON.
//! The channel-backed implementations here connect the two halves inside one
//! process.

use crate::{
    config::BoundaryConfig,
    error::{KeychainError, KeychainResult},
    response::KeychainResponse,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Where a message delivered to the page came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSource {
    /// Posted by the same context the page script runs in
    SameContext,
    /// Posted by another window or frame
    Foreign(String),
}

/// A message delivered to the page.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryMessage {
    pub source: MessageSource,
    pub data: Value,
}

impl BoundaryMessage {
    pub fn same_context(data: Value) -> Self {
        Self {
            source: MessageSource::SameContext,
            data,
        }
    }
}

/// A named event emitted by the page towards the privileged side.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryEvent {
    pub channel: String,
    pub payload: Value,
}

/// Page-to-privileged direction.
pub trait PageChannel: Send + Sync {
    fn emit(&self, channel: &str, payload: Value) -> KeychainResult<()>;
}

/// Privileged-to-page direction.
pub trait PrivilegedChannel: Send + Sync {
    fn post(&self, message: Value) -> KeychainResult<()>;
}

/// Build the message announcing a response to the page.
pub fn response_message(boundary: &BoundaryConfig, response: &KeychainResponse) -> KeychainResult<Value> {
    Ok(json!({
        "type": boundary.response_type(),
        "response": serde_json::to_value(response)?,
    }))
}

/// Build the message acknowledging a handshake.
pub fn handshake_message(boundary: &BoundaryConfig) -> Value {
    json!({ "type": boundary.handshake_type() })
}

/// [`PageChannel`] feeding an in-process event queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<BoundaryEvent>,
}

impl PageChannel for EventSender {
    fn emit(&self, channel: &str, payload: Value) -> KeychainResult<()> {
        self.tx
            .send(BoundaryEvent {
                channel: channel.to_string(),
                payload,
            })
            .map_err(|_| KeychainError::ChannelClosed)
    }
}

/// Create a page-to-privileged event queue.
pub fn event_channel() -> (EventSender, mpsc::UnboundedReceiver<BoundaryEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

/// [`PrivilegedChannel`] posting into an in-process page message queue.
#[derive(Debug, Clone)]
pub struct MessagePoster {
    tx: mpsc::UnboundedSender<BoundaryMessage>,
}

impl PrivilegedChannel for MessagePoster {
    fn post(&self, message: Value) -> KeychainResult<()> {
        self.tx
            .send(BoundaryMessage::same_context(message))
            .map_err(|_| KeychainError::ChannelClosed)
    }
}

/// Create a privileged-to-page message queue.
pub fn message_channel() -> (MessagePoster, mpsc::UnboundedReceiver<BoundaryMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MessagePoster { tx }, rx)
}
