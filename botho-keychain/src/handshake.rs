//! Handshake probe confirming the privileged side is installed and reachable.
//!
//! The handshake uses a single callback slot instead of the id map. A new
//! request overwrites the slot, and firing does not clear it: every
//! acknowledgement from the privileged side runs the stored callback again.

use crate::{
    boundary::PageChannel,
    dispatcher::RequestDispatcher,
    error::{KeychainError, KeychainResult},
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::trace;

type HandshakeCallback = Arc<dyn Fn() + Send + Sync>;

/// Single-slot holder for the page's handshake callback.
#[derive(Default)]
pub struct HandshakeSlot {
    callback: Mutex<Option<HandshakeCallback>>,
}

impl HandshakeSlot {
    /// Store `callback`, replacing any previous one.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Run the stored callback, if any. Returns whether one ran.
    pub fn fire(&self) -> bool {
        let callback = self.callback.lock().unwrap().clone();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.callback.lock().unwrap().is_some()
    }
}

impl<C: PageChannel> RequestDispatcher<C> {
    /// Probe the privileged side; `callback` runs when it acknowledges.
    pub fn request_handshake<F>(&self, callback: F) -> KeychainResult<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handshake.register(callback);
        self.channel
            .emit(&self.handshake_channel, Value::String(String::new()))?;
        trace!("handshake requested");
        Ok(())
    }

    /// Probe the privileged side and wait for the first acknowledgement,
    /// bounded by the configured request timeout.
    pub async fn handshake(&self) -> KeychainResult<()> {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        self.request_handshake(move || {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        })?;

        match self.request_timeout {
            None => rx.await.map_err(|_| KeychainError::ChannelClosed),
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(result) => result.map_err(|_| KeychainError::ChannelClosed),
                Err(_) => {
                    trace!("handshake timed out after {:?}", timeout);
                    Err(KeychainError::Timeout)
                }
            },
        }
    }
}
