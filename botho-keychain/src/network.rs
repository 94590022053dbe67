//! Network client used by the privileged side.
//!
//! The endpoint session reconfigures the client through [`NetworkClient`];
//! [`JsonRpcClient`] is the HTTP implementation talking to Botho nodes.

use crate::error::{KeychainError, KeychainResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
    time::Duration,
};
use tracing::debug;

/// Timeout for RPC requests
const RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Options applied to the network client when an endpoint is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub url: String,
    /// Call node methods directly instead of through the legacy `call`
    /// wrapper
    pub extended_api: bool,
}

impl ClientOptions {
    pub fn extended(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extended_api: true,
        }
    }
}

/// A client whose target endpoint can be switched at runtime.
pub trait NetworkClient: Send + Sync {
    fn apply_options(&self, options: ClientOptions);
}

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

/// JSON-RPC client for Botho nodes.
#[derive(Debug)]
pub struct JsonRpcClient {
    client: reqwest::Client,
    options: RwLock<ClientOptions>,
}

impl JsonRpcClient {
    pub fn new(initial_url: impl Into<String>) -> KeychainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .map_err(|e| KeychainError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            options: RwLock::new(ClientOptions::extended(initial_url)),
        })
    }

    /// Options currently in force.
    pub fn options(&self) -> ClientOptions {
        self.options.read().unwrap().clone()
    }

    /// Call `method` on the current endpoint.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> KeychainResult<T> {
        let options = self.options();
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);

        let request = if options.extended_api {
            JsonRpcRequest {
                jsonrpc: "2.0",
                method: method.to_string(),
                params,
                id,
            }
        } else {
            JsonRpcRequest {
                jsonrpc: "2.0",
                method: "call".to_string(),
                params: json!(["node_api", method, params]),
                id,
            }
        };

        let response = self.client.post(&options.url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(KeychainError::Network(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let json_response: JsonRpcResponse<T> = response.json().await?;

        if let Some(error) = json_response.error {
            return Err(KeychainError::Network(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        json_response
            .result
            .ok_or_else(|| KeychainError::Network("Missing result in RPC response".to_string()))
    }

    /// Get node status
    pub async fn node_status(&self) -> KeychainResult<NodeStatus> {
        self.call("node_getStatus", json!({})).await
    }
}

impl NetworkClient for JsonRpcClient {
    fn apply_options(&self, options: ClientOptions) {
        debug!("Network client now targets {}", options.url);
        *self.options.write().unwrap() = options;
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NodeStatus {
    pub version: String,
    pub network: String,
    pub sync_status: String,
    pub chain_height: u64,
    pub peer_count: usize,
}
