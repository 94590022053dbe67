//! Botho Keychain
//!
//! Bridges signing and broadcast requests from untrusted web pages into a
//! privileged context that holds the account keys.
//!
//! ## Components
//!
//! - [`dispatcher`]: page-facing API. Every request gets a fresh correlation
//!   id and exactly one matching response, in any arrival order
//! - [`handshake`]: single-slot presence probe
//! - [`endpoint`]: endpoint registry, discovery and the session applying the
//!   selected endpoint to the network client
//! - [`idle`]: clears the master key when the system goes idle or locks
//! - [`service`]: privileged side answering requests
//!
//! ## Security Model
//!
//! - Only messages posted by the page's own context are trusted
//! - Unknown, stale or replayed response ids are dropped silently
//! - Nothing crosses the boundary as an error; failures travel as response
//!   data

pub mod boundary;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod handshake;
pub mod idle;
pub mod master_key;
pub mod network;
pub mod request;
pub mod response;
pub mod service;
pub mod transfer_validator;

pub use config::{KeychainConfig, KeychainConfigBuilder};
pub use dispatcher::RequestDispatcher;
pub use endpoint::{EndpointId, EndpointRegistry, EndpointSession};
pub use error::{KeychainError, KeychainResult};
pub use idle::{IdleMonitor, IdlePolicy, LockMode};
pub use master_key::MasterKey;
pub use request::{CorrelationId, KeychainRequest, RequestEnvelope};
pub use response::KeychainResponse;
pub use service::{KeychainService, SigningService};
pub use transfer_validator::{TransferValidator, TransferWarning};
