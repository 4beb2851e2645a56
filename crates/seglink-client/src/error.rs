//! Error types for the seglink client.

use crate::config::ConfigError;
use seglink_core::SnapshotError;
use std::time::Duration;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A send was attempted while `metadata.connected` is false.
    #[error("Not connected to websocket")]
    NotConnected,

    /// The request was still pending when its deadline passed.
    #[error("Request {id} not confirmed after {after:?}")]
    Timeout { id: String, after: Duration },

    /// The caller gave up on the request.
    #[error("Request {id} cancelled")]
    Cancelled { id: String },

    /// WebSocket open or I/O failure.
    #[error("WebSocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Outbound serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An inbound frame could not be applied.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The write side of the connection is gone.
    #[error("Connection closed")]
    Closed,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    pub fn timeout(id: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            id: id.into(),
            after,
        }
    }

    pub fn cancelled(id: impl Into<String>) -> Self {
        Self::Cancelled { id: id.into() }
    }
}
