//! Core types for seglink.
//!
//! This crate holds everything that does not touch the network: the state
//! mirror and its deep merge, the outbound wire format, request ids and the
//! session cookie lookup. The `seglink-client` crate drives them over a
//! WebSocket.

mod merge;
mod message;
mod request_id;
mod session;
mod state;

pub use merge::{merge, merge_map};
pub use message::{ActivityResponse, OutboundMessage, PING_CATEGORY, PendingRequest, Request};
pub use request_id::{DEFAULT_REQUEST_ID_LENGTH, RequestId, RequestIdParseError, gen_request_id};
pub use session::{CookieJar, SESSION_COOKIE, SessionStore, get_cookie};
pub use state::{ACTIVITY, ClientState, METADATA, SYSTEM, SnapshotError, URBITS};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Stream open, handshake sent.
    Connected,
    /// Never opened, closed, or failed.
    #[default]
    Disconnected,
}

impl ConnectionState {
    pub fn from_flag(connected: bool) -> Self {
        if connected {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl ClientState {
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_flag(self.is_connected())
    }
}
