//! WebSocket client for seglink.
//!
//! Opens one connection, mirrors server snapshots into a [`ClientState`] and
//! tracks delivery of every request it sends.
//!
//! ```no_run
//! # async fn run() -> seglink_client::ClientResult<()> {
//! use seglink_client::{Client, ClientConfig};
//! use seglink_core::CookieJar;
//! use serde_json::json;
//!
//! let client = Client::new(ClientConfig::default(), CookieJar::with_session("token"));
//! let conn = client.connect().await?;
//! let dispatch = client.send_category(&conn, "system", json!({"module": "power", "action": "restart"}))?;
//! let ack = dispatch.confirmed().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`ClientState`]: seglink_core::ClientState

mod ack;
mod client;
mod config;
mod dispatch;
mod error;
mod store;
mod transport;

pub use ack::Ack;
pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use dispatch::{Dispatch, Dispatcher};
pub use error::{ClientError, ClientResult};
pub use store::StateStore;
pub use transport::{
    ClientEvent, ConnectionEvent, ConnectionHandle, FrameWriter, connect, disconnect,
};
