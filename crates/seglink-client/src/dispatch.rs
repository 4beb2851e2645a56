//! Outbound requests.
//!
//! Each request gets a fresh id and the session token, is recorded as pending
//! under `activity.<id>`, and is then written to the socket. A watcher task
//! reports when the entry goes away.

use crate::ack::{Ack, AckTable, WatchSettings, watch_ack};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::store::StateStore;
use crate::transport::FrameWriter;
use seglink_core::{PendingRequest, Request, RequestId, SessionStore, get_cookie};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A request that has been written and is awaiting confirmation.
pub struct Dispatch {
    id: String,
    cancel: CancellationToken,
    outcome: JoinHandle<ClientResult<Ack>>,
}

impl Dispatch {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stop watching and drop the pending entry.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the request to be confirmed, time out, or be cancelled.
    ///
    /// A panic in the watcher is resumed on the caller.
    pub async fn confirmed(self) -> ClientResult<Ack> {
        match self.outcome.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(ClientError::cancelled(self.id)),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    store: StateStore,
    session: Arc<dyn SessionStore>,
    acks: Arc<AckTable>,
    session_cookie: String,
    request_id_length: usize,
    poll_interval: Duration,
    ack_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(store: StateStore, session: Arc<dyn SessionStore>, config: &ClientConfig) -> Self {
        Self {
            store,
            session,
            acks: Arc::new(AckTable::default()),
            session_cookie: config.session_cookie.clone(),
            request_id_length: config.request_id_length,
            poll_interval: config.poll_interval(),
            ack_timeout: config.ack_timeout(),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub(crate) fn acks(&self) -> &AckTable {
        &self.acks
    }

    /// Requests written but not yet confirmed, timed out, or cancelled.
    pub fn in_flight(&self) -> usize {
        self.acks.len()
    }

    /// Stamp, record and write `request`, then start watching for delivery.
    pub fn send(&self, writer: &FrameWriter, request: Request) -> ClientResult<Dispatch> {
        if !self.store.is_connected() {
            tracing::error!("Not connected to websocket");
            return Err(ClientError::NotConnected);
        }

        let id = RequestId::generate(self.request_id_length).to_string();
        let label = request.describe();
        tracing::debug!("{} attempting to send message..", id);

        let sessionid = get_cookie(self.session.as_ref(), &self.session_cookie).unwrap_or_else(|| {
            tracing::warn!("No {} cookie available, sending empty session", self.session_cookie);
            String::new()
        });

        let pending = PendingRequest::for_request(&request);
        let text = serde_json::to_string(&request.into_outbound(id.clone(), sessionid))?;

        // Recorded before the write so an immediate echo finds it.
        self.store.update(|s| s.insert_activity(&id, &pending));
        self.acks.track(&id);

        if let Err(e) = writer.send_text(text) {
            self.store.update(|s| s.remove_activity(&id));
            self.acks.finish(&id);
            tracing::error!("{}:{} write failed: {}", id, label, e);
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let outcome = tokio::spawn(watch_ack(
            self.store.clone(),
            self.acks.clone(),
            id.clone(),
            label,
            WatchSettings {
                poll_interval: self.poll_interval,
                timeout: self.ack_timeout,
            },
            cancel.clone(),
        ));

        Ok(Dispatch {
            id,
            cancel,
            outcome,
        })
    }
}
