//! The connection client: one state mirror, one dispatcher, one socket at a
//! time.

use crate::config::ClientConfig;
use crate::dispatch::{Dispatch, Dispatcher};
use crate::error::ClientResult;
use crate::store::StateStore;
use crate::transport::{self, ClientEvent, ConnectionHandle};
use seglink_core::{ClientState, Request, SessionStore};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const EVENT_CAPACITY: usize = 64;

pub struct Client {
    config: ClientConfig,
    dispatcher: Dispatcher,
    events: broadcast::Sender<ClientEvent>,
}

impl Client {
    pub fn new(config: ClientConfig, session: impl SessionStore + 'static) -> Self {
        Self::with_store(config, session, StateStore::new())
    }

    /// Use an existing store, e.g. one the UI layer already subscribes to.
    pub fn with_store(
        config: ClientConfig,
        session: impl SessionStore + 'static,
        store: StateStore,
    ) -> Self {
        let dispatcher = Dispatcher::new(store, Arc::new(session), &config);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            dispatcher,
            events,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        self.dispatcher.store()
    }

    pub fn state(&self) -> ClientState {
        self.store().snapshot()
    }

    /// Notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.store().subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Connect to the configured address.
    pub async fn connect(&self) -> ClientResult<ConnectionHandle> {
        self.connect_to(&self.config.address).await
    }

    pub async fn connect_to(&self, address: &str) -> ClientResult<ConnectionHandle> {
        transport::connect(address, self.dispatcher.clone(), self.events.clone()).await
    }

    pub fn send(&self, handle: &ConnectionHandle, request: Request) -> ClientResult<Dispatch> {
        self.dispatcher.send(handle.writer(), request)
    }

    pub fn send_category(
        &self,
        handle: &ConnectionHandle,
        category: &str,
        payload: Value,
    ) -> ClientResult<Dispatch> {
        self.send(handle, Request::new(category, payload))
    }
}
