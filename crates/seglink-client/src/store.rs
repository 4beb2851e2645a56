//! Observable owner of the [`ClientState`] mirror.
//!
//! Mutations go through `watch::Sender::send_modify`, so they never overlap and
//! every subscriber sees each change.
//!
//! Each opened connection takes a new generation number. Only the connection
//! holding the latest generation may mark the mirror disconnected, so an old
//! handle winding down cannot clobber a newer one.

use seglink_core::{ClientState, SnapshotError};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

#[derive(Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<ClientState>>,
    generation: Arc<AtomicU64>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_state(ClientState::new())
    }

    pub fn with_state(state: ClientState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Receive a notification after every change.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.tx.subscribe()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> ClientState {
        self.tx.borrow().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&ClientState) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Mutate the state and notify subscribers.
    pub fn update<R>(&self, f: impl FnOnce(&mut ClientState) -> R) -> R {
        let mut result = None;
        self.tx.send_modify(|state| result = Some(f(state)));
        result.unwrap_or_else(|| unreachable!("send_modify always runs its closure"))
    }

    /// Parse and merge one inbound frame, then run `after` on the merged state
    /// with the parsed snapshot. Subscribers are not woken when parsing fails.
    pub fn apply_frame<R>(
        &self,
        text: &str,
        after: impl FnOnce(&mut ClientState, &Value) -> R,
    ) -> Result<R, SnapshotError> {
        let mut outcome = None;
        self.tx.send_if_modified(|state| match state.apply_snapshot(text) {
            Ok(snapshot) => {
                outcome = Some(Ok(after(state, &snapshot)));
                true
            }
            Err(e) => {
                outcome = Some(Err(e));
                false
            }
        });
        outcome.unwrap_or_else(|| unreachable!("send_if_modified always runs its closure"))
    }

    /// Mark the mirror connected to `address` and return the new generation.
    pub(crate) fn open_connection(&self, address: &str) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            state.set_connected(true);
            state.set_address(address);
        });
        generation
    }

    /// Mark the mirror disconnected if `generation` is still the latest
    /// connection. Returns whether it was.
    pub(crate) fn close_connection(&self, generation: u64) -> bool {
        let mut current = false;
        self.tx.send_if_modified(|state| {
            current = self.generation.load(Ordering::SeqCst) == generation;
            if !current || !state.is_connected() {
                return false;
            }
            state.set_connected(false);
            true
        });
        current
    }

    pub fn is_connected(&self) -> bool {
        self.read(ClientState::is_connected)
    }

    pub fn has_activity(&self, id: &str) -> bool {
        self.read(|s| s.has_activity(id))
    }
}
