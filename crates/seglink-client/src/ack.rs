//! Delivery tracking for dispatched requests.
//!
//! A request is pending while `activity.<id>` exists in the state mirror. The
//! watcher only observes: whoever removes the entry completes the request.
//! The server normally does this by echoing `activity.<id>` with a status
//! code, which the inbound path turns into a removal (see [`settle_echoes`]).

use crate::error::{ClientError, ClientResult};
use crate::store::StateStore;
use seglink_core::{ACTIVITY, ActivityResponse, ClientState};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome of a confirmed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub id: String,
    /// The server's echo, when the removal came from one.
    pub response: Option<ActivityResponse>,
}

/// Correlation table: request id to the server response, once seen.
#[derive(Default)]
pub(crate) struct AckTable {
    slots: Mutex<HashMap<String, Option<ActivityResponse>>>,
}

impl AckTable {
    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<ActivityResponse>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn track(&self, id: &str) {
        self.slots().insert(id.to_string(), None);
    }

    pub(crate) fn is_tracked(&self, id: &str) -> bool {
        self.slots().contains_key(id)
    }

    pub(crate) fn record(&self, id: &str, response: ActivityResponse) {
        if let Some(slot) = self.slots().get_mut(id) {
            *slot = Some(response);
        }
    }

    pub(crate) fn finish(&self, id: &str) -> Option<ActivityResponse> {
        self.slots().remove(id).flatten()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots().len()
    }
}

/// After merging `snapshot`, remove every tracked request the server has
/// answered. Returns the ids settled.
pub(crate) fn settle_echoes(
    state: &mut ClientState,
    snapshot: &Value,
    table: &AckTable,
) -> Vec<String> {
    let Some(echoed) = snapshot.get(ACTIVITY).and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut settled = Vec::new();
    for id in echoed.keys() {
        if !table.is_tracked(id) {
            continue;
        }
        let Some(response) = state.activity_entry(id).and_then(ActivityResponse::from_entry)
        else {
            continue;
        };
        table.record(id, response);
        state.remove_activity(id);
        settled.push(id.clone());
    }
    settled
}

pub(crate) struct WatchSettings {
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
}

/// Poll `activity.<id>` until it disappears, the deadline passes, or `cancel`
/// fires. Timeout and cancellation remove the entry themselves.
pub(crate) async fn watch_ack(
    store: StateStore,
    table: Arc<AckTable>,
    id: String,
    label: String,
    settings: WatchSettings,
    cancel: CancellationToken,
) -> ClientResult<Ack> {
    let mut ticker = tokio::time::interval(settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let deadline = async {
        match settings.timeout {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let confirm = |id: String| -> ClientResult<Ack> {
        let response = table.finish(&id);
        tracing::info!("{}:{} send confirmed", id, label);
        Ok(Ack { id, response })
    };

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !store.has_activity(&id) {
                    return confirm(id);
                }
                tracing::debug!("{}:{} checking broadcast..", id, label);
            }
            _ = cancel.cancelled() => {
                if abandon(&store, &table, &id).is_none() {
                    return confirm(id);
                }
                tracing::info!("{}:{} cancelled", id, label);
                return Err(ClientError::cancelled(id));
            }
            _ = &mut deadline => {
                if abandon(&store, &table, &id).is_none() {
                    return confirm(id);
                }
                let after = settings.timeout.unwrap_or_default();
                tracing::warn!("{}:{} not confirmed after {:?}", id, label, after);
                return Err(ClientError::timeout(id, after));
            }
        }
    }
}

/// Drop a request that will not be confirmed. Returns `None` if it had
/// already left `activity`.
fn abandon(store: &StateStore, table: &AckTable, id: &str) -> Option<Value> {
    let removed = store.update(|s| s.remove_activity(id));
    if removed.is_some() {
        table.finish(id);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use seglink_core::{PendingRequest, Request};
    use serde_json::json;

    fn pending(store: &StateStore, table: &AckTable, id: &str) {
        let req = Request::new("system", json!({"module": "m", "action": "a"}));
        store.update(|s| s.insert_activity(id, &PendingRequest::for_request(&req)));
        table.track(id);
    }

    fn settings(timeout_ms: Option<u64>) -> WatchSettings {
        WatchSettings {
            poll_interval: Duration::from_millis(10),
            timeout: timeout_ms.map(Duration::from_millis),
        }
    }

    #[test]
    fn echo_settles_tracked_request() {
        let store = StateStore::new();
        let table = AckTable::default();
        pending(&store, &table, "abc");

        let echo = json!({"activity": {"abc": {"message": "done", "status_code": 200}}});
        let settled = store.update(|s| {
            s.apply_value(&echo).unwrap();
            settle_echoes(s, &echo, &table)
        });

        assert_eq!(settled, vec!["abc".to_string()]);
        assert!(!store.has_activity("abc"));
        let response = table.finish("abc").unwrap();
        assert_eq!(response.message, "done");
        assert_eq!(response.status_code, 200);
    }

    #[test]
    fn echo_for_unknown_id_stays_in_state() {
        let store = StateStore::new();
        let table = AckTable::default();

        let echo = json!({"activity": {"other": {"message": "x", "status_code": 200}}});
        let settled = store.update(|s| {
            s.apply_value(&echo).unwrap();
            settle_echoes(s, &echo, &table)
        });
        assert!(settled.is_empty());
        assert!(store.has_activity("other"));
    }

    #[test]
    fn echo_without_status_code_is_not_an_ack() {
        let store = StateStore::new();
        let table = AckTable::default();
        pending(&store, &table, "abc");

        let partial = json!({"activity": {"abc": {"progress": 0.5}}});
        let settled = store.update(|s| {
            s.apply_value(&partial).unwrap();
            settle_echoes(s, &partial, &table)
        });
        assert!(settled.is_empty());
        assert!(store.has_activity("abc"));
    }

    #[tokio::test]
    async fn removal_confirms() {
        let store = StateStore::new();
        let table = Arc::new(AckTable::default());
        pending(&store, &table, "r1");

        let watcher = tokio::spawn(watch_ack(
            store.clone(),
            table.clone(),
            "r1".into(),
            "system".into(),
            settings(None),
            CancellationToken::new(),
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!watcher.is_finished());

        store.update(|s| s.remove_activity("r1"));
        let ack = watcher.await.unwrap().unwrap();
        assert_eq!(ack, Ack { id: "r1".into(), response: None });
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn timeout_clears_entry() {
        let store = StateStore::new();
        let table = Arc::new(AckTable::default());
        pending(&store, &table, "slow");

        let result = watch_ack(
            store.clone(),
            table.clone(),
            "slow".into(),
            "system".into(),
            settings(Some(50)),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(ClientError::Timeout { ref id, .. }) if id == "slow"));
        assert!(!store.has_activity("slow"));
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn cancel_clears_entry() {
        let store = StateStore::new();
        let table = Arc::new(AckTable::default());
        pending(&store, &table, "c1");

        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(watch_ack(
            store.clone(),
            table.clone(),
            "c1".into(),
            "system".into(),
            settings(None),
            cancel.clone(),
        ));
        cancel.cancel();

        let result = watcher.await.unwrap();
        assert!(matches!(result, Err(ClientError::Cancelled { .. })));
        assert!(!store.has_activity("c1"));
    }
}
