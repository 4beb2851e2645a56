//! The client-side state mirror.
//!
//! A JSON object tree with four reserved namespaces:
//!
//! - `activity` - one entry per in-flight request, keyed by request id
//! - `metadata` - `address` and `connected`
//! - `urbits`, `system` - filled entirely by inbound snapshots
//!
//! Inbound frames may add further top-level namespaces; they are kept as-is.

use crate::merge::merge_map;
use crate::message::PendingRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const ACTIVITY: &str = "activity";
pub const METADATA: &str = "metadata";
pub const URBITS: &str = "urbits";
pub const SYSTEM: &str = "system";

/// Error applying an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("snapshot must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientState {
    root: Map<String, Value>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientState {
    pub fn new() -> Self {
        let mut root = Map::new();
        root.insert(ACTIVITY.into(), json!({}));
        root.insert(METADATA.into(), json!({"address": "", "connected": false}));
        root.insert(URBITS.into(), json!({}));
        root.insert(SYSTEM.into(), json!({}));
        Self { root }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// A top-level namespace, e.g. `state.get("system")`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Parse one inbound text frame and merge it. Returns the parsed snapshot.
    pub fn apply_snapshot(&mut self, text: &str) -> Result<Value, SnapshotError> {
        let value: Value = serde_json::from_str(text)?;
        self.apply_value(&value)?;
        Ok(value)
    }

    /// Merge an already-parsed snapshot.
    pub fn apply_value(&mut self, snapshot: &Value) -> Result<(), SnapshotError> {
        let Value::Object(source) = snapshot else {
            return Err(SnapshotError::NotAnObject(kind_of(snapshot)));
        };
        merge_map(&mut self.root, source);
        Ok(())
    }

    // ── metadata ────────────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        self.root
            .get(METADATA)
            .and_then(|m| m.get("connected"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn address(&self) -> &str {
        self.root
            .get(METADATA)
            .and_then(|m| m.get("address"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.namespace_mut(METADATA)
            .insert("connected".into(), Value::Bool(connected));
    }

    pub fn set_address(&mut self, address: &str) {
        self.namespace_mut(METADATA)
            .insert("address".into(), Value::String(address.to_string()));
    }

    // ── activity ────────────────────────────────────────────────────

    pub fn activity(&self) -> Option<&Map<String, Value>> {
        self.root.get(ACTIVITY).and_then(Value::as_object)
    }

    pub fn has_activity(&self, id: &str) -> bool {
        self.activity().is_some_and(|a| a.contains_key(id))
    }

    pub fn activity_entry(&self, id: &str) -> Option<&Value> {
        self.activity().and_then(|a| a.get(id))
    }

    pub fn activity_len(&self) -> usize {
        self.activity().map_or(0, Map::len)
    }

    /// Record a request as pending under `activity.<id>`.
    pub fn insert_activity(&mut self, id: &str, pending: &PendingRequest) {
        let marker = serde_json::to_value(pending).unwrap_or_else(|_| json!({}));
        self.namespace_mut(ACTIVITY).insert(id.to_string(), marker);
    }

    /// Remove `activity.<id>`, returning what was stored there.
    pub fn remove_activity(&mut self, id: &str) -> Option<Value> {
        self.root
            .get_mut(ACTIVITY)
            .and_then(Value::as_object_mut)
            .and_then(|a| a.remove(id))
    }

    /// Top-level namespace as a mutable object, resetting it to `{}` if a
    /// snapshot overwrote it with something else.
    fn namespace_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        let slot = self
            .root
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("namespace was just set to an object"),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Request;

    #[test]
    fn fresh_state_has_reserved_namespaces() {
        let state = ClientState::new();
        assert_eq!(
            state.to_value(),
            json!({
                "activity": {},
                "metadata": {"address": "", "connected": false},
                "urbits": {},
                "system": {}
            })
        );
        assert!(!state.is_connected());
        assert_eq!(state.address(), "");
    }

    #[test]
    fn snapshot_merges_into_system() {
        let mut state = ClientState::new();
        state.apply_value(&json!({"system": {"load": 0.2}})).unwrap();
        state.apply_snapshot(r#"{"system":{"status":"ok"}}"#).unwrap();
        assert_eq!(
            state.get(SYSTEM),
            Some(&json!({"status": "ok", "load": 0.2}))
        );
    }

    #[test]
    fn unknown_namespaces_are_kept() {
        let mut state = ClientState::new();
        state.apply_snapshot(r#"{"updates":{"linux":{"available":true}}}"#).unwrap();
        assert_eq!(state.get("updates"), Some(&json!({"linux": {"available": true}})));
        assert!(state.get(ACTIVITY).is_some());
    }

    #[test]
    fn malformed_frame_leaves_state_alone() {
        let mut state = ClientState::new();
        state.set_connected(true);
        let before = state.clone();

        assert!(matches!(
            state.apply_snapshot("{not json"),
            Err(SnapshotError::Parse(_))
        ));
        assert!(matches!(
            state.apply_snapshot("[1,2]"),
            Err(SnapshotError::NotAnObject("array"))
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn activity_insert_and_remove() {
        let mut state = ClientState::new();
        let req = Request::new("urbits", json!({"module": "pier"}));
        state.insert_activity("abc", &PendingRequest::for_request(&req));
        assert!(state.has_activity("abc"));
        assert_eq!(
            state.activity_entry("abc"),
            Some(&json!({"category": "urbits", "payload": {"module": "pier"}}))
        );
        assert_eq!(state.activity_len(), 1);

        assert!(state.remove_activity("abc").is_some());
        assert!(!state.has_activity("abc"));
        assert!(state.remove_activity("abc").is_none());
    }

    #[test]
    fn metadata_survives_clobbering_snapshot() {
        let mut state = ClientState::new();
        state.apply_value(&json!({"metadata": null, "activity": [1]})).unwrap();
        assert!(!state.is_connected());
        assert_eq!(state.activity_len(), 0);

        state.set_connected(true);
        state.set_address("ws://host/ws");
        assert!(state.is_connected());
        assert_eq!(state.address(), "ws://host/ws");

        state.insert_activity("x1", &PendingRequest::for_request(&Request::ping()));
        assert!(state.has_activity("x1"));
    }
}
