//! Wire messages.
//!
//! Outbound requests are flat JSON objects. Inbound traffic has no envelope:
//! every frame is a partial state snapshot, and request acknowledgments arrive
//! as entries under its `activity` key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category reserved for the liveness handshake sent right after connecting.
pub const PING_CATEGORY: &str = "ping";

/// A message sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: String,
    pub sessionid: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl OutboundMessage {
    pub fn is_ping(&self) -> bool {
        self.category == PING_CATEGORY
    }
}

/// What the caller asks to send, before the client stamps it.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub category: String,
    pub payload: Option<Value>,
}

impl Request {
    pub fn new(category: impl Into<String>, payload: Value) -> Self {
        Self {
            category: category.into(),
            payload: Some(payload),
        }
    }

    /// The liveness handshake. Never carries a payload.
    pub fn ping() -> Self {
        Self {
            category: PING_CATEGORY.to_string(),
            payload: None,
        }
    }

    pub fn is_ping(&self) -> bool {
        self.category == PING_CATEGORY
    }

    /// Stamp with an id and session token.
    pub fn into_outbound(self, id: impl Into<String>, sessionid: impl Into<String>) -> OutboundMessage {
        OutboundMessage {
            id: id.into(),
            sessionid: sessionid.into(),
            category: self.category,
            payload: self.payload,
        }
    }

    /// Log prefix: `category`, plus `:module:action` when the payload names them.
    pub fn describe(&self) -> String {
        let mut label = self.category.clone();
        if self.is_ping() {
            return label;
        }
        if let Some(payload) = &self.payload {
            for field in ["module", "action"] {
                if let Some(v) = payload.get(field).and_then(Value::as_str) {
                    label.push(':');
                    label.push_str(v);
                }
            }
        }
        label
    }
}

/// Marker stored under `activity.<id>` while a request is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl PendingRequest {
    /// Build the marker for a request. Ping markers drop the payload.
    pub fn for_request(request: &Request) -> Self {
        Self {
            category: request.category.clone(),
            payload: if request.is_ping() {
                None
            } else {
                request.payload.clone()
            },
        }
    }
}

/// The server's acknowledgment, broadcast as
/// `{"activity": {"<id>": {"message": .., "status_code": .., "token": ..}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub message: String,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl ActivityResponse {
    /// Extract a response from a merged activity entry, if it carries one.
    pub fn from_entry(entry: &Value) -> Option<Self> {
        entry.get("status_code")?;
        serde_json::from_value(entry.clone()).ok()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ping_serializes_without_payload() {
        let msg = Request::ping().into_outbound("abc", "sid");
        let text = serde_json::to_string(&msg).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"id": "abc", "sessionid": "sid", "category": "ping"})
        );
    }

    #[test]
    fn payload_is_carried() {
        let req = Request::new("urbits", json!({"module": "pier", "action": "start"}));
        let msg = req.into_outbound("id1", "sid");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["payload"]["action"], "start");
        assert_eq!(value["category"], "urbits");
        assert!(!msg.is_ping());
        assert!(Request::ping().into_outbound("id2", "sid").is_ping());
    }

    #[test]
    fn pending_marker_drops_ping_payload() {
        let mut ping = Request::ping();
        ping.payload = Some(json!({"ignored": true}));
        let marker = PendingRequest::for_request(&ping);
        assert_eq!(serde_json::to_value(marker).unwrap(), json!({"category": "ping"}));

        let req = Request::new("system", json!({"x": 1}));
        let marker = PendingRequest::for_request(&req);
        assert_eq!(marker.payload, Some(json!({"x": 1})));
    }

    #[test]
    fn describe_includes_module_and_action() {
        let req = Request::new("urbits", json!({"module": "pier", "action": "start"}));
        assert_eq!(req.describe(), "urbits:pier:start");
        assert_eq!(Request::ping().describe(), "ping");
        assert_eq!(Request::new("system", json!({})).describe(), "system");
    }

    #[test]
    fn activity_response_needs_status_code() {
        let entry = json!({"category": "system", "message": "ok", "status_code": 200});
        let resp = ActivityResponse::from_entry(&entry).unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.token, None);

        assert!(ActivityResponse::from_entry(&json!({"category": "system"})).is_none());
    }
}
