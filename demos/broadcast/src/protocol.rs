//! Server-side broadcast structure and request handling.
//!
//! The structure is the full snapshot pushed to every client. Requests are
//! answered with an `activity` entry keyed by the request id.

use seglink_core::{ActivityResponse, OutboundMessage, merge};
use serde_json::{Map, Value, json};

/// Categories allowed to publish under their own top-level key.
const SYSTEM_WHITELIST: [&str; 2] = ["system", "updates"];

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("category '{0}' not in whitelist")]
    NotWhitelisted(String),
    #[error("payload missing '{0}'")]
    MissingField(&'static str),
}

/// Everything clients are told about.
#[derive(Debug, Clone)]
pub struct Broadcast {
    structure: Value,
}

impl Default for Broadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcast {
    pub fn new() -> Self {
        Self {
            structure: json!({"system": {}, "urbits": {}}),
        }
    }

    pub fn snapshot(&self) -> &Value {
        &self.structure
    }

    /// Set `<category>.<module>.<action> = info`.
    pub fn system_broadcast(
        &mut self,
        category: &str,
        module: &str,
        action: &str,
        info: Value,
    ) -> Result<(), BroadcastError> {
        if !SYSTEM_WHITELIST.contains(&category) {
            return Err(BroadcastError::NotWhitelisted(category.to_string()));
        }
        self.set_path(&[category, module, action], info);
        Ok(())
    }

    /// Set `urbits.<patp>.<module>.<action> = info`.
    pub fn urbit_broadcast(&mut self, patp: &str, module: &str, action: &str, info: Value) {
        self.set_path(&["urbits", patp, module, action], info);
    }

    fn set_path(&mut self, path: &[&str], leaf: Value) {
        let patch = path
            .iter()
            .rev()
            .fold(leaf, |inner, key| {
                let mut map = Map::new();
                map.insert((*key).to_string(), inner);
                Value::Object(map)
            });
        merge(&mut self.structure, &patch);
    }

    /// Apply one client request and produce its acknowledgment.
    pub fn handle(&mut self, msg: &OutboundMessage) -> ActivityResponse {
        if msg.sessionid.is_empty() {
            return response(403, "missing session");
        }
        if msg.is_ping() {
            return response(200, "pong");
        }

        let payload = msg.payload.as_ref().unwrap_or(&Value::Null);
        let result = field(payload, "module").and_then(|module| {
            let action = field(payload, "action")?;
            let info = payload.get("info").cloned().unwrap_or(Value::Null);
            if msg.category == "urbits" {
                let patp = field(payload, "patp")?;
                self.urbit_broadcast(patp, module, action, info);
                Ok(())
            } else {
                self.system_broadcast(&msg.category, module, action, info)
            }
        });

        match result {
            Ok(()) => response(200, "success"),
            Err(e) => response(400, &e.to_string()),
        }
    }
}

fn field<'a>(payload: &'a Value, name: &'static str) -> Result<&'a str, BroadcastError> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .ok_or(BroadcastError::MissingField(name))
}

fn response(status_code: u16, message: &str) -> ActivityResponse {
    ActivityResponse {
        message: message.to_string(),
        status_code,
        token: None,
    }
}

/// `{"activity": {"<id>": <response>}}`
pub fn make_activity(id: &str, response: &ActivityResponse) -> Value {
    let mut activity = Map::new();
    activity.insert(
        id.to_string(),
        serde_json::to_value(response).unwrap_or(Value::Null),
    );
    json!({ "activity": activity })
}
