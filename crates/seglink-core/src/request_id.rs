//! Request correlation identifiers.
//!
//! Every outbound message carries a random alphanumeric id. The server echoes
//! it back under `activity.<id>` when it has handled the request.

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length used when the caller does not configure one.
pub const DEFAULT_REQUEST_ID_LENGTH: usize = 16;

/// Generate a random alphanumeric string of `length` characters.
///
/// Uniqueness is probabilistic: 62^16 possibilities at the default length.
pub fn gen_request_id(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// A request id, guaranteed non-empty and ASCII alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh id of the given length (clamped to at least 1).
    pub fn generate(length: usize) -> Self {
        Self(gen_request_id(length.max(1)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for RequestId {
    type Err = RequestIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(RequestIdParseError::Empty);
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(RequestIdParseError::InvalidChar(c));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for RequestId {
    type Error = RequestIdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Error parsing a request id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestIdParseError {
    #[error("request id cannot be empty")]
    Empty,
    #[error("request id must be alphanumeric, found {0:?}")]
    InvalidChar(char),
}
