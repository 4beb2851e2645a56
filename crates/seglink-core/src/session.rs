//! Session token lookup.
//!
//! The session cookie is issued elsewhere; the client only reads it.

use std::collections::HashMap;

/// Name of the cookie holding the session token.
pub const SESSION_COOKIE: &str = "sessionid";

/// Anything that can hand out cookie values by name.
pub trait SessionStore: Send + Sync {
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Look up `name` in `store`.
pub fn get_cookie(store: &dyn SessionStore, name: &str) -> Option<String> {
    store.cookie(name)
}

/// Cookies parsed from a `Cookie` header style string (`a=1; b=2`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: HashMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name=value` pairs separated by `;`. Pairs without `=` are skipped;
    /// a repeated name keeps its first value.
    pub fn parse(header: &str) -> Self {
        let mut cookies = HashMap::new();
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            cookies
                .entry(name.to_string())
                .or_insert_with(|| value.trim().to_string());
        }
        Self { cookies }
    }

    /// A jar holding only the session cookie.
    pub fn with_session(token: impl Into<String>) -> Self {
        let mut jar = Self::new();
        jar.insert(SESSION_COOKIE, token);
        jar
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl SessionStore for CookieJar {
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }
}
