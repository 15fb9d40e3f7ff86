//! Request-scoped session state.
//!
//! A [`RequestContext`] holds the cookies sent with a request, the sessions
//! already resolved while handling it, and the `Set-Cookie` headers stores
//! queue for the response.

use crate::record::SessionRecord;
use cookie::Cookie;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A session record shared between every handle in one request.
pub type SharedRecord = Arc<tokio::sync::Mutex<SessionRecord>>;

/// Cookies in, sessions resolved so far, and cookies out for one request.
///
/// Cloning is cheap and every clone sees the same state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug, Default)]
struct ContextInner {
    cookies: HashMap<String, String>,
    registry: Mutex<HashMap<String, SharedRecord>>,
    outgoing: Mutex<Vec<Cookie<'static>>>,
}

impl RequestContext {
    /// Create a context for a request without cookies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect request cookies from `Cookie` headers.
    ///
    /// When a name appears more than once the first occurrence wins.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(header).flatten() {
                cookies
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value().to_string());
            }
        }
        Self::with_cookies(cookies)
    }

    /// Create a context from `(name, value)` pairs.
    pub fn from_cookies<I, K, V>(cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = HashMap::new();
        for (name, value) in cookies {
            map.entry(name.into()).or_insert_with(|| value.into());
        }
        Self::with_cookies(map)
    }

    fn with_cookies(cookies: HashMap<String, String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                cookies,
                ..Default::default()
            }),
        }
    }

    /// Value of a request cookie.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.inner.cookies.get(name).map(String::as_str)
    }

    /// The session already resolved under `name`, if any.
    pub fn registered(&self, name: &str) -> Option<SharedRecord> {
        self.inner.registry.lock().get(name).cloned()
    }

    /// Register a resolved session and return the shared handle.
    ///
    /// If a session with the same name was registered first, that one is
    /// kept and returned.
    pub fn register(&self, record: SessionRecord) -> SharedRecord {
        let name = record.name().to_string();
        self.inner
            .registry
            .lock()
            .entry(name)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(record)))
            .clone()
    }

    /// Queue a cookie for the response, replacing any queued cookie with
    /// the same name.
    pub fn set_cookie(&self, cookie: Cookie<'static>) {
        let mut outgoing = self.inner.outgoing.lock();
        outgoing.retain(|c| c.name() != cookie.name());
        outgoing.push(cookie);
    }

    /// Cookies queued so far.
    pub fn response_cookies(&self) -> Vec<Cookie<'static>> {
        self.inner.outgoing.lock().clone()
    }

    /// Drain the queued cookies into `Set-Cookie` headers.
    pub fn apply(&self, headers: &mut HeaderMap) {
        let cookies = std::mem::take(&mut *self.inner.outgoing.lock());
        for cookie in cookies {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => {
                    warn!(cookie = cookie.name(), error = %e, "Dropping cookie with invalid header value");
                }
            }
        }
    }

    /// Forget every resolved session.
    pub fn clear(&self) {
        self.inner.registry.lock().clear();
    }
}
