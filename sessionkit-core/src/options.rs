//! Cookie attributes attached to every session.

use cookie::time::{Duration, OffsetDateTime};
use cookie::Cookie;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Attributes of the cookie that carries a session.
///
/// `max_age` is tri-state: a positive value is a lifetime in seconds, zero
/// produces a browser-session cookie without `Max-Age`, and a negative value
/// asks the store to delete the session and expire the cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: 0,
            secure: false,
            http_only: false,
        }
    }
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Whether these options request deletion of the session.
    pub fn is_delete(&self) -> bool {
        self.max_age < 0
    }

    /// Build a `Set-Cookie` cookie carrying `value` under `name`.
    ///
    /// Deleting options yield an empty-valued cookie that expires immediately.
    pub fn to_cookie(&self, name: &str, value: &str) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value.to_string()))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only);

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }

        match self.max_age.cmp(&0) {
            Ordering::Greater => {
                let lifetime = Duration::seconds(self.max_age);
                builder = builder
                    .max_age(lifetime)
                    .expires(OffsetDateTime::now_utc() + lifetime);
            }
            Ordering::Less => {
                builder = builder
                    .max_age(Duration::ZERO)
                    .expires(OffsetDateTime::UNIX_EPOCH + Duration::seconds(1));
            }
            Ordering::Equal => {}
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CookieOptions::default();
        assert_eq!(options.path, "/");
        assert_eq!(options.max_age, 0);
        assert!(!options.is_delete());
    }

    #[test]
    fn test_positive_max_age() {
        let options = CookieOptions::new()
            .with_max_age(3600)
            .with_domain("example.com")
            .with_secure(true)
            .with_http_only(true);
        let cookie = options.to_cookie("sid", "abc");

        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.max_age(), Some(Duration::seconds(3600)));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert!(cookie.expires_datetime().is_some());
    }

    #[test]
    fn test_zero_max_age_is_session_cookie() {
        let cookie = CookieOptions::default().to_cookie("sid", "abc");
        assert!(cookie.max_age().is_none());
        assert!(cookie.expires().is_none());

        let header = cookie.to_string();
        assert!(header.starts_with("sid=abc"));
        assert!(header.contains("Path=/"));
        assert!(!header.contains("Max-Age"));
    }

    #[test]
    fn test_negative_max_age_expires_cookie() {
        let options = CookieOptions::new().with_max_age(-1);
        assert!(options.is_delete());

        let cookie = options.to_cookie("sid", "");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        let expires = cookie.expires_datetime().unwrap();
        assert!(expires < OffsetDateTime::now_utc());
    }
}
