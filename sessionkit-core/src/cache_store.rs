//! Cache-backed session store.
//!
//! Session values are encoded with the store's codecs and written under
//! `key_prefix + id` with a TTL; the cookie only carries the encoded id.

use crate::config::CacheStoreConfig;
use crate::context::RequestContext;
use crate::error::{SessionError, SessionResult};
use crate::options::CookieOptions;
use crate::record::SessionRecord;
use crate::traits::{SessionStore, generate_session_id};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use sessionkit_securecookie::{CodecSet, DEFAULT_MAX_LENGTH};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Key-value backend with expiring entries.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Health check. Healthy backends reply `PONG`.
    async fn ping(&self) -> SessionResult<String>;

    async fn get(&self, key: &str) -> SessionResult<Option<String>>;

    /// Write `value` under `key`. `None` stores it without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> SessionResult<()>;

    async fn del(&self, key: &str) -> SessionResult<()>;

    /// Release connections.
    async fn close(&self) -> SessionResult<()> {
        Ok(())
    }
}

/// In-process [`CacheBackend`].
///
/// Expiry follows the tokio clock, so paused-time tests can advance it.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|(_, expires)| expires.is_none_or(|at| at > now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining lifetime of `key`, `None` if missing or without expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .and_then(|(_, expires)| *expires)
            .and_then(|at| at.checked_duration_since(now))
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn ping(&self) -> SessionResult<String> {
        Ok("PONG".to_string())
    }

    async fn get(&self, key: &str) -> SessionResult<Option<String>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, Some(at))) if *at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> SessionResult<()> {
        let expires = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn del(&self, key: &str) -> SessionResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Session store keeping values in Redis or another [`CacheBackend`].
///
/// # Examples
///
/// ```no_run
/// use sessionkit_core::{CacheStore, CacheStoreConfig};
/// use sessionkit_securecookie::KeyPair;
///
/// # async fn example() -> Result<(), sessionkit_core::SessionError> {
/// let config = CacheStoreConfig::single("localhost:6379", vec![KeyPair::new(b"secret".to_vec())])
///     .with_key_prefix("myapp_");
/// let store = CacheStore::connect(config).await?;
/// # Ok(())
/// # }
/// ```
///
/// Settings can be changed through a shared reference, so a store already
/// installed behind a [`SessionLayer`](crate::SessionLayer) stays tunable.
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    codecs: RwLock<CodecSet>,
    options: RwLock<CookieOptions>,
    key_prefix: RwLock<String>,
    max_length: AtomicUsize,
    default_max_age: AtomicI64,
}

impl CacheStore {
    /// Connect to Redis as described by `config`.
    ///
    /// The configuration is validated before any connection is attempted.
    #[cfg(feature = "redis")]
    pub async fn connect(config: CacheStoreConfig) -> SessionResult<Self> {
        config.validate()?;
        let backend = crate::redis_backend::RedisBackend::connect(&config).await?;
        Self::with_backend(Arc::new(backend), config).await
    }

    /// Build a store over an existing backend.
    ///
    /// Topology settings in `config` are ignored; keys and limits apply.
    pub async fn with_backend(
        backend: Arc<dyn CacheBackend>,
        config: CacheStoreConfig,
    ) -> SessionResult<Self> {
        let mut codecs = CodecSet::from_pairs(&config.key_pairs)
            .map_err(|e| SessionError::Config(e.to_string()))?;
        // The store enforces its own limit on the stored payload.
        codecs.set_max_length(0);

        let pong = backend.ping().await?;
        if pong != "PONG" {
            return Err(SessionError::Connection(format!(
                "unexpected ping reply: {pong}"
            )));
        }

        let store = Self {
            backend,
            codecs: RwLock::new(codecs),
            options: RwLock::new(CookieOptions::default()),
            key_prefix: RwLock::new(config.key_prefix),
            max_length: AtomicUsize::new(config.max_length),
            default_max_age: AtomicI64::new(config.default_max_age),
        };
        store.set_max_age(config.max_age);

        info!(
            key_prefix = %store.key_prefix(),
            max_length = store.max_length(),
            default_max_age = store.default_max_age(),
            "Cache session store ready"
        );

        Ok(store)
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    pub fn key_prefix(&self) -> String {
        self.key_prefix.read().clone()
    }

    pub fn max_length(&self) -> usize {
        self.max_length.load(Ordering::Relaxed)
    }

    pub fn default_max_age(&self) -> i64 {
        self.default_max_age.load(Ordering::Relaxed)
    }

    /// Limit the encoded session size. Zero disables the check.
    pub fn set_max_length(&self, max_length: usize) {
        self.max_length.store(max_length, Ordering::Relaxed);
    }

    pub fn set_key_prefix(&self, prefix: impl Into<String>) {
        *self.key_prefix.write() = prefix.into();
    }

    /// TTL in seconds for sessions whose cookie has no `max_age`.
    pub fn set_default_max_age(&self, seconds: i64) {
        self.default_max_age.store(seconds, Ordering::Relaxed);
    }

    /// Set the cookie `max_age` for new sessions and the codecs' max age.
    pub fn set_max_age(&self, seconds: i64) {
        self.options.write().max_age = seconds;
        self.codecs.write().set_max_age(seconds);
    }

    /// Close the backend connections.
    pub async fn close(&self) -> SessionResult<()> {
        self.backend.close().await
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.key_prefix.read(), id)
    }

    /// Load stored values into `record`. `Ok(false)` when nothing is stored.
    async fn load(&self, record: &mut SessionRecord) -> SessionResult<bool> {
        let Some(data) = self.backend.get(&self.key(&record.id)).await? else {
            return Ok(false);
        };
        if data.is_empty() {
            return Ok(false);
        }
        let values: HashMap<String, Value> = self.codecs.read().decode(record.name(), &data)?;
        record.values = values;
        Ok(true)
    }

    async fn persist(&self, record: &SessionRecord) -> SessionResult<()> {
        let encoded = self.codecs.read().encode(record.name(), &record.values)?;
        let max_length = self.max_length();
        if max_length != 0 && encoded.len() > max_length {
            return Err(SessionError::PayloadTooLarge {
                length: encoded.len(),
                max: max_length,
            });
        }

        let age = if record.options.max_age == 0 {
            self.default_max_age()
        } else {
            record.options.max_age
        };
        let ttl = (age > 0).then(|| Duration::from_secs(age as u64));

        self.backend.set(&self.key(&record.id), &encoded, ttl).await
    }
}

#[async_trait]
impl SessionStore for CacheStore {
    fn options(&self) -> CookieOptions {
        self.options.read().clone()
    }

    fn set_options(&self, options: CookieOptions) {
        *self.options.write() = options;
    }

    async fn new_session(&self, ctx: &RequestContext, name: &str) -> SessionResult<SessionRecord> {
        let mut record = self.blank(name);
        let Some(cookie) = ctx.cookie(name) else {
            return Ok(record);
        };

        if cookie.len() > DEFAULT_MAX_LENGTH {
            debug!(session = name, length = cookie.len(), "Ignoring oversized session cookie");
            return Ok(record);
        }

        let decoded = self.codecs.read().decode::<String>(name, cookie);
        match decoded {
            Ok(id) => record.id = id,
            Err(e) => {
                debug!(session = name, error = %e, "Ignoring undecodable session cookie");
                return Ok(record);
            }
        }

        match self.load(&mut record).await {
            Ok(true) => {
                record.is_new = false;
                Ok(record)
            }
            Ok(false) => {
                debug!(session = name, "No stored data for session cookie");
                Ok(self.blank(name))
            }
            Err(SessionError::Codec(e)) => {
                warn!(session = name, error = %e, "Stored session failed to decode");
                Ok(self.blank(name))
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, ctx: &RequestContext, record: &mut SessionRecord) -> SessionResult<()> {
        if record.options.is_delete() {
            if !record.id.is_empty() {
                self.backend.del(&self.key(&record.id)).await?;
                debug!(session = record.name(), "Session deleted");
            }
            ctx.set_cookie(record.options.to_cookie(record.name(), ""));
            return Ok(());
        }

        if record.id.is_empty() {
            record.id = generate_session_id();
        }

        self.persist(record).await?;

        let encoded = self.codecs.read().encode(record.name(), &record.id)?;
        ctx.set_cookie(record.options.to_cookie(record.name(), &encoded));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionkit_securecookie::KeyPair;

    fn config() -> CacheStoreConfig {
        CacheStoreConfig::single("localhost:6379", vec![KeyPair::new(vec![7u8; 32])])
    }

    async fn store() -> (CacheStore, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        let store = CacheStore::with_backend(cache.clone(), config()).await.unwrap();
        (store, cache)
    }

    /// Context carrying the cookie queued on `previous`.
    fn follow_up(previous: &RequestContext, name: &str) -> RequestContext {
        let cookie = previous
            .response_cookies()
            .into_iter()
            .find(|c| c.name() == name)
            .unwrap();
        RequestContext::from_cookies([(name, cookie.value().to_string())])
    }

    #[tokio::test]
    async fn test_no_cookie_is_new() {
        let (store, _) = store().await;
        let record = store.new_session(&RequestContext::new(), "sid").await.unwrap();
        assert!(record.is_new);
        assert!(record.id.is_empty());
        assert_eq!(record.options.max_age, 86400 * 30);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let (store, cache) = store().await;
        let ctx = RequestContext::new();
        let mut record = store.new_session(&ctx, "sid").await.unwrap();
        record.set("user", "alice").unwrap();
        store.save(&ctx, &mut record).await.unwrap();

        assert!(!record.id.is_empty());
        assert_eq!(cache.len(), 1);
        assert!(cache.ttl(&format!("session_{}", record.id)).is_some());

        let next = follow_up(&ctx, "sid");
        let loaded = store.new_session(&next, "sid").await.unwrap();
        assert!(!loaded.is_new);
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.get::<String>("user"), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn test_tampered_cookie_is_new() {
        let (store, _) = store().await;
        let ctx = RequestContext::from_cookies([("sid", "garbage")]);
        let record = store.new_session(&ctx, "sid").await.unwrap();
        assert!(record.is_new);
        assert!(record.id.is_empty());
    }

    #[tokio::test]
    async fn test_missing_backend_entry_is_new() {
        let (store, cache) = store().await;
        let ctx = RequestContext::new();
        let mut record = store.new_session(&ctx, "sid").await.unwrap();
        store.save(&ctx, &mut record).await.unwrap();
        cache.del(&format!("session_{}", record.id)).await.unwrap();

        let loaded = store.new_session(&follow_up(&ctx, "sid"), "sid").await.unwrap();
        assert!(loaded.is_new);
        assert!(loaded.id.is_empty());
    }

    #[tokio::test]
    async fn test_zero_max_age_uses_default_ttl() {
        let (store, cache) = store().await;
        let ctx = RequestContext::new();
        let mut record = store.new_session(&ctx, "sid").await.unwrap();
        record.options.max_age = 0;
        store.save(&ctx, &mut record).await.unwrap();

        let ttl = cache.ttl(&format!("session_{}", record.id)).unwrap();
        assert!(ttl <= Duration::from_secs(1800));
        assert!(ttl > Duration::from_secs(1790));
    }

    #[tokio::test]
    async fn test_negative_max_age_deletes() {
        let (store, cache) = store().await;
        let ctx = RequestContext::new();
        let mut record = store.new_session(&ctx, "sid").await.unwrap();
        store.save(&ctx, &mut record).await.unwrap();
        assert_eq!(cache.len(), 1);

        record.options.max_age = -1;
        store.save(&ctx, &mut record).await.unwrap();
        assert!(cache.is_empty());

        let cookie = ctx.response_cookies().pop().unwrap();
        assert_eq!(cookie.value(), "");
    }

    #[tokio::test]
    async fn test_max_length_enforced() {
        let (store, cache) = store().await;
        store.set_max_length(64);

        let ctx = RequestContext::new();
        let mut record = store.new_session(&ctx, "sid").await.unwrap();
        record.set("blob", "x".repeat(200)).unwrap();
        let err = store.save(&ctx, &mut record).await.unwrap_err();
        assert!(matches!(err, SessionError::PayloadTooLarge { max: 64, .. }));
        assert!(cache.is_empty());
        assert!(ctx.response_cookies().is_empty());

        store.set_max_length(0);
        store.save(&ctx, &mut record).await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_key_prefix() {
        let (store, cache) = store().await;
        store.set_key_prefix("app:");
        let ctx = RequestContext::new();
        let mut record = store.new_session(&ctx, "sid").await.unwrap();
        store.save(&ctx, &mut record).await.unwrap();

        assert!(cache.get(&format!("app:{}", record.id)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_max_age_updates_options() {
        let (store, _) = store().await;
        store.set_max_age(60);
        assert_eq!(store.options().max_age, 60);
        assert_eq!(store.blank("sid").options.max_age, 60);
    }

    struct Loading;

    #[async_trait]
    impl CacheBackend for Loading {
        async fn ping(&self) -> SessionResult<String> {
            Ok("LOADING".to_string())
        }

        async fn get(&self, _key: &str) -> SessionResult<Option<String>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> SessionResult<()> {
            Ok(())
        }

        async fn del(&self, _key: &str) -> SessionResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unexpected_ping_reply_fails() {
        let result = CacheStore::with_backend(Arc::new(Loading), config()).await;
        match result {
            Err(SessionError::Connection(msg)) => assert!(msg.contains("LOADING")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("store built over a backend that did not reply PONG"),
        }
    }

    #[tokio::test]
    async fn test_oversized_cookie_ignored() {
        let (store, _) = store().await;
        let ctx = RequestContext::new();
        let mut record = store.new_session(&ctx, "sid").await.unwrap();
        record.id = "x".repeat(DEFAULT_MAX_LENGTH * 2);
        store.save(&ctx, &mut record).await.unwrap();

        let next = follow_up(&ctx, "sid");
        let cookie = next.cookie("sid").unwrap().to_string();
        assert!(cookie.len() > DEFAULT_MAX_LENGTH);
        assert!(store.codecs.read().decode::<String>("sid", &cookie).is_ok());

        let loaded = store.new_session(&next, "sid").await.unwrap();
        assert!(loaded.is_new);
        assert!(loaded.id.is_empty());
    }

    #[tokio::test]
    async fn test_settings_through_shared_store() {
        let (store, cache) = store().await;
        let store = Arc::new(store);
        let shared: Arc<dyn SessionStore> = store.clone();

        store.set_key_prefix("shared:");
        store.set_default_max_age(60);
        store.set_max_age(0);
        assert_eq!(shared.options().max_age, 0);

        let ctx = RequestContext::new();
        let mut record = shared.new_session(&ctx, "sid").await.unwrap();
        shared.save(&ctx, &mut record).await.unwrap();

        let ttl = cache.ttl(&format!("shared:{}", record.id)).unwrap();
        assert!(ttl <= Duration::from_secs(60));
        assert!(ttl > Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires() {
        let (store, cache) = store().await;
        let ctx = RequestContext::new();
        let mut record = store.new_session(&ctx, "sid").await.unwrap();
        record.options.max_age = 10;
        record.set("n", 1).unwrap();
        store.save(&ctx, &mut record).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        let loaded = store.new_session(&follow_up(&ctx, "sid"), "sid").await.unwrap();
        assert!(loaded.is_new);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_registry_returns_same_record() {
        let (store, _) = store().await;
        let ctx = RequestContext::new();
        let a = store.get(&ctx, "sid").await.unwrap();
        a.lock().await.set("k", 1).unwrap();
        let b = store.get(&ctx, "sid").await.unwrap();
        assert_eq!(b.lock().await.get::<i32>("k"), Some(1));
    }
}
