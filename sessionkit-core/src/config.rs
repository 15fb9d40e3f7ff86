//! Store configuration.

use crate::error::{SessionError, SessionResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sessionkit_securecookie::KeyPair;

/// Default prefix for cache keys.
pub const DEFAULT_KEY_PREFIX: &str = "session_";
/// Default maximum encoded session size in bytes.
pub const DEFAULT_MAX_LENGTH: usize = 4096;
/// Cache TTL used when a session's cookie has no `max_age`.
pub const DEFAULT_CACHE_TTL: i64 = 1800;
/// Default cookie lifetime in seconds.
pub const DEFAULT_COOKIE_MAX_AGE: i64 = 86400 * 30;
/// Minimum number of seed addresses in cluster mode.
pub const MIN_CLUSTER_ADDRESSES: usize = 6;

/// Default MongoDB database.
pub const DEFAULT_DATABASE: &str = "test";
/// Default MongoDB collection.
pub const DEFAULT_COLLECTION: &str = "session_test";

/// Configuration for [`CacheStore`](crate::CacheStore).
#[derive(Debug, Clone)]
pub struct CacheStoreConfig {
    /// Connect to a Redis cluster instead of a single node.
    pub cluster: bool,
    /// Connection pool size (single node only).
    pub pool_size: u32,
    /// `host:port` addresses. Exactly one in single-node mode, at least six
    /// in cluster mode.
    pub addresses: Vec<String>,
    /// Password sent on connect.
    pub password: Option<String>,
    /// Codec keys, newest first.
    pub key_pairs: Vec<KeyPair>,
    /// Prefix prepended to every session id to form the cache key.
    pub key_prefix: String,
    /// Maximum encoded session size. Zero disables the check.
    pub max_length: usize,
    /// Cache TTL in seconds for sessions whose cookie has no `max_age`.
    pub default_max_age: i64,
    /// Cookie `max_age` for new sessions.
    pub max_age: i64,
}

impl Default for CacheStoreConfig {
    fn default() -> Self {
        Self {
            cluster: false,
            pool_size: 10,
            addresses: vec!["localhost:6379".to_string()],
            password: None,
            key_pairs: Vec::new(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            default_max_age: DEFAULT_CACHE_TTL,
            max_age: DEFAULT_COOKIE_MAX_AGE,
        }
    }
}

impl CacheStoreConfig {
    /// Single-node configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use sessionkit_core::CacheStoreConfig;
    /// use sessionkit_securecookie::KeyPair;
    ///
    /// let config = CacheStoreConfig::single("localhost:6379", vec![KeyPair::new(b"secret".to_vec())])
    ///     .with_key_prefix("myapp_");
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn single(address: impl Into<String>, key_pairs: Vec<KeyPair>) -> Self {
        Self {
            addresses: vec![address.into()],
            key_pairs,
            ..Default::default()
        }
    }

    /// Cluster configuration.
    pub fn cluster<I, S>(addresses: I, key_pairs: Vec<KeyPair>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cluster: true,
            addresses: addresses.into_iter().map(Into::into).collect(),
            key_pairs,
            ..Default::default()
        }
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Append a key pair used for decoding rotated cookies.
    pub fn with_key_pair(mut self, pair: KeyPair) -> Self {
        self.key_pairs.push(pair);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_default_max_age(mut self, seconds: i64) -> Self {
        self.default_max_age = seconds;
        self
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    /// Check the topology and keys before any connection is attempted.
    pub fn validate(&self) -> SessionResult<()> {
        if self.key_pairs.is_empty() {
            return Err(SessionError::Config(
                "at least one key pair is required".to_string(),
            ));
        }
        if self.cluster {
            if self.addresses.len() < MIN_CLUSTER_ADDRESSES {
                return Err(SessionError::Config(format!(
                    "cluster mode requires at least {} addresses, got {}",
                    MIN_CLUSTER_ADDRESSES,
                    self.addresses.len()
                )));
            }
        } else if self.addresses.len() != 1 {
            return Err(SessionError::Config(format!(
                "single-node mode requires exactly one address, got {}",
                self.addresses.len()
            )));
        }
        if self.pool_size == 0 {
            return Err(SessionError::Config(
                "pool size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `SESSION_REDIS_ADDRS` (comma separated), `SESSION_REDIS_CLUSTER`,
    /// `SESSION_REDIS_PASSWORD`, `SESSION_REDIS_POOL_SIZE`,
    /// `SESSION_KEY_PREFIX`, `SESSION_MAX_LENGTH`, `SESSION_DEFAULT_MAX_AGE`,
    /// `SESSION_MAX_AGE` and the keys from [`key_pairs_from_env`].
    pub fn from_env() -> SessionResult<Self> {
        let mut config = Self {
            key_pairs: key_pairs_from_env()?,
            ..Default::default()
        };

        if let Ok(addrs) = std::env::var("SESSION_REDIS_ADDRS") {
            config.addresses = addrs
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if std::env::var("SESSION_REDIS_CLUSTER").is_ok() {
            config.cluster = true;
        }

        if let Ok(password) = std::env::var("SESSION_REDIS_PASSWORD") {
            config.password = Some(password);
        }

        if let Ok(pool_size) = std::env::var("SESSION_REDIS_POOL_SIZE") {
            config.pool_size = parse_env("SESSION_REDIS_POOL_SIZE", &pool_size)?;
        }

        if let Ok(prefix) = std::env::var("SESSION_KEY_PREFIX") {
            config.key_prefix = prefix;
        }

        if let Ok(max_length) = std::env::var("SESSION_MAX_LENGTH") {
            config.max_length = parse_env("SESSION_MAX_LENGTH", &max_length)?;
        }

        if let Ok(age) = std::env::var("SESSION_DEFAULT_MAX_AGE") {
            config.default_max_age = parse_env("SESSION_DEFAULT_MAX_AGE", &age)?;
        }

        if let Ok(age) = std::env::var("SESSION_MAX_AGE") {
            config.max_age = parse_env("SESSION_MAX_AGE", &age)?;
        }

        Ok(config)
    }
}

/// Configuration for [`DocumentStore`](crate::DocumentStore).
#[derive(Debug, Clone)]
pub struct DocumentStoreConfig {
    pub database: String,
    pub collection: String,
    /// Cookie `max_age` for new sessions, also used as the TTL index expiry.
    pub max_age: i64,
    /// Create a TTL index on `modified` at construction.
    pub ensure_ttl: bool,
    /// Codec keys, newest first.
    pub key_pairs: Vec<KeyPair>,
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            max_age: DEFAULT_COOKIE_MAX_AGE,
            ensure_ttl: false,
            key_pairs: Vec::new(),
        }
    }
}

impl DocumentStoreConfig {
    pub fn new(max_age: i64, ensure_ttl: bool, key_pairs: Vec<KeyPair>) -> Self {
        Self {
            max_age,
            ensure_ttl,
            key_pairs,
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `SESSION_MONGO_DATABASE`, `SESSION_MONGO_COLLECTION`,
    /// `SESSION_MAX_AGE`, `SESSION_ENSURE_TTL` and the keys from
    /// [`key_pairs_from_env`].
    pub fn from_env() -> SessionResult<Self> {
        let mut config = Self {
            key_pairs: key_pairs_from_env()?,
            ..Default::default()
        };

        if let Ok(database) = std::env::var("SESSION_MONGO_DATABASE") {
            config.database = database;
        }

        if let Ok(collection) = std::env::var("SESSION_MONGO_COLLECTION") {
            config.collection = collection;
        }

        if let Ok(age) = std::env::var("SESSION_MAX_AGE") {
            config.max_age = parse_env("SESSION_MAX_AGE", &age)?;
        }

        if std::env::var("SESSION_ENSURE_TTL").is_ok() {
            config.ensure_ttl = true;
        }

        Ok(config)
    }
}

/// Read codec keys from `SESSION_HASH_KEY` and the optional
/// `SESSION_BLOCK_KEY`, both standard base64.
pub fn key_pairs_from_env() -> SessionResult<Vec<KeyPair>> {
    let Ok(hash) = std::env::var("SESSION_HASH_KEY") else {
        return Err(SessionError::Config(
            "SESSION_HASH_KEY is not set".to_string(),
        ));
    };
    let mut pair = KeyPair::new(decode_key("SESSION_HASH_KEY", &hash)?);

    if let Ok(block) = std::env::var("SESSION_BLOCK_KEY")
        && !block.is_empty()
    {
        pair = pair.with_block_key(decode_key("SESSION_BLOCK_KEY", &block)?);
    }

    Ok(vec![pair])
}

fn decode_key(var: &str, value: &str) -> SessionResult<Vec<u8>> {
    STANDARD
        .decode(value.trim())
        .map_err(|e| SessionError::Config(format!("{var} is not valid base64: {e}")))
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> SessionResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SessionError::Config(format!("{var} has an invalid value: {value}")))
}
