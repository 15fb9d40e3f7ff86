//! Server-side HTTP sessions issued through signed cookies.
//!
//! The cookie sent to the client carries only an encoded session id; the
//! session values live in a [`SessionStore`]:
//!
//! - [`CacheStore`] keeps them in Redis (single node or cluster) with a TTL
//! - [`DocumentStore`] keeps one MongoDB document per session
//!
//! Both stores also run over in-process backends ([`MemoryCache`],
//! [`MemoryDocuments`]) for tests and single-process deployments.
//!
//! # Features
//!
//! - `redis` - Redis cache store (enabled by default)
//! - `mongodb` - MongoDB document store
//! - `full` - All backends
//!
//! # Examples
//!
//! ## Per-request sessions with tower
//!
//! ```no_run
//! use sessionkit_core::*;
//! use sessionkit_securecookie::KeyPair;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), SessionError> {
//! let config = CacheStoreConfig::single("localhost:6379", vec![KeyPair::new(b"secret-hash-key".to_vec())])
//!     .with_key_prefix("myapp_");
//! let store = CacheStore::connect(config).await?;
//! let layer = SessionLayer::new("sid", Arc::new(store));
//! # Ok(())
//! # }
//! ```
//!
//! Inside a handler:
//!
//! ```ignore
//! let session = sessionkit_core::session(&request);
//! let count: i64 = session.get("count").await.unwrap_or(0);
//! session.set("count", count + 1).await?;
//! ```
//!
//! ## Using a store directly
//!
//! ```
//! use sessionkit_core::*;
//! use sessionkit_securecookie::KeyPair;
//! use std::sync::Arc;
//!
//! # tokio_test_block_on(async {
//! let config = CacheStoreConfig::single("memory", vec![KeyPair::new(b"secret-hash-key".to_vec())]);
//! let store = CacheStore::with_backend(Arc::new(MemoryCache::new()), config).await?;
//!
//! let ctx = RequestContext::new();
//! let record = store.get(&ctx, "sid").await?;
//! let mut record = record.lock().await;
//! record.set("user_id", 42)?;
//! store.save(&ctx, &mut record).await?;
//! assert_eq!(ctx.response_cookies().len(), 1);
//! # Ok::<(), SessionError>(())
//! # }).unwrap();
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

mod cache_store;
mod config;
mod context;
mod document_store;
mod error;
mod middleware;
#[cfg(feature = "mongodb")]
mod mongo_backend;
mod options;
mod record;
#[cfg(feature = "redis")]
mod redis_backend;
mod session;
mod traits;

pub use cache_store::{CacheBackend, CacheStore, MemoryCache};
pub use config::{
    key_pairs_from_env, CacheStoreConfig, DocumentStoreConfig, DEFAULT_CACHE_TTL,
    DEFAULT_COLLECTION, DEFAULT_COOKIE_MAX_AGE, DEFAULT_DATABASE, DEFAULT_KEY_PREFIX,
    DEFAULT_MAX_LENGTH, MIN_CLUSTER_ADDRESSES,
};
pub use context::{RequestContext, SharedRecord};
pub use document_store::{
    DocumentBackend, DocumentStore, MemoryDocuments, SessionDocument, MODIFIED_KEY,
};
pub use error::{SessionError, SessionResult};
pub use middleware::{session, try_session, SessionLayer, SessionService};
#[cfg(feature = "mongodb")]
pub use mongo_backend::MongoBackend;
pub use options::CookieOptions;
pub use record::{SessionRecord, FLASHES_KEY};
#[cfg(feature = "redis")]
pub use redis_backend::{RedisBackend, DIAL_TIMEOUT};
pub use session::Session;
pub use traits::{generate_session_id, SessionStore, SESSION_ID_BYTES};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::cache_store::{CacheStore, MemoryCache};
    pub use crate::config::{CacheStoreConfig, DocumentStoreConfig};
    pub use crate::context::RequestContext;
    pub use crate::document_store::{DocumentStore, MemoryDocuments};
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::middleware::{session, try_session, SessionLayer};
    pub use crate::options::CookieOptions;
    pub use crate::session::Session;
    pub use crate::traits::SessionStore;
}
