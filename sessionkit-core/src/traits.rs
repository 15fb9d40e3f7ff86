//! Session store trait definition.

use crate::context::{RequestContext, SharedRecord};
use crate::error::SessionResult;
use crate::options::CookieOptions;
use crate::record::SessionRecord;
use async_trait::async_trait;
use data_encoding::BASE32_NOPAD;
use sessionkit_securecookie::generate_random_key;

/// Number of random bytes in a generated session id.
pub const SESSION_ID_BYTES: usize = 32;

/// Storage backend for cookie-issued sessions.
///
/// Stores decide where session values live. The cookie sent to the client
/// only ever carries an encoded session id.
///
/// # Examples
///
/// ```ignore
/// use sessionkit_core::{RequestContext, SessionStore};
///
/// async fn example(store: &impl SessionStore, ctx: &RequestContext) -> SessionResult<()> {
///     let record = store.get(ctx, "sid").await?;
///     let mut record = record.lock().await;
///     record.set("user_id", 123)?;
///     store.save(ctx, &mut record).await
/// }
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Default cookie options for new sessions.
    fn options(&self) -> CookieOptions;

    /// Replace the default cookie options for new sessions.
    fn set_options(&self, options: CookieOptions);

    /// An unsaved session with the store's default options and no I/O.
    fn blank(&self, name: &str) -> SessionRecord {
        SessionRecord::new(name, self.options())
    }

    /// Resolve the session named `name` from the request cookie.
    ///
    /// A missing, undecodable or unknown cookie yields a fresh session with
    /// `is_new` set and an empty id.
    async fn new_session(&self, ctx: &RequestContext, name: &str) -> SessionResult<SessionRecord>;

    /// Return the session registered in `ctx` under `name`, resolving and
    /// registering it on first use.
    async fn get(&self, ctx: &RequestContext, name: &str) -> SessionResult<SharedRecord> {
        if let Some(record) = ctx.registered(name) {
            return Ok(record);
        }
        let record = self.new_session(ctx, name).await?;
        Ok(ctx.register(record))
    }

    /// Persist the session and queue its cookie on `ctx`.
    ///
    /// A negative `max_age` deletes the stored session and queues an
    /// expired cookie instead.
    async fn save(&self, ctx: &RequestContext, record: &mut SessionRecord) -> SessionResult<()>;
}

/// Generate a new random session id.
pub fn generate_session_id() -> String {
    BASE32_NOPAD.encode(&generate_random_key(SESSION_ID_BYTES))
}
