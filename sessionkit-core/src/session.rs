//! Per-request session handle.

use crate::context::{RequestContext, SharedRecord};
use crate::error::SessionResult;
use crate::options::CookieOptions;
use crate::traits::SessionStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tracing::warn;

/// Handle to one named session for the current request.
///
/// The underlying record is resolved from the store on first use. If that
/// fails the error is logged and a blank session is used instead, so
/// handlers always see a session.
///
/// [`Session::set`] writes through to the store; [`Session::insert`] only
/// stages the change until [`Session::save`].
///
/// # Examples
///
/// ```ignore
/// let session = sessionkit_core::session(&request);
/// let count: i64 = session.get("count").await.unwrap_or(0);
/// session.set("count", count + 1).await?;
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    name: String,
    store: Arc<dyn SessionStore>,
    ctx: RequestContext,
    record: OnceCell<SharedRecord>,
    changed: AtomicBool,
}

impl Session {
    pub fn new(name: impl Into<String>, store: Arc<dyn SessionStore>, ctx: RequestContext) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                name: name.into(),
                store,
                ctx,
                record: OnceCell::new(),
                changed: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn context(&self) -> &RequestContext {
        &self.inner.ctx
    }

    /// Whether there are changes not yet saved.
    pub fn is_changed(&self) -> bool {
        self.inner.changed.load(Ordering::Acquire)
    }

    /// The shared record, resolving it on first call.
    pub async fn record(&self) -> SharedRecord {
        let inner = &self.inner;
        inner
            .record
            .get_or_init(|| async move {
                match inner.store.get(&inner.ctx, &inner.name).await {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(session = %inner.name, error = %e, "Failed to load session, starting a new one");
                        inner.ctx.register(inner.store.blank(&inner.name))
                    }
                }
            })
            .await
            .clone()
    }

    fn mark_changed(&self) {
        self.inner.changed.store(true, Ordering::Release);
    }

    /// Get a value, deserialized into `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.record().await.lock().await.get(key)
    }

    pub async fn get_value(&self, key: &str) -> Option<Value> {
        self.record().await.lock().await.get_value(key).cloned()
    }

    /// Set a value and save the session.
    ///
    /// A failing save is logged; the value stays set and the session stays
    /// marked as changed.
    pub async fn set<T: Serialize>(&self, key: impl Into<String>, value: T) -> SessionResult<()> {
        self.insert(key, value).await?;
        if let Err(e) = self.save().await {
            warn!(session = %self.inner.name, error = %e, "Failed to save session");
        }
        Ok(())
    }

    /// Set a value without saving.
    pub async fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> SessionResult<()> {
        self.record().await.lock().await.set(key, value)?;
        self.mark_changed();
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Option<Value> {
        let removed = self.record().await.lock().await.remove(key);
        self.mark_changed();
        removed
    }

    /// Remove every value.
    pub async fn clear(&self) {
        let record = self.record().await;
        let mut record = record.lock().await;
        if !record.is_empty() {
            record.clear();
            self.mark_changed();
        }
    }

    /// Append a flash message under `key`, or the default flash key.
    pub async fn add_flash<T: Serialize>(&self, value: T, key: Option<&str>) -> SessionResult<()> {
        self.record().await.lock().await.add_flash(value, key)?;
        self.mark_changed();
        Ok(())
    }

    /// Remove and return the flash messages under `key`.
    pub async fn flashes(&self, key: Option<&str>) -> Vec<Value> {
        let flashes = self.record().await.lock().await.flashes(key);
        self.mark_changed();
        flashes
    }

    /// Replace this session's cookie options.
    pub async fn options(&self, options: CookieOptions) {
        self.record().await.lock().await.options = options;
    }

    /// Save the session if it has unsaved changes.
    pub async fn save(&self) -> SessionResult<()> {
        if !self.is_changed() {
            return Ok(());
        }
        let record = self.record().await;
        let mut record = record.lock().await;
        self.inner.store.save(&self.inner.ctx, &mut record).await?;
        self.inner.changed.store(false, Ordering::Release);
        Ok(())
    }

    /// Session id; empty until the first save.
    pub async fn id(&self) -> String {
        self.record().await.lock().await.id.clone()
    }

    pub async fn is_new(&self) -> bool {
        self.record().await.lock().await.is_new
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.inner.name)
            .field("changed", &self.is_changed())
            .finish()
    }
}
