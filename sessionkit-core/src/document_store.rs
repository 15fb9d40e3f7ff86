//! Document-backed session store.
//!
//! Each session is one document keyed by an ObjectId whose hex form is the
//! session id. Values are encoded with the store's codecs into `data`.

use crate::config::DocumentStoreConfig;
use crate::context::RequestContext;
use crate::error::{SessionError, SessionResult};
use crate::options::CookieOptions;
use crate::record::SessionRecord;
use crate::traits::SessionStore;
use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sessionkit_securecookie::CodecSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Session value that overrides the stored `modified` timestamp.
pub const MODIFIED_KEY: &str = "modified";

/// Stored form of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub data: String,
    pub modified: bson::DateTime,
}

/// Document collection holding [`SessionDocument`]s.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Create a sparse TTL index on `modified`.
    async fn ensure_ttl_index(&self, expire_after: Duration) -> SessionResult<()>;

    async fn find_by_id(&self, id: ObjectId) -> SessionResult<Option<SessionDocument>>;

    /// Insert or replace the document with the same id.
    async fn upsert(&self, document: SessionDocument) -> SessionResult<()>;

    async fn remove(&self, id: ObjectId) -> SessionResult<()>;

    async fn close(&self) -> SessionResult<()> {
        Ok(())
    }
}

/// In-process [`DocumentBackend`].
#[derive(Debug, Default)]
pub struct MemoryDocuments {
    documents: Mutex<HashMap<ObjectId, SessionDocument>>,
    ttl_index: Mutex<Option<Duration>>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }

    pub fn document(&self, id: &ObjectId) -> Option<SessionDocument> {
        self.documents.lock().get(id).cloned()
    }

    /// Expiry of the TTL index, if one was created.
    pub fn ttl_index(&self) -> Option<Duration> {
        *self.ttl_index.lock()
    }
}

#[async_trait]
impl DocumentBackend for MemoryDocuments {
    async fn ensure_ttl_index(&self, expire_after: Duration) -> SessionResult<()> {
        *self.ttl_index.lock() = Some(expire_after);
        Ok(())
    }

    async fn find_by_id(&self, id: ObjectId) -> SessionResult<Option<SessionDocument>> {
        Ok(self.documents.lock().get(&id).cloned())
    }

    async fn upsert(&self, document: SessionDocument) -> SessionResult<()> {
        self.documents.lock().insert(document.id, document);
        Ok(())
    }

    async fn remove(&self, id: ObjectId) -> SessionResult<()> {
        self.documents.lock().remove(&id);
        Ok(())
    }
}

/// Session store keeping one document per session.
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
    codecs: RwLock<CodecSet>,
    options: RwLock<CookieOptions>,
}

impl DocumentStore {
    /// Store sessions in `config.database`.`config.collection`.
    #[cfg(feature = "mongodb")]
    pub async fn connect(client: mongodb::Client, config: DocumentStoreConfig) -> SessionResult<Self> {
        let backend =
            crate::mongo_backend::MongoBackend::new(client, &config.database, &config.collection);
        Self::with_backend(Arc::new(backend), config).await
    }

    /// Build a store over an existing backend.
    ///
    /// A failure to create the TTL index is logged and does not prevent
    /// construction.
    pub async fn with_backend(
        backend: Arc<dyn DocumentBackend>,
        config: DocumentStoreConfig,
    ) -> SessionResult<Self> {
        let mut codecs = CodecSet::from_pairs(&config.key_pairs)
            .map_err(|e| SessionError::Config(e.to_string()))?;
        codecs.set_max_age(config.max_age);

        if config.ensure_ttl {
            let expire_after = Duration::from_secs(config.max_age.max(0) as u64);
            if let Err(e) = backend.ensure_ttl_index(expire_after).await {
                warn!(error = %e, "Failed to create TTL index on sessions");
            }
        }

        info!(
            database = %config.database,
            collection = %config.collection,
            max_age = config.max_age,
            "Document session store ready"
        );

        Ok(Self {
            backend,
            codecs: RwLock::new(codecs),
            options: RwLock::new(CookieOptions::default().with_max_age(config.max_age)),
        })
    }

    /// Set the cookie `max_age` for new sessions and the codecs' max age.
    pub fn set_max_age(&self, seconds: i64) {
        self.options.write().max_age = seconds;
        self.codecs.write().set_max_age(seconds);
    }

    pub async fn close(&self) -> SessionResult<()> {
        self.backend.close().await
    }

    async fn load(&self, record: &mut SessionRecord) -> SessionResult<()> {
        let id = object_id(&record.id)?;
        let document = self
            .backend
            .find_by_id(id)
            .await?
            .ok_or_else(|| SessionError::NotFound(record.id.clone()))?;
        let values: HashMap<String, Value> = self.codecs.read().decode(record.name(), &document.data)?;
        record.values = values;
        Ok(())
    }

    async fn upsert(&self, record: &SessionRecord) -> SessionResult<()> {
        let id = object_id(&record.id)?;
        let modified = modified_time(&record.values)?;
        let data = self.codecs.read().encode(record.name(), &record.values)?;
        self.backend
            .upsert(SessionDocument {
                id,
                data,
                modified: bson::DateTime::from_millis(modified.timestamp_millis()),
            })
            .await
    }
}

fn object_id(id: &str) -> SessionResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| SessionError::InvalidSessionId(id.to_string()))
}

/// The `modified` value if present, otherwise now.
fn modified_time(values: &HashMap<String, Value>) -> SessionResult<DateTime<Utc>> {
    match values.get(MODIFIED_KEY) {
        None => Ok(Utc::now()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|_| {
            SessionError::InvalidValue(format!(
                "{MODIFIED_KEY} must be an RFC 3339 timestamp, got {value}"
            ))
        }),
    }
}

#[async_trait]
impl SessionStore for DocumentStore {
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

        let decoded = self.codecs.read().decode::<String>(name, cookie);
        match decoded {
            Ok(id) => record.id = id,
            Err(e) => {
                debug!(session = name, error = %e, "Ignoring undecodable session cookie");
                return Ok(record);
            }
        }

        match self.load(&mut record).await {
            Ok(()) => {
                record.is_new = false;
                Ok(record)
            }
            Err(e) => {
                debug!(session = name, error = %e, "Session could not be loaded");
                Ok(self.blank(name))
            }
        }
    }

    async fn save(&self, ctx: &RequestContext, record: &mut SessionRecord) -> SessionResult<()> {
        if record.options.is_delete() {
            if !record.id.is_empty() {
                self.backend.remove(object_id(&record.id)?).await?;
                debug!(session = record.name(), "Session deleted");
            }
            ctx.set_cookie(record.options.to_cookie(record.name(), ""));
            return Ok(());
        }

        if record.id.is_empty() {
            record.id = ObjectId::new().to_hex();
        }

        self.upsert(record).await?;

        let encoded = self.codecs.read().encode(record.name(), &record.id)?;
        ctx.set_cookie(record.options.to_cookie(record.name(), &encoded));
        Ok(())
    }
}
