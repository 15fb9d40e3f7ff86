//! MongoDB implementation of [`DocumentBackend`].

use crate::document_store::{DocumentBackend, SessionDocument};
use crate::error::SessionResult;
use async_trait::async_trait;
use bson::oid::ObjectId;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use std::time::Duration;
use tracing::info;

/// Sessions collection accessed through a shared [`Client`].
///
/// Every operation runs in its own client session.
#[derive(Debug, Clone)]
pub struct MongoBackend {
    client: Client,
    database: String,
    collection: String,
}

impl MongoBackend {
    pub fn new(client: Client, database: &str, collection: &str) -> Self {
        Self {
            client,
            database: database.to_string(),
            collection: collection.to_string(),
        }
    }

    fn collection(&self) -> Collection<SessionDocument> {
        self.client
            .database(&self.database)
            .collection(&self.collection)
    }
}

#[async_trait]
impl DocumentBackend for MongoBackend {
    async fn ensure_ttl_index(&self, expire_after: Duration) -> SessionResult<()> {
        let options = IndexOptions::builder()
            .background(true)
            .sparse(true)
            .expire_after(expire_after)
            .build();
        let index = IndexModel::builder()
            .keys(doc! { "modified": 1 })
            .options(options)
            .build();

        self.collection().create_index(index).await?;
        info!(
            collection = %self.collection,
            expire_after_secs = expire_after.as_secs(),
            "TTL index ensured"
        );
        Ok(())
    }

    async fn find_by_id(&self, id: ObjectId) -> SessionResult<Option<SessionDocument>> {
        let mut session = self.client.start_session().await?;
        let document = self
            .collection()
            .find_one(doc! { "_id": id })
            .session(&mut session)
            .await?;
        Ok(document)
    }

    async fn upsert(&self, document: SessionDocument) -> SessionResult<()> {
        let mut session = self.client.start_session().await?;
        self.collection()
            .replace_one(doc! { "_id": document.id }, &document)
            .upsert(true)
            .session(&mut session)
            .await?;
        Ok(())
    }

    async fn remove(&self, id: ObjectId) -> SessionResult<()> {
        let mut session = self.client.start_session().await?;
        self.collection()
            .delete_one(doc! { "_id": id })
            .session(&mut session)
            .await?;
        Ok(())
    }

    async fn close(&self) -> SessionResult<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentStoreConfig;
    use crate::context::RequestContext;
    use crate::document_store::DocumentStore;
    use crate::traits::SessionStore;
    use sessionkit_securecookie::KeyPair;

    #[tokio::test]
    #[ignore = "requires a running MongoDB server"]
    async fn test_round_trip_against_mongodb() {
        let client = Client::with_uri_str("mongodb://localhost:27017").await.unwrap();
        let config = DocumentStoreConfig::new(3600, true, vec![KeyPair::new(b"k".to_vec())]);
        let store = DocumentStore::connect(client, config).await.unwrap();

        let ctx = RequestContext::new();
        let mut record = store.new_session(&ctx, "sid").await.unwrap();
        record.set("n", 1).unwrap();
        store.save(&ctx, &mut record).await.unwrap();

        let cookie = ctx.response_cookies().pop().unwrap();
        let next = RequestContext::from_cookies([("sid", cookie.value().to_string())]);
        let loaded = store.new_session(&next, "sid").await.unwrap();
        assert_eq!(loaded.get::<i32>("n"), Some(1));

        record.options.max_age = -1;
        store.save(&ctx, &mut record).await.unwrap();
        store.close().await.unwrap();
    }
}
