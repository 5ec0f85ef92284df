use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::core::current_time_millis;
use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{
    order_documents, Document, DocumentStore, Fields, OrderBy, WriteBatch,
};
use crate::infrastructure::subscriptions::{
    CollectionCallback, DocumentCallback, SubscriberRegistry, Subscription,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite implementation of the document store; each document is one JSON row
pub struct SqliteStore {
    pool: SqlitePool,
    registry: SubscriberRegistry,
    version: AtomicU64,
    /// Held for every write. SQLite fails a deferred read-then-write
    /// transaction with SQLITE_BUSY rather than waiting for another writer.
    writer: Mutex<()>,
}

impl SqliteStore {
    /// Open (creating if missing) a file-backed database, e.g. `sqlite:data/social.db`
    pub async fn connect(url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e)))?;

        let store = Self::with_pool(pool);
        store.initialize().await?;
        info!(url, "sqlite document store ready");
        Ok(store)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        // A single connection that never recycles; every connection to
        // `sqlite::memory:` would otherwise see its own empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e))
            })?;

        let store = Self::with_pool(pool);
        store.initialize().await?;
        Ok(store)
    }

    fn with_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            registry: SubscriberRegistry::new(),
            version: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    /// Create the documents table if it does not exist
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                time_updated INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create documents table: {}", e)))?;

        Ok(())
    }

    async fn fetch_document(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!(
                    "Failed to get document {}/{}: {}",
                    collection, id, e
                ))
            })?;

        match row {
            Some(row) => {
                let data: String = row.get("data");
                Ok(Some(Document::new(id, serde_json::from_str(&data)?)))
            }
            None => Ok(None),
        }
    }

    async fn fetch_collection(&self, collection: &str) -> AppResult<Vec<Document>> {
        let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = ? ORDER BY id")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to query collection {}: {}", collection, e))
            })?;

        rows.into_iter()
            .map(|row| -> AppResult<Document> {
                let id: String = row.get("id");
                let data: String = row.get("data");
                Ok(Document::new(id, serde_json::from_str(&data)?))
            })
            .collect()
    }

    async fn publish(&self, changed: &[(String, String)]) -> AppResult<()> {
        let interest = self.registry.interest(changed);
        if interest.is_empty() {
            return Ok(());
        }

        let version = self.version.load(Ordering::SeqCst);
        let mut documents = Vec::with_capacity(interest.documents.len());
        for (collection, id, _) in &interest.documents {
            documents.push(self.fetch_document(collection, id).await?);
        }
        let mut collections: HashMap<String, Vec<Document>> = HashMap::new();
        for (collection, _) in &interest.collections {
            if !collections.contains_key(collection) {
                let snapshot = self.fetch_collection(collection).await?;
                collections.insert(collection.clone(), snapshot);
            }
        }

        interest.deliver(version, &documents, &collections);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_document(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        self.fetch_document(collection, id).await
    }

    #[instrument(skip(self, fields))]
    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> AppResult<()> {
        let data = serde_json::to_string(&fields)?;
        let writer = self.writer.lock().await;
        sqlx::query(
            "INSERT INTO documents (collection, id, data, time_updated) VALUES (?, ?, ?, ?) \
             ON CONFLICT(collection, id) DO UPDATE \
             SET data = excluded.data, time_updated = excluded.time_updated",
        )
        .bind(collection)
        .bind(id)
        .bind(data)
        .bind(current_time_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(format!(
                "Failed to set document {}/{}: {}",
                collection, id, e
            ))
        })?;

        self.version.fetch_add(1, Ordering::SeqCst);
        drop(writer);
        self.publish(&[(collection.to_string(), id.to_string())]).await
    }

    async fn query_collection(
        &self,
        collection: &str,
        order_by: Option<&OrderBy>,
    ) -> AppResult<Vec<Document>> {
        let documents = self.fetch_collection(collection).await?;
        Ok(order_documents(documents, order_by))
    }

    #[instrument(skip(self, batch), fields(writes = batch.writes().len()))]
    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let targets = batch.targets();
        let writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to begin transaction: {}", e))
        })?;

        let mut current: HashMap<(String, String), Fields> = HashMap::new();
        for (collection, id) in &targets {
            let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(row) = row {
                let data: String = row.get("data");
                current.insert((collection.clone(), id.clone()), serde_json::from_str(&data)?);
            }
        }

        let staged = batch
            .stage(|collection, id| current.get(&(collection.to_string(), id.to_string())).cloned())
            .map_err(|(collection, id)| {
                AppError::NotFound(format!("document {}/{} does not exist", collection, id))
            })?;

        let now = current_time_millis();
        for ((collection, id), fields) in staged {
            sqlx::query(
                "UPDATE documents SET data = ?, time_updated = ? WHERE collection = ? AND id = ?",
            )
                .bind(serde_json::to_string(&fields)?)
                .bind(now)
                .bind(&collection)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit batch: {}", e)))?;
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(version, "batch committed");
        drop(writer);

        self.publish(&targets).await
    }

    async fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        callback: DocumentCallback,
    ) -> AppResult<Subscription> {
        let (subscription, listener) =
            self.registry.add_document_listener(collection, id, callback);
        let version = self.version.load(Ordering::SeqCst);
        let document = self.fetch_document(collection, id).await?;
        listener.deliver(version, document.as_ref());
        Ok(subscription)
    }

    async fn subscribe_collection(
        &self,
        collection: &str,
        callback: CollectionCallback,
    ) -> AppResult<Subscription> {
        let (subscription, listener) = self.registry.add_collection_listener(collection, callback);
        let version = self.version.load(Ordering::SeqCst);
        let documents = self.fetch_collection(collection).await?;
        listener.deliver(version, &documents);
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::document_store::FieldUpdate;
    use serde_json::json;
    use std::sync::{Arc, Mutex as StdMutex};

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_sqlite_round_trips_documents() {
        let store = SqliteStore::new_in_memory().await.unwrap();
        store
            .set_document(
                "users",
                "alice",
                fields(json!({ "displayName": "Alice", "friends": [] })),
            )
            .await
            .unwrap();
        store
            .update_fields("users", "alice", vec![FieldUpdate::array_union("friends", "bob")])
            .await
            .unwrap();

        let doc = store.get_document("users", "alice").await.unwrap().unwrap();
        assert_eq!(doc.get("friends"), Some(&json!(["bob"])));
        assert_eq!(doc.get("displayName"), Some(&json!("Alice")));
    }

    #[tokio::test]
    async fn test_sqlite_batch_rolls_back_on_missing_target() {
        let store = SqliteStore::new_in_memory().await.unwrap();
        store.set_document("users", "a", fields(json!({ "friends": [] }))).await.unwrap();

        let batch = WriteBatch::new()
            .update("users", "a", vec![FieldUpdate::array_union("friends", "b")])
            .update("users", "b", vec![FieldUpdate::array_union("friends", "a")]);
        let err = store.commit(batch).await.unwrap_err();
        assert!(err.is_not_found());

        let a = store.get_document("users", "a").await.unwrap().unwrap();
        assert_eq!(a.get("friends"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_sqlite_file_store_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("social.db").display());

        {
            let store = SqliteStore::connect(&url).await.unwrap();
            store.set_document("theories", "t1", fields(json!({ "createdAt": 1 }))).await.unwrap();
        }

        let store = SqliteStore::connect(&url).await.unwrap();
        let docs = store
            .query_collection("theories", Some(&OrderBy::desc("createdAt")))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "t1");
    }

    #[tokio::test]
    async fn test_sqlite_concurrent_commits_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("social.db").display());
        let store = Arc::new(SqliteStore::connect(&url).await.unwrap());
        store.set_document("users", "a", fields(json!({ "friends": [] }))).await.unwrap();
        store.set_document("users", "b", fields(json!({ "friends": [] }))).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let batch = WriteBatch::new()
                    .update("users", "a", vec![FieldUpdate::array_union("friends", i)])
                    .update("users", "b", vec![FieldUpdate::array_union("friends", -i)]);
                store.commit(batch).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let a = store.get_document("users", "a").await.unwrap().unwrap();
        assert_eq!(a.get("friends").and_then(|v| v.as_array()).map(Vec::len), Some(20));
    }

    #[tokio::test]
    async fn test_sqlite_subscriptions_deliver_until_dropped() {
        let store = SqliteStore::new_in_memory().await.unwrap();
        store.set_document("users", "a", fields(json!({ "friends": [] }))).await.unwrap();

        let seen_doc: Arc<StdMutex<Vec<Option<serde_json::Value>>>> = Arc::default();
        let seen_all: Arc<StdMutex<Vec<usize>>> = Arc::default();
        let doc_sink = Arc::clone(&seen_doc);
        let all_sink = Arc::clone(&seen_all);

        let doc_sub = store
            .subscribe_document(
                "users",
                "a",
                Box::new(move |doc: Option<&Document>| {
                    doc_sink
                        .lock()
                        .unwrap()
                        .push(doc.and_then(|d| d.get("friends").cloned()));
                }),
            )
            .await
            .unwrap();
        let all_sub = store
            .subscribe_collection(
                "users",
                Box::new(move |docs: &[Document]| all_sink.lock().unwrap().push(docs.len())),
            )
            .await
            .unwrap();

        store
            .update_fields("users", "a", vec![FieldUpdate::array_union("friends", "b")])
            .await
            .unwrap();
        store.set_document("users", "b", fields(json!({ "friends": [] }))).await.unwrap();

        assert_eq!(*seen_doc.lock().unwrap(), vec![Some(json!([])), Some(json!(["b"]))]);
        assert_eq!(*seen_all.lock().unwrap(), vec![1, 1, 2]);

        drop(doc_sub);
        all_sub.unsubscribe();
        assert_eq!(store.registry.listener_count(), 0);

        store
            .update_fields("users", "a", vec![FieldUpdate::array_union("friends", "c")])
            .await
            .unwrap();
        assert_eq!(seen_doc.lock().unwrap().len(), 2);
        assert_eq!(seen_all.lock().unwrap().len(), 3);
    }
}
