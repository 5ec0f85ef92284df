// Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use theory_social::error::{AppError, AppResult};
use theory_social::infrastructure::document_store::{
    Document, DocumentStore, Fields, OrderBy, WriteBatch,
};
use theory_social::infrastructure::subscriptions::{
    CollectionCallback, DocumentCallback, Subscription,
};
use theory_social::infrastructure::{MemoryStore, SqliteStore};
use theory_social::models::UserProfile;

/// Store wrapper that fails selected operations on demand
pub struct FaultyStore {
    inner: Arc<dyn DocumentStore>,
    failing_reads: Mutex<HashSet<String>>,
    fail_queries: AtomicBool,
    fail_commits: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            failing_reads: Mutex::new(HashSet::new()),
            fail_queries: AtomicBool::new(false),
            fail_commits: AtomicBool::new(false),
        }
    }

    pub fn fail_reads_of(&self, id: &str) {
        self.failing_reads.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn unavailable(what: &str) -> AppError {
        AppError::DatabaseError(format!("{} unavailable", what))
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn get_document(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        if self.failing_reads.lock().unwrap().contains(id) {
            return Err(Self::unavailable(id));
        }
        self.inner.get_document(collection, id).await
    }

    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> AppResult<()> {
        self.inner.set_document(collection, id, fields).await
    }

    async fn query_collection(
        &self,
        collection: &str,
        order_by: Option<&OrderBy>,
    ) -> AppResult<Vec<Document>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(Self::unavailable(collection));
        }
        self.inner.query_collection(collection, order_by).await
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Self::unavailable("commit"));
        }
        self.inner.commit(batch).await
    }

    async fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        callback: DocumentCallback,
    ) -> AppResult<Subscription> {
        self.inner.subscribe_document(collection, id, callback).await
    }

    async fn subscribe_collection(
        &self,
        collection: &str,
        callback: CollectionCallback,
    ) -> AppResult<Subscription> {
        self.inner.subscribe_collection(collection, callback).await
    }
}

pub async fn store_with_users(users: Vec<UserProfile>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for user in users {
        store
            .set_document("users", user.uid.as_str(), user.to_fields())
            .await
            .unwrap();
    }
    store
}

/// File-backed sqlite store under `dir`, so the pool really has several connections
pub async fn sqlite_store_with_users(dir: &Path, users: Vec<UserProfile>) -> Arc<SqliteStore> {
    let url = format!("sqlite:{}", dir.join("social.db").display());
    let store = Arc::new(SqliteStore::connect(&url).await.unwrap());
    for user in users {
        store
            .set_document("users", user.uid.as_str(), user.to_fields())
            .await
            .unwrap();
    }
    store
}

pub async fn read_user(store: &dyn DocumentStore, uid: &str) -> UserProfile {
    let doc = store
        .get_document("users", uid)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("user {} missing", uid));
    UserProfile::from_document(&doc)
}
