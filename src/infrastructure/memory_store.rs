// In-memory document store - nested maps behind a tokio RwLock
// Used by tests and the default server backend.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{
    order_documents, Document, DocumentStore, Fields, OrderBy, WriteBatch,
};
use crate::infrastructure::subscriptions::{
    CollectionCallback, DocumentCallback, SubscriberRegistry, Subscription,
};

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    /// Bumped on every committed write
    version: u64,
}

impl MemoryState {
    fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone()))
    }

    fn collection(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    registry: SubscriberRegistry,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.listener_count()
    }

    /// Notify listeners of the changed documents with a fresh snapshot
    async fn publish(&self, changed: &[(String, String)]) {
        let interest = self.registry.interest(changed);
        if interest.is_empty() {
            return;
        }

        let (version, documents, collections) = {
            let state = self.state.read().await;
            let documents: Vec<Option<Document>> = interest
                .documents
                .iter()
                .map(|(collection, id, _)| state.document(collection, id))
                .collect();
            let mut collections: HashMap<String, Vec<Document>> = HashMap::new();
            for (collection, _) in &interest.collections {
                collections
                    .entry(collection.clone())
                    .or_insert_with(|| state.collection(collection));
            }
            (state.version, documents, collections)
        };

        interest.deliver(version, &documents, &collections);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        Ok(self.state.read().await.document(collection, id))
    }

    #[instrument(skip(self, fields))]
    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> AppResult<()> {
        {
            let mut state = self.state.write().await;
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), fields);
            state.version += 1;
        }
        self.publish(&[(collection.to_string(), id.to_string())]).await;
        Ok(())
    }

    async fn query_collection(
        &self,
        collection: &str,
        order_by: Option<&OrderBy>,
    ) -> AppResult<Vec<Document>> {
        let documents = self.state.read().await.collection(collection);
        Ok(order_documents(documents, order_by))
    }

    #[instrument(skip(self, batch), fields(writes = batch.writes().len()))]
    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let targets = batch.targets();
        {
            let mut state = self.state.write().await;
            let staged = batch
                .stage(|collection, id| {
                    state
                        .collections
                        .get(collection)
                        .and_then(|docs| docs.get(id))
                        .cloned()
                })
                .map_err(|(collection, id)| {
                    AppError::NotFound(format!("document {}/{} does not exist", collection, id))
                })?;

            for ((collection, id), fields) in staged {
                state
                    .collections
                    .entry(collection)
                    .or_default()
                    .insert(id, fields);
            }
            state.version += 1;
            debug!(version = state.version, "batch committed");
        }
        self.publish(&targets).await;
        Ok(())
    }

    async fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        callback: DocumentCallback,
    ) -> AppResult<Subscription> {
        let (subscription, listener) =
            self.registry.add_document_listener(collection, id, callback);
        let (version, document) = {
            let state = self.state.read().await;
            (state.version, state.document(collection, id))
        };
        listener.deliver(version, document.as_ref());
        Ok(subscription)
    }

    async fn subscribe_collection(
        &self,
        collection: &str,
        callback: CollectionCallback,
    ) -> AppResult<Subscription> {
        let (subscription, listener) = self.registry.add_collection_listener(collection, callback);
        let (version, documents) = {
            let state = self.state.read().await;
            (state.version, state.collection(collection))
        };
        listener.deliver(version, &documents);
        Ok(subscription)
    }
}
