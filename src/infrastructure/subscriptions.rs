// Snapshot subscriptions - publish/subscribe with explicit unsubscribe handles
//
// Listeners are invoked synchronously on the writer's task once the write is
// committed. Every delivery carries the store version the snapshot was taken
// at; a listener never observes a snapshot older than one it already saw.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;
use uuid::Uuid;

use crate::infrastructure::document_store::Document;

/// Callback for document-level subscriptions; `None` when the document is absent
pub type DocumentCallback = Box<dyn Fn(Option<&Document>) + Send + Sync>;

/// Callback for collection-level subscriptions; receives the full matching set
pub type CollectionCallback = Box<dyn Fn(&[Document]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle returned by every subscribe call. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        active: Arc<AtomicBool>,
        cancel: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            active,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop receiving notifications. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
        trace!(subscription = %self.id, "subscription released");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A registered callback plus its delivery gate
pub struct Listener<C> {
    active: Arc<AtomicBool>,
    last_version: Mutex<u64>,
    callback: C,
}

impl<C> Listener<C> {
    fn new(callback: C) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
            last_version: Mutex::new(0),
            callback,
        }
    }

    fn deliver_with(&self, version: u64, call: impl FnOnce(&C)) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let mut last = lock(&self.last_version);
        if version < *last {
            trace!(version, last = *last, "dropping stale snapshot");
            return;
        }
        *last = version;
        call(&self.callback);
    }
}

pub type DocumentListener = Listener<DocumentCallback>;
pub type CollectionListener = Listener<CollectionCallback>;

impl DocumentListener {
    pub fn deliver(&self, version: u64, document: Option<&Document>) {
        self.deliver_with(version, |callback| callback(document));
    }
}

impl CollectionListener {
    pub fn deliver(&self, version: u64, documents: &[Document]) {
        self.deliver_with(version, |callback| callback(documents));
    }
}

#[derive(Default)]
struct RegistryInner {
    documents: HashMap<SubscriptionId, (String, String, Arc<DocumentListener>)>,
    collections: HashMap<SubscriptionId, (String, Arc<CollectionListener>)>,
}

/// Listeners a committed write has to notify
#[derive(Default)]
pub struct Interest {
    pub documents: Vec<(String, String, Arc<DocumentListener>)>,
    pub collections: Vec<(String, Arc<CollectionListener>)>,
}

impl Interest {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.collections.is_empty()
    }

    /// Hand each listener its snapshot. `documents` is parallel to `self.documents`,
    /// `collections` is keyed by collection name.
    pub fn deliver(
        &self,
        version: u64,
        documents: &[Option<Document>],
        collections: &HashMap<String, Vec<Document>>,
    ) {
        for ((_, _, listener), document) in self.documents.iter().zip(documents) {
            listener.deliver(version, document.as_ref());
        }
        for (collection, listener) in &self.collections {
            let snapshot = collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);
            listener.deliver(version, snapshot);
        }
    }
}

/// Listener registry shared by the store implementations
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document_listener(
        &self,
        collection: &str,
        id: &str,
        callback: DocumentCallback,
    ) -> (Subscription, Arc<DocumentListener>) {
        let listener = Arc::new(Listener::new(callback));
        let sub_id = SubscriptionId::new();
        lock(&self.inner).documents.insert(
            sub_id,
            (collection.to_string(), id.to_string(), Arc::clone(&listener)),
        );
        (self.handle(sub_id, &listener.active), listener)
    }

    pub fn add_collection_listener(
        &self,
        collection: &str,
        callback: CollectionCallback,
    ) -> (Subscription, Arc<CollectionListener>) {
        let listener = Arc::new(Listener::new(callback));
        let sub_id = SubscriptionId::new();
        lock(&self.inner)
            .collections
            .insert(sub_id, (collection.to_string(), Arc::clone(&listener)));
        (self.handle(sub_id, &listener.active), listener)
    }

    fn handle(&self, id: SubscriptionId, active: &Arc<AtomicBool>) -> Subscription {
        let registry = Arc::downgrade(&self.inner);
        Subscription::new(id, Arc::clone(active), move || {
            if let Some(inner) = registry.upgrade() {
                let mut inner = lock(&inner);
                inner.documents.remove(&id);
                inner.collections.remove(&id);
            }
        })
    }

    /// Listeners watching any of the changed `(collection, id)` pairs
    pub fn interest(&self, changed: &[(String, String)]) -> Interest {
        let inner = lock(&self.inner);
        let mut interest = Interest::default();

        for (collection, id, listener) in inner.documents.values() {
            if changed.iter().any(|(c, i)| c == collection && i == id) {
                interest
                    .documents
                    .push((collection.clone(), id.clone(), Arc::clone(listener)));
            }
        }
        for (collection, listener) in inner.collections.values() {
            if changed.iter().any(|(c, _)| c == collection) {
                interest.collections.push((collection.clone(), Arc::clone(listener)));
            }
        }
        interest
    }

    pub fn listener_count(&self) -> usize {
        let inner = lock(&self.inner);
        inner.documents.len() + inner.collections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_listener(
        registry: &SubscriberRegistry,
        hits: &Arc<AtomicUsize>,
    ) -> (Subscription, Arc<DocumentListener>) {
        let hits = Arc::clone(hits);
        registry.add_document_listener(
            "users",
            "alice",
            Box::new(move |_: Option<&Document>| {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_stale_versions_are_dropped() {
        let registry = SubscriberRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let (_sub, listener) = counting_listener(&registry, &hits);

        listener.deliver(5, None);
        listener.deliver(3, None);
        listener.deliver(5, None);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_unregisters_and_silences() {
        let registry = SubscriberRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let (sub, listener) = counting_listener(&registry, &hits);
        assert_eq!(registry.listener_count(), 1);
        assert!(sub.is_active());

        sub.unsubscribe();
        assert_eq!(registry.listener_count(), 0);

        listener.deliver(1, None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_interest_matches_collection_and_document() {
        let registry = SubscriberRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let (_doc_sub, _) = counting_listener(&registry, &hits);
        let (_col_sub, _) =
            registry.add_collection_listener("users", Box::new(|_: &[Document]| {}));

        let interest = registry.interest(&[("users".to_string(), "bob".to_string())]);
        assert_eq!(interest.documents.len(), 0);
        assert_eq!(interest.collections.len(), 1);

        let interest = registry.interest(&[("users".to_string(), "alice".to_string())]);
        assert_eq!(interest.documents.len(), 1);

        let interest = registry.interest(&[("theories".to_string(), "alice".to_string())]);
        assert!(interest.is_empty());
    }
}
