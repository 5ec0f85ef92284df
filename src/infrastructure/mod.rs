// Infrastructure - document store backends, subscriptions, session and request context

pub mod document_store;        // DocumentStore trait, field updates, write batches
pub mod memory_store;          // In-process backend
pub mod sqlite_store;          // sqlx-backed persistent backend
pub mod subscriptions;         // Snapshot listeners and unsubscribe handles
pub mod session;               // Identity provider
pub mod viewer;                // Viewer context
pub mod middleware;            // axum extractors

pub use document_store::{Document, DocumentStore, FieldUpdate, Fields, OrderBy, WriteBatch};
pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;
pub use session::{Session, SessionProvider};
pub use subscriptions::Subscription;
pub use viewer::ViewerContext;
