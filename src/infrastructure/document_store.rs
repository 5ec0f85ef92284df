// Document Store - schema-less documents with field-level array operators
// The single shared mutable resource; every component talks to it through
// the `DocumentStore` trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::AppResult;
use crate::infrastructure::subscriptions::{CollectionCallback, DocumentCallback, Subscription};

pub type Fields = Map<String, Value>;

/// One stored record: its id within the collection plus its fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Field-level mutation applied by `update_fields` / `commit`
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Append each value not already present in the array
    ArrayUnion { field: String, values: Vec<Value> },
    /// Remove every occurrence of each value from the array
    ArrayRemove { field: String, values: Vec<Value> },
    /// Overwrite the field
    Set { field: String, value: Value },
}

impl FieldUpdate {
    pub fn array_union(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldUpdate::ArrayUnion {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    pub fn array_remove(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldUpdate::ArrayRemove {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldUpdate::Set {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Apply to a document's fields. A non-array target becomes an array.
    pub fn apply(&self, fields: &mut Fields) {
        match self {
            FieldUpdate::ArrayUnion { field, values } => {
                let mut array = take_array(fields, field);
                for value in values {
                    if !array.contains(value) {
                        array.push(value.clone());
                    }
                }
                fields.insert(field.clone(), Value::Array(array));
            }
            FieldUpdate::ArrayRemove { field, values } => {
                let mut array = take_array(fields, field);
                array.retain(|existing| !values.contains(existing));
                fields.insert(field.clone(), Value::Array(array));
            }
            FieldUpdate::Set { field, value } => {
                fields.insert(field.clone(), value.clone());
            }
        }
    }
}

fn take_array(fields: &mut Fields, field: &str) -> Vec<Value> {
    match fields.remove(field) {
        Some(Value::Array(array)) => array,
        _ => Vec::new(),
    }
}

/// Updates against one document inside a batch
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    pub collection: String,
    pub id: String,
    pub updates: Vec<FieldUpdate>,
}

/// Multi-document update applied atomically by `DocumentStore::commit`:
/// either every write lands or none does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<DocumentWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(
        mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        updates: Vec<FieldUpdate>,
    ) -> Self {
        self.writes.push(DocumentWrite {
            collection: collection.into(),
            id: id.into(),
            updates,
        });
        self
    }

    pub fn writes(&self) -> &[DocumentWrite] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Distinct `(collection, id)` pairs touched, in first-write order
    pub fn targets(&self) -> Vec<(String, String)> {
        let mut targets: Vec<(String, String)> = Vec::new();
        for write in &self.writes {
            let key = (write.collection.clone(), write.id.clone());
            if !targets.contains(&key) {
                targets.push(key);
            }
        }
        targets
    }

    /// Stage every write on top of `current`, merging repeated targets.
    /// `current` yields the committed fields, or `None` for a missing document.
    pub fn stage<F>(
        &self,
        mut current: F,
    ) -> Result<HashMap<(String, String), Fields>, (String, String)>
    where
        F: FnMut(&str, &str) -> Option<Fields>,
    {
        let mut staged: HashMap<(String, String), Fields> = HashMap::new();
        for write in &self.writes {
            let key = (write.collection.clone(), write.id.clone());
            if !staged.contains_key(&key) {
                let fields = current(&write.collection, &write.id).ok_or_else(|| key.clone())?;
                staged.insert(key.clone(), fields);
            }
            if let Some(fields) = staged.get_mut(&key) {
                for update in &write.updates {
                    update.apply(fields);
                }
            }
        }
        Ok(staged)
    }
}

/// Rank of a JSON value in the store's cross-type ordering
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Apply an order-by clause. Documents without the field are excluded,
/// ties are broken by document id.
pub fn order_documents(documents: Vec<Document>, order_by: Option<&OrderBy>) -> Vec<Document> {
    let Some(order_by) = order_by else {
        let mut documents = documents;
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        return documents;
    };

    let mut documents: Vec<Document> = documents
        .into_iter()
        .filter(|doc| doc.fields.contains_key(&order_by.field))
        .collect();

    documents.sort_by(|a, b| {
        let ordering = match (a.get(&order_by.field), b.get(&order_by.field)) {
            (Some(x), Some(y)) => compare_values(x, y),
            _ => Ordering::Equal,
        }
        .then_with(|| a.id.cmp(&b.id));
        match order_by.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    });
    documents
}

/// Document Store collaborator - the operations this crate consumes
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, collection: &str, id: &str) -> AppResult<Option<Document>>;

    /// Create or replace a document
    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> AppResult<()>;

    async fn query_collection(
        &self,
        collection: &str,
        order_by: Option<&OrderBy>,
    ) -> AppResult<Vec<Document>>;

    /// Atomic multi-document update. Fails with `NotFound` if any target is missing.
    async fn commit(&self, batch: WriteBatch) -> AppResult<()>;

    async fn subscribe_document(
        &self,
        collection: &str,
        id: &str,
        callback: DocumentCallback,
    ) -> AppResult<Subscription>;

    async fn subscribe_collection(
        &self,
        collection: &str,
        callback: CollectionCallback,
    ) -> AppResult<Subscription>;

    /// Single-document update; fails with `NotFound` if the document is missing
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        updates: Vec<FieldUpdate>,
    ) -> AppResult<()> {
        self.commit(WriteBatch::new().update(collection, id, updates))
            .await
    }
}
