use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::Uid;
use crate::infrastructure::document_store::{Document, Fields};

pub const USER_ID: &str = "userId";
pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const MEDIA_URL: &str = "mediaUrl";
pub const CREATED_AT: &str = "createdAt";

/// A user-authored theory shown in the activity feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub user_id: Option<Uid>,
    pub title: String,
    pub description: String,
    pub media_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Activity {
    pub fn new(id: impl Into<String>, user_id: impl Into<Uid>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: Some(user_id.into()),
            title: title.into(),
            description: String::new(),
            media_url: None,
            created_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn from_document(doc: &Document) -> Self {
        let text = |field: &str| doc.get(field).and_then(Value::as_str).map(str::to_string);
        Self {
            id: doc.id.clone(),
            user_id: text(USER_ID).filter(|s| !s.is_empty()).map(Uid::from),
            title: text(TITLE).unwrap_or_default(),
            description: text(DESCRIPTION).unwrap_or_default(),
            media_url: text(MEDIA_URL).filter(|s| !s.is_empty()),
            created_at: doc.get(CREATED_AT).and_then(parse_timestamp),
        }
    }

    /// Fields as written by the composition form; `createdAt` is epoch millis
    pub fn to_fields(&self) -> Fields {
        let mut out = Fields::new();
        if let Some(user_id) = &self.user_id {
            out.insert(USER_ID.into(), json!(user_id));
        }
        out.insert(TITLE.into(), json!(self.title));
        out.insert(DESCRIPTION.into(), json!(self.description));
        if let Some(url) = &self.media_url {
            out.insert(MEDIA_URL.into(), json!(url));
        }
        if let Some(at) = self.created_at {
            out.insert(CREATED_AT.into(), json!(at.timestamp_millis()));
        }
        out
    }

    pub fn is_owned_by(&self, uid: &Uid) -> bool {
        self.user_id.as_ref() == Some(uid)
    }
}

/// Accepts epoch millis, RFC 3339 strings and `{ seconds, nanoseconds }` objects
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Object(map) => {
            let seconds = map.get("seconds").and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            Utc.timestamp_opt(seconds, nanos).single()
        }
        _ => None,
    }
}
