// UserProfile - typed view of a schema-less user document
// Decoded leniently: missing or wrongly-typed fields fall back to defaults.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::{Uid, UidSet};
use crate::infrastructure::document_store::{Document, Fields};

/// Document field names on the `users` collection
pub mod fields {
    pub const DISPLAY_NAME: &str = "displayName";
    pub const PHOTO_URL: &str = "photoURL";
    pub const BIO: &str = "bio";
    pub const FRIENDS: &str = "friends";
    pub const FRIEND_REQUESTS: &str = "friendRequests";
    pub const THEORIES_COUNT: &str = "theoriesCount";
    pub const FOLLOWERS_COUNT: &str = "followersCount";
    pub const FOLLOWING_COUNT: &str = "followingCount";
    pub const POSTS_COUNT: &str = "postsCount";
}

pub const DEFAULT_AVATAR: &str = "/default-avatar.png";
pub const NO_BIO: &str = "No bio available";
pub const DEFAULT_ALT_NAME: &str = "User";
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: Uid,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub friends: UidSet,
    pub friend_requests: UidSet,
    pub theories_count: u64,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
}

impl UserProfile {
    pub fn new(uid: impl Into<Uid>) -> Self {
        Self {
            uid: uid.into(),
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    pub fn from_document(doc: &Document) -> Self {
        Self {
            uid: Uid::new(doc.id.clone()),
            display_name: string_field(doc, fields::DISPLAY_NAME),
            photo_url: string_field(doc, fields::PHOTO_URL),
            bio: string_field(doc, fields::BIO),
            friends: uid_set_field(doc, fields::FRIENDS),
            friend_requests: uid_set_field(doc, fields::FRIEND_REQUESTS),
            theories_count: count_field(doc, fields::THEORIES_COUNT),
            followers_count: count_field(doc, fields::FOLLOWERS_COUNT),
            following_count: count_field(doc, fields::FOLLOWING_COUNT),
            posts_count: count_field(doc, fields::POSTS_COUNT),
        }
    }

    /// Fields as written at registration; the uid is the document id, not a field
    pub fn to_fields(&self) -> Fields {
        let mut out = Fields::new();
        if let Some(name) = &self.display_name {
            out.insert(fields::DISPLAY_NAME.into(), json!(name));
        }
        if let Some(url) = &self.photo_url {
            out.insert(fields::PHOTO_URL.into(), json!(url));
        }
        if let Some(bio) = &self.bio {
            out.insert(fields::BIO.into(), json!(bio));
        }
        out.insert(fields::FRIENDS.into(), json!(self.friends));
        out.insert(fields::FRIEND_REQUESTS.into(), json!(self.friend_requests));
        out.insert(fields::THEORIES_COUNT.into(), json!(self.theories_count));
        out.insert(fields::FOLLOWERS_COUNT.into(), json!(self.followers_count));
        out.insert(fields::FOLLOWING_COUNT.into(), json!(self.following_count));
        out.insert(fields::POSTS_COUNT.into(), json!(self.posts_count));
        out
    }

    pub fn avatar_url(&self) -> &str {
        self.photo_url.as_deref().unwrap_or(DEFAULT_AVATAR)
    }

    pub fn bio_text(&self) -> &str {
        self.bio.as_deref().unwrap_or(NO_BIO)
    }

    /// Name used for image alt text
    pub fn alt_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(DEFAULT_ALT_NAME)
    }

    /// Name shown in request and friend lists
    pub fn list_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(UNKNOWN_NAME)
    }

    pub fn stats(&self) -> UserStats {
        UserStats {
            theories: self.theories_count,
            followers: self.followers_count,
            following: self.following_count,
            posts: self.posts_count,
        }
    }

    pub fn is_friend(&self, uid: &Uid) -> bool {
        self.friends.contains(uid)
    }

    pub fn has_request_from(&self, uid: &Uid) -> bool {
        self.friend_requests.contains(uid)
    }
}

/// Denormalized counters shown on a profile header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub theories: u64,
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
}

/// A uid resolved to a display name for request and friend lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedUser {
    pub id: Uid,
    pub display_name: String,
}

fn string_field(doc: &Document, field: &str) -> Option<String> {
    doc.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn count_field(doc: &Document, field: &str) -> u64 {
    match doc.get(field) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

fn uid_set_field(doc: &Document, field: &str) -> UidSet {
    doc.get(field)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(Uid::from)
                .collect()
        })
        .unwrap_or_default()
}
