use serde::{Deserialize, Serialize};

use crate::core::Uid;
use crate::models::user::{UserProfile, DEFAULT_AVATAR};

/// A friend shown in the direct-message contact list; derived, never stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub uid: Uid,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl Contact {
    pub fn avatar_url(&self) -> &str {
        self.photo_url.as_deref().unwrap_or(DEFAULT_AVATAR)
    }
}

impl From<&UserProfile> for Contact {
    fn from(user: &UserProfile) -> Self {
        Self {
            uid: user.uid.clone(),
            display_name: user.display_name.clone(),
            photo_url: user.photo_url.clone(),
        }
    }
}
