// Profile Loader - one user document plus that user's theories, as view state
//
// Read failures never escape `load_profile`: they are logged and the view
// degrades to defaults, the same way the profile pages render.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument, warn};

use crate::config::CollectionConfig;
use crate::core::Uid;
use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{DocumentStore, OrderBy};
use crate::infrastructure::viewer::ViewerContext;
use crate::models::activity::{self, Activity};
use crate::models::user::{DEFAULT_ALT_NAME, DEFAULT_AVATAR, NO_BIO};
use crate::models::{NamedUser, UserProfile, UserStats};
use crate::services::relationship_manager::RelationshipManager;

pub const NO_THEORIES: &str = "No theories found.";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub user: Option<UserProfile>,
    pub stats: UserStats,
    pub activities: Vec<Activity>,
}

impl ProfileView {
    pub fn is_found(&self) -> bool {
        self.user.is_some()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.display_name.as_deref())
    }

    pub fn avatar_url(&self) -> &str {
        self.user.as_ref().map_or(DEFAULT_AVATAR, UserProfile::avatar_url)
    }

    pub fn alt_name(&self) -> &str {
        self.user.as_ref().map_or(DEFAULT_ALT_NAME, UserProfile::alt_name)
    }

    pub fn bio_text(&self) -> &str {
        self.user.as_ref().map_or(NO_BIO, UserProfile::bio_text)
    }

    /// Placeholder shown instead of an empty feed
    pub fn empty_feed_message(&self) -> Option<&'static str> {
        self.activities.is_empty().then_some(NO_THEORIES)
    }
}

/// The signed-in user's own dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub profile: ProfileView,
    pub friend_requests: Vec<NamedUser>,
    pub friends: Vec<NamedUser>,
}

/// Someone else's profile as the viewer sees it. `request_sent` lives only as
/// long as the page does; reloading starts from `false` again.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfilePage {
    pub profile: ProfileView,
    pub request_sent: bool,
}

impl PublicProfilePage {
    pub fn new(profile: ProfileView) -> Self {
        Self {
            profile,
            request_sent: false,
        }
    }

    /// Send a friend request to the profile owner; the flag is set only on success
    pub async fn send_friend_request(
        &mut self,
        viewer: &ViewerContext,
        relationships: &RelationshipManager,
    ) -> AppResult<()> {
        let target = match &self.profile.user {
            Some(user) => user.uid.clone(),
            None => {
                return Err(AppError::NotFound("profile has no user".to_string()));
            }
        };
        relationships.send_friend_request(viewer, &target).await?;
        self.request_sent = true;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ProfileLoader {
    store: Arc<dyn DocumentStore>,
    collections: CollectionConfig,
}

impl ProfileLoader {
    pub fn new(store: Arc<dyn DocumentStore>, collections: CollectionConfig) -> Self {
        Self { store, collections }
    }

    /// One document read; `None` when the user does not exist
    pub async fn fetch_user(&self, uid: &Uid) -> AppResult<Option<UserProfile>> {
        let doc = self
            .store
            .get_document(&self.collections.users, uid.as_str())
            .await?;
        Ok(doc.as_ref().map(UserProfile::from_document))
    }

    /// Theories newest first, restricted to those owned by `uid`
    pub async fn fetch_user_activities(&self, uid: &Uid) -> AppResult<Vec<Activity>> {
        let order = OrderBy::desc(activity::CREATED_AT);
        let docs = self
            .store
            .query_collection(&self.collections.theories, Some(&order))
            .await?;

        // The store orders raw values; timestamps written as millis, RFC 3339
        // strings or {seconds, nanoseconds} objects only compare once decoded.
        let mut activities: Vec<Activity> = docs
            .iter()
            .map(Activity::from_document)
            .filter(|a| a.is_owned_by(uid))
            .collect();
        activities.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(activities)
    }

    #[instrument(skip(self), fields(uid = %uid))]
    pub async fn load_profile(&self, uid: &Uid) -> ProfileView {
        let (user, activities) =
            futures::join!(self.fetch_user(uid), self.fetch_user_activities(uid));

        let user = match user {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                warn!("User does not exist");
                None
            }
            Err(e) => {
                error!("Error fetching user data: {}", e);
                None
            }
        };
        let activities = activities.unwrap_or_else(|e| {
            error!("Error fetching user activities: {}", e);
            Vec::new()
        });

        ProfileView {
            stats: user.as_ref().map(UserProfile::stats).unwrap_or_default(),
            user,
            activities,
        }
    }

    /// Profile, pending requests and friends for the viewer, each part
    /// degrading on its own
    #[instrument(skip(self, viewer, relationships), fields(uid = %viewer.uid))]
    pub async fn load_dashboard(
        &self,
        viewer: &ViewerContext,
        relationships: &RelationshipManager,
    ) -> DashboardView {
        let (profile, lists) = futures::join!(
            self.load_profile(&viewer.uid),
            relationships.load_relationships(&viewer.uid)
        );

        DashboardView {
            profile,
            friend_requests: lists.friend_requests,
            friends: lists.friends,
        }
    }
}
