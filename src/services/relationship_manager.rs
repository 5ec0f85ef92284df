// Relationship Manager - friend requests and friendships on user documents
//
// A friendship lives redundantly in both parties' `friends` arrays, a pending
// request in the recipient's `friendRequests` array. Every multi-document
// change goes through one atomic batch so the graph cannot end up
// one-directional; `reconcile_friendships` repairs asymmetry written before
// that (or by other clients).

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::core::Uid;
use crate::error::{AppError, AppResult};
use crate::infrastructure::document_store::{DocumentStore, FieldUpdate, WriteBatch};
use crate::infrastructure::viewer::ViewerContext;
use crate::models::user::{fields, UNKNOWN_NAME};
use crate::models::{NamedUser, UserProfile};

/// Request and friend lists, resolved to display names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipView {
    pub friend_requests: Vec<NamedUser>,
    pub friends: Vec<NamedUser>,
}

/// What `reconcile_friendships` changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub users_scanned: usize,
    /// One-sided friendships completed with the missing reciprocal
    pub completed_friendships: usize,
    /// Friend or request entries pointing at users that do not exist
    pub dangling_removed: usize,
    /// Requests from users who are already friends
    pub stale_requests_cleared: usize,
    /// Users listing themselves as friend or requester
    pub self_references_removed: usize,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.completed_friendships == 0
            && self.dangling_removed == 0
            && self.stale_requests_cleared == 0
            && self.self_references_removed == 0
    }
}

#[derive(Clone)]
pub struct RelationshipManager {
    store: Arc<dyn DocumentStore>,
    users: String,
}

impl RelationshipManager {
    pub fn new(store: Arc<dyn DocumentStore>, users_collection: impl Into<String>) -> Self {
        Self {
            store,
            users: users_collection.into(),
        }
    }

    fn check_target(viewer: &ViewerContext, other: &Uid) -> AppResult<()> {
        if !other.is_valid() {
            return Err(AppError::Validation(format!("invalid user id '{}'", other)));
        }
        if viewer.is(other) {
            return Err(AppError::Validation(
                "cannot form a relationship with yourself".to_string(),
            ));
        }
        Ok(())
    }

    async fn require_user(&self, uid: &Uid) -> AppResult<UserProfile> {
        self.store
            .get_document(&self.users, uid.as_str())
            .await?
            .map(|doc| UserProfile::from_document(&doc))
            .ok_or_else(|| AppError::NotFound(format!("user {} does not exist", uid)))
    }

    /// Add the viewer to the target's pending requests. Repeating it is harmless.
    #[instrument(skip(self, viewer), fields(from = %viewer.uid, to = %target))]
    pub async fn send_friend_request(&self, viewer: &ViewerContext, target: &Uid) -> AppResult<()> {
        Self::check_target(viewer, target)?;
        self.store
            .update_fields(
                &self.users,
                target.as_str(),
                vec![FieldUpdate::array_union(fields::FRIEND_REQUESTS, viewer.uid.as_str())],
            )
            .await
            .map_err(|e| {
                error!("Error sending friend request: {}", e);
                e
            })?;
        info!("friend request sent");
        Ok(())
    }

    /// Befriend `requester` in one atomic batch: both `friends` arrays gain the
    /// other party and any pending request between the two is cleared.
    #[instrument(skip(self, viewer), fields(uid = %viewer.uid, requester = %requester))]
    pub async fn accept_friend_request(
        &self,
        viewer: &ViewerContext,
        requester: &Uid,
    ) -> AppResult<RelationshipView> {
        Self::check_target(viewer, requester)?;

        let me = self.require_user(&viewer.uid).await?;
        if !me.has_request_from(requester) && !me.is_friend(requester) {
            return Err(AppError::NotFound(format!(
                "no pending friend request from {}",
                requester
            )));
        }

        let batch = WriteBatch::new()
            .update(
                &self.users,
                viewer.uid.as_str(),
                vec![
                    FieldUpdate::array_union(fields::FRIENDS, requester.as_str()),
                    FieldUpdate::array_remove(fields::FRIEND_REQUESTS, requester.as_str()),
                ],
            )
            .update(
                &self.users,
                requester.as_str(),
                vec![
                    FieldUpdate::array_union(fields::FRIENDS, viewer.uid.as_str()),
                    FieldUpdate::array_remove(fields::FRIEND_REQUESTS, viewer.uid.as_str()),
                ],
            );

        self.store.commit(batch).await.map_err(|e| {
            error!("Error accepting friend request: {}", e);
            e
        })?;
        info!("friend request accepted");
        Ok(self.load_relationships(&viewer.uid).await)
    }

    /// Drop the pending request; the requester is not notified
    #[instrument(skip(self, viewer), fields(uid = %viewer.uid, requester = %requester))]
    pub async fn reject_friend_request(
        &self,
        viewer: &ViewerContext,
        requester: &Uid,
    ) -> AppResult<RelationshipView> {
        Self::check_target(viewer, requester)?;
        self.store
            .update_fields(
                &self.users,
                viewer.uid.as_str(),
                vec![FieldUpdate::array_remove(fields::FRIEND_REQUESTS, requester.as_str())],
            )
            .await
            .map_err(|e| {
                error!("Error rejecting friend request: {}", e);
                e
            })?;
        Ok(self.load_relationships(&viewer.uid).await)
    }

    /// Remove the friendship from both sides atomically. If the other user no
    /// longer exists only the viewer's side is cleaned up.
    #[instrument(skip(self, viewer), fields(uid = %viewer.uid, friend = %friend))]
    pub async fn remove_friend(
        &self,
        viewer: &ViewerContext,
        friend: &Uid,
    ) -> AppResult<RelationshipView> {
        Self::check_target(viewer, friend)?;

        let other_exists = self
            .store
            .get_document(&self.users, friend.as_str())
            .await?
            .is_some();

        let mut batch = WriteBatch::new().update(
            &self.users,
            viewer.uid.as_str(),
            vec![FieldUpdate::array_remove(fields::FRIENDS, friend.as_str())],
        );
        if other_exists {
            batch = batch.update(
                &self.users,
                friend.as_str(),
                vec![FieldUpdate::array_remove(fields::FRIENDS, viewer.uid.as_str())],
            );
        } else {
            warn!("removing friend whose user document is gone");
        }

        self.store.commit(batch).await.map_err(|e| {
            error!("Error removing friend: {}", e);
            e
        })?;
        info!("friend removed");
        Ok(self.load_relationships(&viewer.uid).await)
    }

    /// Pending requests for `uid`, resolved to display names
    pub async fn fetch_friend_requests(&self, uid: &Uid) -> AppResult<Vec<NamedUser>> {
        match self.store.get_document(&self.users, uid.as_str()).await? {
            Some(doc) => {
                let user = UserProfile::from_document(&doc);
                Ok(self.resolve_display_names(&user.friend_requests.to_vec()).await)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Friends of `uid`, resolved to display names
    pub async fn fetch_friends(&self, uid: &Uid) -> AppResult<Vec<NamedUser>> {
        match self.store.get_document(&self.users, uid.as_str()).await? {
            Some(doc) => {
                let user = UserProfile::from_document(&doc);
                Ok(self.resolve_display_names(&user.friends.to_vec()).await)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Re-read both lists; a failed read is logged and shows as empty
    pub async fn load_relationships(&self, uid: &Uid) -> RelationshipView {
        let (requests, friends) =
            futures::join!(self.fetch_friend_requests(uid), self.fetch_friends(uid));

        RelationshipView {
            friend_requests: requests.unwrap_or_else(|e| {
                error!("Error fetching friend requests: {}", e);
                Vec::new()
            }),
            friends: friends.unwrap_or_else(|e| {
                error!("Error fetching friends: {}", e);
                Vec::new()
            }),
        }
    }

    /// One document read per uid, all in flight at once. Missing users and
    /// failed reads resolve to "Unknown" instead of failing the list.
    pub async fn resolve_display_names(&self, uids: &[Uid]) -> Vec<NamedUser> {
        let reads = uids
            .iter()
            .map(|uid| self.store.get_document(&self.users, uid.as_str()));
        let results = join_all(reads).await;

        uids.iter()
            .zip(results)
            .map(|(uid, result)| {
                let display_name = match result {
                    Ok(Some(doc)) => UserProfile::from_document(&doc).list_name().to_string(),
                    Ok(None) => UNKNOWN_NAME.to_string(),
                    Err(e) => {
                        warn!(uid = %uid, "display name lookup failed: {}", e);
                        UNKNOWN_NAME.to_string()
                    }
                };
                NamedUser {
                    id: uid.clone(),
                    display_name,
                }
            })
            .collect()
    }

    /// Scan every user and repair the friendship graph in one batch:
    /// complete one-sided friendships, drop entries naming missing users or
    /// the user itself, and clear requests from existing friends.
    ///
    /// A one-sided edge is always completed, never dropped. An edge left by
    /// a removal that only reached one side (written before removals were
    /// batched) therefore comes back as a friendship; the user can remove
    /// it again.
    #[instrument(skip(self))]
    pub async fn reconcile_friendships(&self) -> AppResult<ReconciliationReport> {
        let docs = self.store.query_collection(&self.users, None).await?;
        let users: HashMap<Uid, UserProfile> = docs
            .iter()
            .map(UserProfile::from_document)
            .map(|user| (user.uid.clone(), user))
            .collect();

        let mut report = ReconciliationReport {
            users_scanned: users.len(),
            ..Default::default()
        };
        let mut updates: HashMap<Uid, Vec<FieldUpdate>> = HashMap::new();
        let mut push = |uid: &Uid, update: FieldUpdate| {
            updates.entry(uid.clone()).or_default().push(update);
        };

        let mut ordered: Vec<&UserProfile> = users.values().collect();
        ordered.sort_by(|a, b| a.uid.cmp(&b.uid));

        for user in ordered {
            for friend in &user.friends {
                if friend == &user.uid {
                    report.self_references_removed += 1;
                    push(&user.uid, FieldUpdate::array_remove(fields::FRIENDS, friend.as_str()));
                    continue;
                }
                match users.get(friend) {
                    None => {
                        report.dangling_removed += 1;
                        push(
                            &user.uid,
                            FieldUpdate::array_remove(fields::FRIENDS, friend.as_str()),
                        );
                    }
                    Some(other) if !other.is_friend(&user.uid) => {
                        report.completed_friendships += 1;
                        push(
                            &other.uid,
                            FieldUpdate::array_union(fields::FRIENDS, user.uid.as_str()),
                        );
                    }
                    Some(_) => {}
                }
            }

            for requester in &user.friend_requests {
                let reason = if requester == &user.uid {
                    Some(&mut report.self_references_removed)
                } else if !users.contains_key(requester) {
                    Some(&mut report.dangling_removed)
                } else if user.is_friend(requester) {
                    Some(&mut report.stale_requests_cleared)
                } else {
                    None
                };
                if let Some(counter) = reason {
                    *counter += 1;
                    push(
                        &user.uid,
                        FieldUpdate::array_remove(fields::FRIEND_REQUESTS, requester.as_str()),
                    );
                }
            }
        }

        if !updates.is_empty() {
            let mut targets: Vec<Uid> = updates.keys().cloned().collect();
            targets.sort();
            let mut batch = WriteBatch::new();
            for uid in targets {
                let field_updates = updates.remove(&uid).unwrap_or_default();
                batch = batch.update(&self.users, uid.as_str(), field_updates);
            }
            self.store.commit(batch).await?;
        }

        info!(
            users = report.users_scanned,
            completed = report.completed_friendships,
            dangling = report.dangling_removed,
            stale_requests = report.stale_requests_cleared,
            self_refs = report.self_references_removed,
            "friendship reconciliation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::MemoryStore;
    use crate::uid_set;

    async fn store_with(users: Vec<UserProfile>) -> (Arc<MemoryStore>, RelationshipManager) {
        let store = Arc::new(MemoryStore::new());
        for user in users {
            store
                .set_document("users", user.uid.as_str(), user.to_fields())
                .await
                .unwrap();
        }
        let manager = RelationshipManager::new(store.clone(), "users");
        (store, manager)
    }

    async fn user(store: &MemoryStore, uid: &str) -> UserProfile {
        let doc = store.get_document("users", uid).await.unwrap().unwrap();
        UserProfile::from_document(&doc)
    }

    #[tokio::test]
    async fn test_send_to_self_is_rejected() {
        let (_store, manager) = store_with(vec![UserProfile::new("a")]).await;
        let err = manager
            .send_friend_request(&ViewerContext::new("a"), &Uid::from("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_accept_requires_pending_request() {
        let (_store, manager) =
            store_with(vec![UserProfile::new("a"), UserProfile::new("b")]).await;
        let err = manager
            .accept_friend_request(&ViewerContext::new("a"), &Uid::from("b"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_accept_clears_mutual_requests() {
        let mut a = UserProfile::new("a");
        a.friend_requests = uid_set!["b"];
        let mut b = UserProfile::new("b");
        b.friend_requests = uid_set!["a"];
        let (store, manager) = store_with(vec![a, b]).await;

        manager
            .accept_friend_request(&ViewerContext::new("a"), &Uid::from("b"))
            .await
            .unwrap();

        assert!(user(&store, "b").await.friend_requests.is_empty());
        assert!(user(&store, "a").await.friend_requests.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_display_names_falls_back_to_unknown() {
        let (_store, manager) =
            store_with(vec![
                UserProfile::new("a").with_display_name("Ann"),
                UserProfile::new("nameless"),
            ])
            .await;
        let names = manager
            .resolve_display_names(&[Uid::from("a"), Uid::from("ghost"), Uid::from("nameless")])
            .await;
        let names: Vec<_> = names.iter().map(|n| n.display_name.as_str()).collect();
        assert_eq!(names, vec!["Ann", "Unknown", "Unknown"]);
    }

    #[tokio::test]
    async fn test_remove_friend_with_deleted_counterpart() {
        let mut a = UserProfile::new("a");
        a.friends = uid_set!["gone"];
        let (store, manager) = store_with(vec![a]).await;

        let view = manager
            .remove_friend(&ViewerContext::new("a"), &Uid::from("gone"))
            .await
            .unwrap();
        assert!(view.friends.is_empty());
        assert!(user(&store, "a").await.friends.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_repairs_graph() {
        let mut a = UserProfile::new("a");
        a.friends = uid_set!["b", "ghost", "a"];
        a.friend_requests = uid_set!["c"];
        let b = UserProfile::new("b");
        let mut c = UserProfile::new("c");
        c.friends = uid_set!["a"];
        let mut a_links = a.clone();
        a_links.friends.insert(Uid::from("c"));
        let (store, manager) = store_with(vec![a_links, b, c]).await;

        let report = manager.reconcile_friendships().await.unwrap();
        assert_eq!(report.users_scanned, 3);
        assert_eq!(report.completed_friendships, 1);
        assert_eq!(report.dangling_removed, 1);
        assert_eq!(report.self_references_removed, 1);
        assert_eq!(report.stale_requests_cleared, 1);

        let a = user(&store, "a").await;
        assert_eq!(a.friends, uid_set!["b", "c"]);
        assert!(a.friend_requests.is_empty());
        assert!(user(&store, "b").await.is_friend(&Uid::from("a")));

        let again = manager.reconcile_friendships().await.unwrap();
        assert!(again.is_clean());
    }
}
