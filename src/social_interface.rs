// Social Interface - HTTP surface over the profile, relationship and contact services
//
// Every route except /health runs on behalf of the viewer named by the
// identity header (see `Vc`).

use axum::{
    extract::{Path as AxumPath, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    app_state::AppState,
    core::{current_time_millis, Uid},
    error::{AppError, AppResult},
    infrastructure::middleware::Vc,
    models::Contact,
    navigation::share_profile_link,
    services::{load_contacts, DashboardView, ProfileView, ReconciliationReport, RelationshipView},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkResponse {
    pub uid: Uid,
    pub link: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestResponse {
    pub target: Uid,
    /// Page-local flag; the server keeps no record beyond the target's request list
    pub request_sent: bool,
}

fn path_uid(raw: String) -> AppResult<Uid> {
    let uid = Uid::from(raw);
    if uid.is_valid() {
        Ok(uid)
    } else {
        Err(AppError::BadRequest(format!("invalid user id '{}'", uid)))
    }
}

// HTTP Handlers

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "theory_social",
        "timestamp": current_time_millis()
    }))
}

pub async fn get_profile_handler(
    State(state): State<AppState>,
    _vc: Vc,
    AxumPath(uid): AxumPath<String>,
) -> AppResult<Json<ProfileView>> {
    let uid = path_uid(uid)?;
    let view = state.profiles.load_profile(&uid).await;
    if !view.is_found() {
        return Err(AppError::NotFound(format!("user {} does not exist", uid)));
    }
    Ok(Json(view))
}

pub async fn share_link_handler(
    State(state): State<AppState>,
    _vc: Vc,
    AxumPath(uid): AxumPath<String>,
) -> AppResult<Json<ShareLinkResponse>> {
    let uid = path_uid(uid)?;
    let link = share_profile_link(&state.config.server.public_origin, &uid);
    Ok(Json(ShareLinkResponse { uid, link }))
}

pub async fn dashboard_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<DashboardView>> {
    Ok(Json(state.profiles.load_dashboard(&vc, &state.relationships).await))
}

pub async fn contacts_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<Vec<Contact>>> {
    let contacts =
        load_contacts(state.store.as_ref(), &state.config.collections.users, &vc.uid).await?;
    Ok(Json(contacts))
}

pub async fn send_request_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(target): AxumPath<String>,
) -> AppResult<Json<FriendRequestResponse>> {
    let target = path_uid(target)?;
    state.relationships.send_friend_request(&vc, &target).await?;
    Ok(Json(FriendRequestResponse {
        target,
        request_sent: true,
    }))
}

pub async fn accept_request_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(requester): AxumPath<String>,
) -> AppResult<Json<RelationshipView>> {
    let requester = path_uid(requester)?;
    let view = state.relationships.accept_friend_request(&vc, &requester).await?;
    Ok(Json(view))
}

pub async fn reject_request_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(requester): AxumPath<String>,
) -> AppResult<Json<RelationshipView>> {
    let requester = path_uid(requester)?;
    let view = state.relationships.reject_friend_request(&vc, &requester).await?;
    Ok(Json(view))
}

pub async fn remove_friend_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(friend): AxumPath<String>,
) -> AppResult<Json<RelationshipView>> {
    let friend = path_uid(friend)?;
    let view = state.relationships.remove_friend(&vc, &friend).await?;
    Ok(Json(view))
}

pub async fn reconcile_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> AppResult<Json<ReconciliationReport>> {
    if !state.config.is_admin(&vc.uid) {
        warn!(requested_by = %vc.uid, "reconciliation refused for non-admin viewer");
        return Err(AppError::Unauthorized(
            "reconciliation is restricted to admin viewers".to_string(),
        ));
    }
    info!(requested_by = %vc.uid, "friendship reconciliation requested");
    Ok(Json(state.relationships.reconcile_friendships().await?))
}

// Create unified router
pub fn create_social_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/users/{uid}/profile", get(get_profile_handler))
        .route("/api/v1/users/{uid}/share-link", get(share_link_handler))
        .route("/api/v1/dashboard", get(dashboard_handler))
        .route("/api/v1/contacts", get(contacts_handler))
        .route("/api/v1/friend-requests/{target}", post(send_request_handler))
        .route(
            "/api/v1/friend-requests/{requester}/accept",
            post(accept_request_handler),
        )
        .route(
            "/api/v1/friend-requests/{requester}/reject",
            post(reject_request_handler),
        )
        .route("/api/v1/friends/{friend}", delete(remove_friend_handler))
        .route("/api/v1/admin/reconcile", post(reconcile_handler))
        .with_state(state)
}
