mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use common::store_with_users;
use theory_social::app_state::AppState;
use theory_social::config::Config;
use theory_social::core::Uid;
use theory_social::models::{Activity, UserProfile};
use theory_social::social_interface::create_social_router;
use theory_social::infrastructure::DocumentStore;
use theory_social::uid_set;

async fn app() -> Router {
    let mut alice = UserProfile::new("alice").with_display_name("Alice");
    alice.friends = uid_set!["bob"];
    let mut bob = UserProfile::new("bob").with_display_name("Bob");
    bob.friends = uid_set!["alice"];
    let carol = UserProfile::new("carol").with_display_name("Carol");
    let store = store_with_users(vec![alice, bob, carol]).await;

    let theory = Activity::new("t1", "alice", "Birds are drones").created_at(chrono::Utc::now());
    store.set_document("theories", "t1", theory.to_fields()).await.unwrap();

    let mut config = Config::default();
    config.server.public_origin = "https://theories.test".to_string();
    config.admin_uids = vec![Uid::from("ops")];
    create_social_router(AppState::with_store(store, config))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    viewer: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(viewer) = viewer {
        request = request.header("x-viewer-id", viewer);
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_needs_no_viewer() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn missing_viewer_header_is_unauthorized() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/v1/dashboard", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn profile_and_share_link() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/api/v1/users/alice/profile", Some("bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["displayName"], "Alice");
    assert_eq!(body["activities"][0]["title"], "Birds are drones");

    let (status, body) =
        call(&app, Method::GET, "/api/v1/users/alice/share-link", Some("bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["link"], "https://theories.test/profile/alice");

    let (status, _) = call(&app, Method::GET, "/api/v1/users/nobody/profile", Some("bob")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn friend_request_flow() {
    let app = app().await;

    let (status, body) =
        call(&app, Method::POST, "/api/v1/friend-requests/alice", Some("carol")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requestSent"], true);

    let (_, dashboard) = call(&app, Method::GET, "/api/v1/dashboard", Some("alice")).await;
    assert_eq!(dashboard["friendRequests"][0]["displayName"], "Carol");

    let (status, body) =
        call(&app, Method::POST, "/api/v1/friend-requests/carol/accept", Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["friends"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["friendRequests"].as_array().map(Vec::len), Some(0));

    let (_, contacts) = call(&app, Method::GET, "/api/v1/contacts", Some("carol")).await;
    assert_eq!(contacts[0]["uid"], "alice");

    let (status, body) = call(&app, Method::DELETE, "/api/v1/friends/bob", Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["friends"][0]["id"], "carol");
}

#[tokio::test]
async fn unknown_targets_and_self_requests() {
    let app = app().await;

    let (status, _) =
        call(&app, Method::POST, "/api/v1/friend-requests/ghost", Some("alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        call(&app, Method::POST, "/api/v1/friend-requests/bob/accept", Some("carol")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        call(&app, Method::POST, "/api/v1/friend-requests/alice", Some("alice")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reconcile_reports_clean_graph() {
    let app = app().await;
    let (status, body) = call(&app, Method::POST, "/api/v1/admin/reconcile", Some("ops")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["usersScanned"], 3);
    assert_eq!(body["completedFriendships"], 0);
}

#[tokio::test]
async fn reconcile_is_refused_for_regular_viewers() {
    let app = app().await;
    let (status, body) =
        call(&app, Method::POST, "/api/v1/admin/reconcile", Some("alice")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let (status, _) = call(&app, Method::POST, "/api/v1/admin/reconcile", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
