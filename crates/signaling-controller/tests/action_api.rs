//! Action endpoint contract tests: authentication ordering, required
//! fields, the closed action taxonomy, and the response wire shapes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::secret::SecretString;
use common::types::MeetingId;
use http_body_util::BodyExt;
use sc_test_utils::directories::{StaticMeetingDirectory, StaticUserDirectory};
use sc_test_utils::test_ids;
use sc_test_utils::tokens::TestTokenBuilder;
use signaling_controller::actors::{HostLookup, SessionSupervisorHandle};
use signaling_controller::auth::TokenVerifier;
use signaling_controller::config::Config;
use signaling_controller::observability::HealthState;
use signaling_controller::protocol::{EventFrame, ProfileSummary};
use signaling_controller::registry::ConnectionRegistry;
use signaling_controller::routes::{build_routes, AppState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::util::ServiceExt;

fn test_config() -> Config {
    let vars = HashMap::from([
        (
            "SC_AUTH_TOKEN_SECRET".to_string(),
            test_ids::TEST_AUTH_SECRET.to_string(),
        ),
        (
            "SC_MEETING_DIRECTORY_URL".to_string(),
            "http://meetings.test".to_string(),
        ),
        (
            "SC_USER_DIRECTORY_URL".to_string(),
            "http://users.test".to_string(),
        ),
    ]);
    Config::from_vars(&vars).expect("test config should load")
}

/// Router plus the supervisor handle, so tests can seed sessions.
fn test_app() -> (axum::Router, SessionSupervisorHandle) {
    let config = test_config();
    let registry = Arc::new(ConnectionRegistry::new());
    let supervisor = SessionSupervisorHandle::new(registry);

    let state = Arc::new(AppState {
        config,
        supervisor: supervisor.clone(),
        verifier: TokenVerifier::new(&SecretString::from(test_ids::TEST_AUTH_SECRET)),
        meeting_directory: Arc::new(
            StaticMeetingDirectory::new().with_creator(test_ids::standup(), test_ids::hana()),
        ),
        user_directory: Arc::new(StaticUserDirectory::new()),
    });

    let app = build_routes(state, Arc::new(HealthState::new()));
    (app, supervisor)
}

fn post_action(token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/meetings/actions")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Seed a session with a connected host and return the frame receiver.
async fn seed_host(
    supervisor: &SessionSupervisorHandle,
    meeting: &MeetingId,
) -> mpsc::Receiver<EventFrame> {
    let (tx, rx) = mpsc::channel(32);
    supervisor
        .join(
            meeting.clone(),
            test_ids::hana(),
            tx,
            HostLookup::Creator(test_ids::hana()),
            ProfileSummary::bare(test_ids::hana()),
        )
        .await
        .expect("seeding host should succeed");
    rx
}

#[tokio::test]
async fn unauthenticated_request_is_rejected_before_anything_else() {
    let (app, supervisor) = test_app();

    // Even a malformed body comes second to authentication.
    let response = app
        .oneshot(post_action(None, serde_json::json!({"nonsense": true})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["status"], 401);
    assert!(body["error"].is_string());

    supervisor.cancel();
}

#[tokio::test]
async fn bad_signature_is_unauthorized() {
    let (app, supervisor) = test_app();
    let token = TestTokenBuilder::new()
        .for_user(test_ids::TEST_USER_HANA)
        .with_secret("some-other-secret")
        .build();

    let response = app
        .oneshot(post_action(
            Some(&token),
            serde_json::json!({"action": "create-room", "meetingId": "mtg-standup"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    supervisor.cancel();
}

#[tokio::test]
async fn missing_meeting_id_is_bad_request() {
    let (app, supervisor) = test_app();
    let token = TestTokenBuilder::new()
        .for_user(test_ids::TEST_USER_HANA)
        .build();

    let response = app
        .oneshot(post_action(
            Some(&token),
            serde_json::json!({"action": "create-room"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["status"], 400);
    assert_eq!(body["error"], "missing meetingId");

    supervisor.cancel();
}

#[tokio::test]
async fn unknown_action_is_invalid() {
    let (app, supervisor) = test_app();
    let token = TestTokenBuilder::new()
        .for_user(test_ids::TEST_USER_HANA)
        .build();

    let response = app
        .oneshot(post_action(
            Some(&token),
            serde_json::json!({"action": "frobnicate", "meetingId": "mtg-standup"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("frobnicate"));

    supervisor.cancel();
}

#[tokio::test]
async fn action_against_unknown_meeting_is_not_found() {
    let (app, supervisor) = test_app();
    let token = TestTokenBuilder::new()
        .for_user(test_ids::TEST_USER_HANA)
        .build();

    let response = app
        .oneshot(post_action(
            Some(&token),
            serde_json::json!({
                "action": "create-room",
                "meetingId": "mtg-nobody-home",
                "data": {"roomId": "room-42"}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    supervisor.cancel();
}

#[tokio::test]
async fn happy_path_action_broadcasts_and_acks() {
    let (app, supervisor) = test_app();
    let meeting = test_ids::standup();
    let mut host_rx = seed_host(&supervisor, &meeting).await;
    let _ = host_rx.recv().await; // connected

    let token = TestTokenBuilder::new()
        .for_user(test_ids::TEST_USER_HANA)
        .build();
    let response = app
        .oneshot(post_action(
            Some(&token),
            serde_json::json!({
                "action": "chat-message",
                "meetingId": "mtg-standup",
                "data": {"content": "hello room"}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);

    match host_rx.recv().await.unwrap() {
        EventFrame::ChatMessage { from, content, .. } => {
            assert_eq!(from, test_ids::hana());
            assert_eq!(content, "hello room");
        }
        other => panic!("expected chat-message, got {other:?}"),
    }

    supervisor.cancel();
}

#[tokio::test]
async fn forbidden_moderation_has_wire_shape() {
    let (app, supervisor) = test_app();
    let meeting = test_ids::standup();
    let mut host_rx = seed_host(&supervisor, &meeting).await;
    let _ = host_rx.recv().await;

    // Alice (not host, not admin) tries to mute the host.
    let token = TestTokenBuilder::new()
        .for_user(test_ids::TEST_USER_ALICE)
        .build();
    let response = app
        .oneshot(post_action(
            Some(&token),
            serde_json::json!({
                "action": "chat-mute-user",
                "meetingId": "mtg-standup",
                "targetUserId": "user-hana"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["status"], 403);
    assert_eq!(body["error"], "not authorized");

    supervisor.cancel();
}

#[tokio::test]
async fn admin_token_grants_moderation() {
    let (app, supervisor) = test_app();
    let meeting = test_ids::standup();
    let mut host_rx = seed_host(&supervisor, &meeting).await;
    let _ = host_rx.recv().await;

    let token = TestTokenBuilder::new()
        .for_user(test_ids::TEST_USER_ADMIN)
        .as_admin()
        .build();
    let response = app
        .oneshot(post_action(
            Some(&token),
            serde_json::json!({
                "action": "chat-mute-all",
                "meetingId": "mtg-standup"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(host_rx.recv().await.unwrap(), EventFrame::ChatGlobalMuted);

    supervisor.cancel();
}

#[tokio::test]
async fn offer_to_disconnected_target_is_404() {
    let (app, supervisor) = test_app();
    let meeting = test_ids::standup();
    let mut host_rx = seed_host(&supervisor, &meeting).await;
    let _ = host_rx.recv().await;

    let token = TestTokenBuilder::new()
        .for_user(test_ids::TEST_USER_HANA)
        .build();
    let response = app
        .oneshot(post_action(
            Some(&token),
            serde_json::json!({
                "action": "offer",
                "meetingId": "mtg-standup",
                "targetUserId": "user-bob",
                "data": {"sdp": "v=0"}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"], "target not connected");
    assert_eq!(body["status"], 404);

    supervisor.cancel();
}
