//! Integration tests for the session API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The default configuration selects the mock
//! oracle, so no network or subprocess is involved.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use sandbox_core::SandboxConfig;
use sandbox_server::router::build_router;
use sandbox_server::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

fn make_router() -> Router {
    build_router(Arc::new(AppState::new(SandboxConfig::default())))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn create_session(router: &Router, body: &Value) -> String {
    let (status, json) = send(router, post_json("/sessions", body)).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
    json["session_id"].as_str().unwrap().to_owned()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_health() {
    let router = make_router();
    let (status, json) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["backend"], "mock");
    assert_eq!(json["sessions"], 0);
}

#[tokio::test]
async fn test_create_session_with_defaults() {
    let router = make_router();
    let (status, json) = send(&router, post_empty("/sessions")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(json["session_id"].is_string());
    assert_eq!(json["snapshot"]["turn"], 0);
    assert_eq!(json["snapshot"]["grid_size"], 3);
    assert_eq!(json["snapshot"]["agents"].as_array().unwrap().len(), 2);
    assert_eq!(json["snapshot"]["backend"], "mock");
    assert_eq!(json["snapshot"]["awaiting_player"], false);
}

#[tokio::test]
async fn test_create_session_rejects_overcrowded_grid() {
    let router = make_router();
    let (status, json) = send(
        &router,
        post_json("/sessions", &json!({"grid_size": 2, "num_agents": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["status"], 422);
    assert!(json["error"].as_str().unwrap().contains("invalid setup"));
}

#[tokio::test]
async fn test_create_session_rejects_huge_agent_count() {
    let router = make_router();
    let (status, json) = send(
        &router,
        post_json(
            "/sessions",
            &json!({"grid_size": 1, "num_agents": 1_099_511_627_776_u64}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("cannot hold"));

    let (_, json) = send(&router, get("/health")).await;
    assert_eq!(json["sessions"], 0);
}

#[tokio::test]
async fn test_step_completes_turn_and_records_history() {
    let router = make_router();
    let id = create_session(&router, &json!({"seed": 5})).await;

    let (status, json) = send(&router, post_empty(&format!("/sessions/{id}/step"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "completed");
    assert_eq!(json["turn"], 1);
    assert_eq!(json["debug"].as_array().unwrap().len(), 2);

    let (status, json) = send(&router, get(&format!("/sessions/{id}/state"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["snapshot"]["turn"], 1);
    assert_eq!(json["history"].as_array().unwrap().len(), 1);
    assert!(json["pending"].is_null());
}

#[tokio::test]
async fn test_player_turn_round_trip() {
    let router = make_router();
    let id = create_session(
        &router,
        &json!({"num_agents": 2, "player_agent": true, "seed": 3}),
    )
    .await;

    let (status, json) = send(&router, post_empty(&format!("/sessions/{id}/step"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "awaiting_player");
    assert_eq!(json["agent"], "agent2");
    assert_eq!(json["turn"], 1);
    assert_eq!(json["profile"]["title"], "Player");
    assert_eq!(json["legal_actions"][0]["action"], "wait");

    // A second step while suspended is refused.
    let (status, json) = send(&router, post_empty(&format!("/sessions/{id}/step"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], 409);

    let (status, json) = send(
        &router,
        post_json(
            &format!("/sessions/{id}/player-action"),
            &json!({"action": "wait"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "completed");
    assert_eq!(json["turn"], 1);
    assert_eq!(json["debug"][1]["source"], "player");

    // Nothing pending any more.
    let (status, _) = send(
        &router,
        post_json(
            &format!("/sessions/{id}/player-action"),
            &json!({"action": "wait"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invalid_player_action_keeps_turn_pending() {
    let router = make_router();
    let id = create_session(&router, &json!({"player_agent": true, "seed": 8})).await;
    send(&router, post_empty(&format!("/sessions/{id}/step"))).await;

    let (status, json) = send(
        &router,
        post_json(
            &format!("/sessions/{id}/player-action"),
            &json!({"action": "fly"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("fly"));

    let (_, json) = send(&router, get(&format!("/sessions/{id}/state"))).await;
    assert_eq!(json["snapshot"]["awaiting_player"], true);
    assert_eq!(json["pending"]["agent"], "agent2");
    assert!(json["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reset_discards_history() {
    let router = make_router();
    let id = create_session(&router, &json!({"seed": 1})).await;
    send(&router, post_empty(&format!("/sessions/{id}/step"))).await;
    send(&router, post_empty(&format!("/sessions/{id}/step"))).await;

    let (status, json) = send(
        &router,
        post_json(
            &format!("/sessions/{id}/reset"),
            &json!({"grid_size": 4, "num_agents": 3}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["turn"], 0);
    assert_eq!(json["grid_size"], 4);
    assert_eq!(json["agents"].as_array().unwrap().len(), 3);

    let (_, json) = send(&router, get(&format!("/sessions/{id}/state"))).await;
    assert!(json["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_reset_leaves_session_untouched() {
    let router = make_router();
    let id = create_session(&router, &json!({"seed": 2})).await;
    send(&router, post_empty(&format!("/sessions/{id}/step"))).await;

    let (status, _) = send(
        &router,
        post_json(&format!("/sessions/{id}/reset"), &json!({"num_agents": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, json) = send(&router, get(&format!("/sessions/{id}/state"))).await;
    assert_eq!(json["snapshot"]["turn"], 1);
}

#[tokio::test]
async fn test_same_seed_sessions_replay_identically() {
    let router = make_router();
    let a = create_session(&router, &json!({"seed": 42, "num_agents": 3})).await;
    let b = create_session(&router, &json!({"seed": 42, "num_agents": 3})).await;

    for _ in 0..4 {
        send(&router, post_empty(&format!("/sessions/{a}/step"))).await;
        send(&router, post_empty(&format!("/sessions/{b}/step"))).await;
    }

    let (_, state_a) = send(&router, get(&format!("/sessions/{a}/state"))).await;
    let (_, state_b) = send(&router, get(&format!("/sessions/{b}/state"))).await;
    assert_eq!(state_a["history"], state_b["history"]);
    assert_eq!(state_a["snapshot"]["agents"], state_b["snapshot"]["agents"]);
}

#[tokio::test]
async fn test_unknown_and_malformed_session_ids() {
    let router = make_router();
    let (status, json) = send(
        &router,
        post_empty("/sessions/0191c1d2-0000-7000-8000-000000000000/step"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);

    let (status, json) = send(&router, get("/sessions/not-a-uuid/state")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_delete_session() {
    let router = make_router();
    let id = create_session(&router, &json!({})).await;

    let delete = || {
        Request::delete(format!("/sessions/{id}"))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = send(&router, delete()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&router, delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(&router, get("/health")).await;
    assert_eq!(json["sessions"], 0);
}
