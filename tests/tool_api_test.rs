// Integration tests for GET /tools and POST /tools/:name

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use tower::ServiceExt;
use tunebridge::api::{create_tool_router, ToolAppState};
use tunebridge::credentials::{SessionRecord, TokenRecord};
use tunebridge::session::SessionServices;
use tunebridge::tools::ToolDispatcher;

const SESSION: &str = "dj-max-123";

fn seed_session(services: &SessionServices, expires_in: Duration) {
    let token = TokenRecord {
        access_token: "stored-access".to_string(),
        refresh_token: "stored-refresh".to_string(),
        expires_at: Utc::now() + expires_in,
        scope: Default::default(),
    };
    services
        .store
        .put(&SessionRecord::new(SESSION, "max_1987", "DJ Max", token))
        .unwrap();
}

fn create_test_app(services: &SessionServices) -> Router {
    create_tool_router(ToolAppState {
        dispatcher: ToolDispatcher::new(services.resolver.clone()),
    })
}

async fn call(app: Router, tool: &str, arguments: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/tools/{}", tool))
                .header("content-type", "application/json")
                .body(Body::from(arguments.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

/// GET /tools lists every tool with its arguments.
#[tokio::test]
async fn test_list_tools() {
    let server = Server::new_async().await;
    let services = common::services(&server.url());

    let response = create_test_app(&services)
        .oneshot(Request::builder().uri("/tools").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let tools: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(tools.len(), 8);
    assert_eq!(tools[0]["name"], "search_and_play");
    assert_eq!(tools[0]["arguments"], json!(["session_id", "query"]));
}

/// Unknown tool names are a 404.
#[tokio::test]
async fn test_unknown_tool() {
    let server = Server::new_async().await;
    let services = common::services(&server.url());

    let (status, body) = call(create_test_app(&services), "rewind", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Unknown tool 'rewind'.");
}

/// A search with no hits is a plain sentence and nothing is played.
#[tokio::test]
async fn test_search_without_results() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("q".into(), "Imagine".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"tracks": {"items": []}}"#)
        .create_async()
        .await;
    let play = server
        .mock("PUT", "/me/player/play")
        .expect(0)
        .create_async()
        .await;
    let services = common::services(&server.url());
    seed_session(&services, Duration::hours(1));

    let (status, body) = call(
        create_test_app(&services),
        "search_and_play",
        json!({"session_id": SESSION, "query": "Imagine"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "No results found for 'Imagine'.");
    play.assert_async().await;
}

/// Unknown sessions are still a 200 whose text points at /login.
#[tokio::test]
async fn test_unknown_session_is_text() {
    let server = Server::new_async().await;
    let services = common::services(&server.url());

    let (status, body) = call(
        create_test_app(&services),
        "pause_playback",
        json!({"session_id": "nobody-111"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let result = body["result"].as_str().unwrap();
    assert!(result.contains("nobody-111"));
    assert!(result.contains("/login"));
}

/// An expired token is refreshed before the call and the new token is used.
#[tokio::test]
async fn test_expired_token_refreshed_before_call() {
    let mut server = Server::new_async().await;
    let refresh = server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "stored-refresh".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "fresh-access", "expires_in": 3600}"#)
        .expect(1)
        .create_async()
        .await;
    let next = server
        .mock("POST", "/me/player/next")
        .match_header("authorization", "Bearer fresh-access")
        .with_status(204)
        .create_async()
        .await;
    let services = common::services(&server.url());
    seed_session(&services, Duration::minutes(-5));

    let (status, body) = call(
        create_test_app(&services),
        "next_track",
        json!({"session_id": SESSION}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "Skipped to the next track.");
    refresh.assert_async().await;
    next.assert_async().await;

    let stored = services.store.get(SESSION).unwrap().unwrap();
    assert_eq!(stored.token.access_token, "fresh-access");
    // Not rotated by the server, so the old one is kept
    assert_eq!(stored.token.refresh_token, "stored-refresh");
}

/// A revoked refresh token surfaces as a re-authentication message.
#[tokio::test]
async fn test_revoked_refresh_token() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "invalid_grant", "error_description": "Refresh token revoked"}"#)
        .create_async()
        .await;
    let services = common::services(&server.url());
    seed_session(&services, Duration::minutes(-5));

    let (status, body) = call(
        create_test_app(&services),
        "get_current_song",
        json!({"session_id": SESSION}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let result = body["result"].as_str().unwrap();
    assert!(result.contains("Refresh token revoked"));
    assert!(result.contains("/login"));
}
