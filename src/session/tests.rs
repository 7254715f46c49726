//! End-to-end session lifecycle tests against a mock Spotify.

use super::*;
use crate::config::test_config;
use crate::credentials::{MemoryCredentialStore, SqliteCredentialStore};
use crate::error::SessionError;
use chrono::{Duration, Utc};
use mockito::{Matcher, Mock, Server};
use std::io::Write;

async fn mock_code_exchange(server: &mut Server, code: &str, access: &str, refresh: &str) -> Mock {
    server
        .mock("POST", "/api/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), code.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            serde_json::json!({
                "access_token": access,
                "refresh_token": refresh,
                "expires_in": 3600,
                "scope": "user-read-playback-state user-modify-playback-state",
            })
            .to_string(),
        )
        .create_async()
        .await
}

async fn mock_whoami(server: &mut Server, id: &str, display_name: &str) -> Mock {
    server
        .mock("GET", "/me")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::json!({"id": id, "display_name": display_name}).to_string())
        .create_async()
        .await
}

fn services(server: &Server, store: Arc<dyn CredentialStore>) -> SessionServices {
    SessionServices::new(&test_config(&server.url()), store, reqwest::Client::new())
}

#[tokio::test]
async fn test_completed_authorization_resolves() {
    let mut server = Server::new_async().await;
    let _exchange = mock_code_exchange(&mut server, "code-1", "access-1", "refresh-1").await;
    let _me = mock_whoami(&mut server, "max_1987", "DJ Max!").await;

    let services = services(&server, Arc::new(MemoryCredentialStore::new()));
    let minted = services.flow.complete("code-1").await.unwrap();

    assert!(minted.session_id.starts_with("dj-max-"));
    assert_eq!(minted.display_name, "DJ Max!");
    assert!(!minted.reused);

    let client = services.resolver.resolve(&minted.session_id).await.unwrap();
    assert_eq!(client.access_token(), "access-1");

    let stored = services.store.get(&minted.session_id).unwrap().unwrap();
    assert_eq!(stored.owner_identity, "max_1987");
    assert_eq!(stored.token.refresh_token, "refresh-1");
    assert!(stored.token.scope.contains("user-modify-playback-state"));
}

#[tokio::test]
async fn test_reauthorizing_same_account_reuses_session_id() {
    let mut server = Server::new_async().await;
    let _first = mock_code_exchange(&mut server, "code-1", "access-1", "refresh-1").await;
    // The server issues a different refresh token the second time
    let _second = mock_code_exchange(&mut server, "code-2", "access-2", "refresh-2").await;
    let _me = mock_whoami(&mut server, "max_1987", "DJ Max!").await;

    let services = services(&server, Arc::new(MemoryCredentialStore::new()));
    let first = services.flow.complete("code-1").await.unwrap();
    let second = services.flow.complete("code-2").await.unwrap();

    assert_eq!(first.session_id, second.session_id);
    assert!(second.reused);
    assert_eq!(services.store.count().unwrap(), 1);

    let stored = services.store.get(&first.session_id).unwrap().unwrap();
    assert_eq!(stored.token.access_token, "access-2");
    assert_eq!(stored.token.refresh_token, "refresh-2");
}

#[tokio::test]
async fn test_different_accounts_get_different_sessions() {
    let mut server = Server::new_async().await;
    let _alice_code = mock_code_exchange(&mut server, "alice-code", "alice-access", "alice-refresh").await;
    let _bob_code = mock_code_exchange(&mut server, "bob-code", "bob-access", "bob-refresh").await;
    let _alice = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer alice-access")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "alice", "display_name": "Alice"}"#)
        .create_async()
        .await;
    let _bob = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer bob-access")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "bob", "display_name": "Bob"}"#)
        .create_async()
        .await;

    let services = services(&server, Arc::new(MemoryCredentialStore::new()));
    let alice = services.flow.complete("alice-code").await.unwrap();
    let bob = services.flow.complete("bob-code").await.unwrap();

    assert!(alice.session_id.starts_with("alice-"));
    assert!(bob.session_id.starts_with("bob-"));
    assert_eq!(services.store.count().unwrap(), 2);
}

#[tokio::test]
async fn test_rejected_code_is_authorization_denied() {
    let mut server = Server::new_async().await;
    let _exchange = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "invalid_grant", "error_description": "Invalid authorization code"}"#)
        .create_async()
        .await;

    let services = services(&server, Arc::new(MemoryCredentialStore::new()));
    let err = services.flow.complete("expired").await.unwrap_err();

    assert_eq!(
        err,
        SessionError::AuthorizationDenied("invalid_grant: Invalid authorization code".to_string())
    );
    assert_eq!(services.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_resolve_unknown_session() {
    let server = Server::new_async().await;
    let services = services(&server, Arc::new(MemoryCredentialStore::new()));

    let err = services.resolver.resolve("nonexistent-id").await.unwrap_err();
    assert!(matches!(err, SessionError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_concurrent_resolves_refresh_once() {
    let mut server = Server::new_async().await;
    let refresh = server
        .mock("POST", "/api/token")
        .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "after-refresh", "refresh_token": "rotated", "expires_in": 3600}"#)
        .expect(1)
        .create_async()
        .await;

    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    let mut record = crate::credentials::test_support::session("dj-max-123", "max", Duration::hours(1));
    record.token.expires_at = Utc::now() - Duration::minutes(1);
    store.put(&record).unwrap();

    let services = services(&server, Arc::clone(&store));
    let calls = (0..10).map(|_| {
        let resolver = Arc::clone(&services.resolver);
        tokio::spawn(async move { resolver.resolve("dj-max-123").await })
    });
    let results = futures::future::join_all(calls).await;

    refresh.assert_async().await;
    for result in results {
        let client = result.unwrap().unwrap();
        assert_eq!(client.access_token(), "after-refresh");
    }
    let stored = store.get("dj-max-123").unwrap().unwrap();
    assert_eq!(stored.token.refresh_token, "rotated");
}

#[tokio::test]
async fn test_durable_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    let mut server = Server::new_async().await;
    let _exchange = mock_code_exchange(&mut server, "code-1", "access-1", "refresh-1").await;
    let _me = mock_whoami(&mut server, "max_1987", "DJ Max!").await;

    let session_id = {
        let store: Arc<dyn CredentialStore> = Arc::new(SqliteCredentialStore::new(&path).unwrap());
        services(&server, store).flow.complete("code-1").await.unwrap().session_id
    };

    // Fresh process: reopen the same file
    let store: Arc<dyn CredentialStore> = Arc::new(SqliteCredentialStore::new(&path).unwrap());
    let services = services(&server, store);
    let client = services.resolver.resolve(&session_id).await.unwrap();
    assert_eq!(client.access_token(), "access-1");
}

#[tokio::test]
async fn test_reauthorization_during_refresh_keeps_new_grant() {
    let mut server = Server::new_async().await;
    let _slow_refresh = server
        .mock("POST", "/api/token")
        .match_body(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_millis(400));
            w.write_all(br#"{"access_token": "from-refresh", "expires_in": 3600}"#)
        })
        .create_async()
        .await;
    let _exchange = mock_code_exchange(&mut server, "code-2", "reauth-access", "reauth-refresh").await;
    let _me = mock_whoami(&mut server, "max_1987", "DJ Max!").await;

    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    let mut record = crate::credentials::test_support::session("dj-max-123", "max_1987", Duration::hours(1));
    record.token.expires_at = Utc::now() - Duration::minutes(1);
    store.put(&record).unwrap();
    let services = services(&server, Arc::clone(&store));

    let resolving = {
        let resolver = Arc::clone(&services.resolver);
        tokio::spawn(async move { resolver.resolve("dj-max-123").await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let minted = services.flow.complete("code-2").await.unwrap();
    assert_eq!(minted.session_id, "dj-max-123");
    assert!(minted.reused);
    resolving.await.unwrap().unwrap();

    let stored = store.get("dj-max-123").unwrap().unwrap();
    assert_eq!(stored.token.access_token, "reauth-access");
    assert_eq!(stored.token.refresh_token, "reauth-refresh");
    assert!(stored.token.scope.contains("user-modify-playback-state"));
}
