//! # Tests for Handlers
//!
//! This module contains unit tests for API handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    response::Json,
};
use http_body_util::BodyExt;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;
use tower::ServiceExt;

use crate::config::{AppConfig, OAuthSettings};
use crate::handlers::{healthz, root};
use crate::oauth::{ExchangeError, IdentityProvider, ProviderCall, TokenSet, UserProfile};
use crate::server::{AppState, create_app};

/// Provider that refuses every call; handler tests never reach the exchange.
struct UnreachableProvider;

#[async_trait]
impl IdentityProvider for UnreachableProvider {
    async fn exchange_code(&self, _code: &str) -> Result<TokenSet, ExchangeError> {
        Err(ExchangeError::MissingPayload {
            call: ProviderCall::TokenExchange,
        })
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<UserProfile, ExchangeError> {
        Err(ExchangeError::MissingPayload {
            call: ProviderCall::ProfileFetch,
        })
    }
}

fn test_state(db: DatabaseConnection) -> AppState {
    let config = AppConfig {
        client_id: Some("client-123".to_string()),
        client_secret: Some("secret-456".to_string()),
        redirect_uri: Some("https://app.example.com/api/auth/callback".to_string()),
        ..Default::default()
    };
    let oauth = OAuthSettings::from_config(&config).unwrap();

    AppState {
        config: Arc::new(config),
        oauth: Arc::new(oauth),
        db,
        provider: Arc::new(UnreachableProvider),
    }
}

async fn migrated_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

#[tokio::test]
async fn test_root_handler_returns_expected_service_info() {
    let Json(service_info) = root().await;

    assert_eq!(service_info.service, "collab-auth");
    assert_eq!(service_info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_healthz_ok_with_database() {
    let state = test_state(migrated_db().await);

    let (status, Json(body)) = healthz(State(state)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.database);
}

#[tokio::test]
async fn test_responses_carry_trace_id_header() {
    let app = create_app(test_state(migrated_db().await));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let trace_id = response.headers().get("x-trace-id").unwrap();
    assert_eq!(trace_id.len(), 32);
}

#[tokio::test]
async fn test_me_without_cookie_is_problem_json() {
    let app = create_app(test_state(migrated_db().await));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert!(json["trace_id"].is_string());
}

#[tokio::test]
async fn test_openapi_document_lists_auth_paths() {
    let app = create_app(test_state(DatabaseConnection::default()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    for path in [
        "/api/auth/login",
        "/api/auth/callback",
        "/api/auth/me",
        "/api/auth/logout",
    ] {
        assert!(json["paths"].get(path).is_some(), "missing {path}");
    }
}
