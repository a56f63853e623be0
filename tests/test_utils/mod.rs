//! Test utilities for database and application setup.
//!
//! Provides an in-memory SQLite database with migrations applied and an app
//! wired to a mock identity provider.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use collab_auth::config::{AppConfig, OAuthSettings};
use collab_auth::oauth::HttpIdentityProvider;
use collab_auth::server::{AppState, create_app};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};

pub const CLIENT_ID: &str = "client-123";
pub const CLIENT_SECRET: &str = "secret-456";
pub const REDIRECT_URI: &str = "https://app.example.com/api/auth/callback";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Configuration pointing the provider endpoints at `provider_base`.
pub fn test_config(provider_base: &str) -> AppConfig {
    let mut config = AppConfig {
        client_id: Some(CLIENT_ID.to_string()),
        client_secret: Some(CLIENT_SECRET.to_string()),
        redirect_uri: Some(REDIRECT_URI.to_string()),
        ..Default::default()
    };
    config.oauth.authorize_url = format!("{provider_base}/oauth/");
    config.oauth.token_url = format!("{provider_base}/gate/lab/api/oauth/token/code");
    config.oauth.profile_url = format!("{provider_base}/gate/lab/api/secondme/user/info");
    config.oauth.http_timeout_ms = 2_000;
    config
}

/// Builds the router against `db` with the real HTTP provider client.
pub fn build_app(config: AppConfig, db: DatabaseConnection) -> axum::Router {
    let oauth = OAuthSettings::from_config(&config).unwrap();
    let provider = Arc::new(HttpIdentityProvider::new(&oauth).unwrap());

    create_app(AppState {
        config: Arc::new(config),
        oauth: Arc::new(oauth),
        db,
        provider,
    })
}
