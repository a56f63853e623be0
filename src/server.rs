//! # Server Configuration
//!
//! This module contains the server setup and configuration for the auth service.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{AppConfig, OAuthSettings};
use crate::handlers;
use crate::oauth::IdentityProvider;
use crate::repositories::OAuthStateRepository;
use crate::telemetry;

/// How often expired entries are purged from the state nonce ledger.
const NONCE_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub oauth: Arc<OAuthSettings>,
    pub db: DatabaseConnection,
    pub provider: Arc<dyn IdentityProvider>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/api/auth/login", get(handlers::auth::login))
        .route("/api/auth/callback", get(handlers::auth::callback))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Spawn the background task purging expired state nonces.
pub fn spawn_nonce_janitor(db: DatabaseConnection) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(NONCE_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            match OAuthStateRepository::new(&db).cleanup_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Purged expired OAuth state nonces"),
                Err(err) => tracing::warn!(error = %err, "Failed to purge OAuth state nonces"),
            }
        }
    })
}

/// Starts the server and serves until Ctrl-C
pub async fn run_server(
    config: AppConfig,
    oauth: OAuthSettings,
    db: DatabaseConnection,
    provider: Arc<dyn IdentityProvider>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Resolve the configured bind address
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let janitor = oauth
        .state_single_use
        .then(|| spawn_nonce_janitor(db.clone()));

    let state = AppState {
        config: Arc::new(config),
        oauth: Arc::new(oauth),
        db,
        provider,
    };
    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(janitor) = janitor {
        janitor.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::auth::login,
        crate::handlers::auth::callback,
        crate::handlers::auth::me,
        crate::handlers::auth::logout,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::HealthResponse,
            crate::models::user_identity::UserIdentityResponse,
            crate::error::ApiError,
        )
    ),
    tags(
        (name = "root", description = "Service metadata"),
        (name = "auth", description = "OAuth login and session endpoints")
    ),
    info(
        title = "Collab Auth API",
        description = "OAuth authorization-code login and session issuance",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
