//! # Collab Auth Main Entry Point
//!
//! This is the main entry point for the auth service.

use std::sync::Arc;

use collab_auth::{
    config::{ConfigLoader, OAuthSettings},
    db::{init_pool, run_migrations},
    oauth::HttpIdentityProvider,
    server::run_server,
    telemetry::init_tracing,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from layered env files and variables
    let config_loader = ConfigLoader::new();
    let config = config_loader.load()?;

    init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    // Missing provider credentials stop startup here, never per request
    let oauth = OAuthSettings::from_config(&config)?;

    let db = init_pool(&config).await?;
    run_migrations(&db).await?;

    let provider = Arc::new(HttpIdentityProvider::new(&oauth)?);

    run_server(config, oauth, db, provider).await
}
