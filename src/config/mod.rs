//! Configuration loading for the collaboration auth service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `COLLAB_`, producing a typed [`AppConfig`]. The login handlers never read
//! the environment themselves: they receive an [`OAuthSettings`] built once at
//! startup by [`OAuthSettings::from_config`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Prefix shared by every environment variable the service reads.
pub const ENV_PREFIX: &str = "COLLAB_";

/// Application configuration derived from `COLLAB_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub oauth: OAuthProviderConfig,
    #[serde(default = "default_post_login_path")]
    pub post_login_path: String,
    #[serde(default = "default_error_redirect_path")]
    pub error_redirect_path: String,
    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,
}

/// Identity provider endpoints and login flow tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct OAuthProviderConfig {
    /// Authorization endpoint the browser is redirected to
    ///
    /// Environment variable: `COLLAB_OAUTH_AUTHORIZE_URL`
    #[serde(default = "default_oauth_authorize_url")]
    pub authorize_url: String,

    /// Token endpoint receiving the authorization code
    ///
    /// Environment variable: `COLLAB_OAUTH_TOKEN_URL`
    #[serde(default = "default_oauth_token_url")]
    pub token_url: String,

    /// Profile endpoint queried with the access token
    ///
    /// Environment variable: `COLLAB_OAUTH_PROFILE_URL`
    #[serde(default = "default_oauth_profile_url")]
    pub profile_url: String,

    /// Provider-specific UX hint sent as the `prompt` parameter
    #[serde(default = "default_oauth_prompt")]
    pub prompt: String,

    /// Upper bound for each outbound provider call, in milliseconds (default: 10000)
    #[serde(default = "default_oauth_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Lifetime of the `oauth_state` cookie in seconds (default: 600)
    #[serde(default = "default_oauth_state_ttl_seconds")]
    pub state_ttl_seconds: u64,

    /// Record consumed state nonces and reject replays within the TTL window
    #[serde(default)]
    pub state_single_use: bool,
}

impl Default for OAuthProviderConfig {
    fn default() -> Self {
        Self {
            authorize_url: default_oauth_authorize_url(),
            token_url: default_oauth_token_url(),
            profile_url: default_oauth_profile_url(),
            prompt: default_oauth_prompt(),
            http_timeout_ms: default_oauth_http_timeout_ms(),
            state_ttl_seconds: default_oauth_state_ttl_seconds(),
            state_single_use: false,
        }
    }
}

impl OAuthProviderConfig {
    /// Validate provider tuning bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_timeout_ms == 0 || self.http_timeout_ms > 60_000 {
            return Err(ConfigError::InvalidHttpTimeout {
                value: self.http_timeout_ms,
            });
        }

        if self.state_ttl_seconds < 60 || self.state_ttl_seconds > 3600 {
            return Err(ConfigError::InvalidStateTtl {
                value: self.state_ttl_seconds,
            });
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            oauth: OAuthProviderConfig::default(),
            post_login_path: default_post_login_path(),
            error_redirect_path: default_error_redirect_path(),
            cookie_secure: default_cookie_secure(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.client_secret.is_some() {
            config.client_secret = Some("[REDACTED]".to_string());
        }
        if let Ok(mut url) = Url::parse(&config.database_url)
            && url.password().is_some()
        {
            let _ = url.set_password(Some("[REDACTED]"));
            config.database_url = url.to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if a setting is out of bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.oauth.validate()?;

        for (field, value) in [
            ("POST_LOGIN_PATH", &self.post_login_path),
            ("ERROR_REDIRECT_PATH", &self.error_redirect_path),
        ] {
            // Only same-origin absolute paths; "//host" would be an open redirect
            if !value.starts_with('/') || value.starts_with("//") {
                return Err(ConfigError::InvalidRedirectPath {
                    field,
                    value: value.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Validated login flow settings shared by the initiator and callback handlers.
///
/// Construction is the only place credentials are checked, so a running server
/// never discovers a missing client id mid-request.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub authorize_url: Url,
    pub token_url: Url,
    pub profile_url: Url,
    pub prompt: String,
    pub http_timeout: Duration,
    pub state_ttl: Duration,
    pub state_single_use: bool,
    pub post_login_path: String,
    pub error_redirect_path: String,
    pub cookie_secure: bool,
}

impl OAuthSettings {
    /// Builds the settings, failing on the first missing or malformed value.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let client_id = required(&config.client_id, ConfigError::MissingClientId)?;
        let client_secret = required(&config.client_secret, ConfigError::MissingClientSecret)?;
        let redirect_uri = required(&config.redirect_uri, ConfigError::MissingRedirectUri)?;

        config.validate()?;

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri: parse_url("REDIRECT_URI", &redirect_uri)?,
            authorize_url: parse_url("OAUTH_AUTHORIZE_URL", &config.oauth.authorize_url)?,
            token_url: parse_url("OAUTH_TOKEN_URL", &config.oauth.token_url)?,
            profile_url: parse_url("OAUTH_PROFILE_URL", &config.oauth.profile_url)?,
            prompt: config.oauth.prompt.clone(),
            http_timeout: Duration::from_millis(config.oauth.http_timeout_ms),
            state_ttl: Duration::from_secs(config.oauth.state_ttl_seconds),
            state_single_use: config.oauth.state_single_use,
            post_login_path: config.post_login_path.clone(),
            error_redirect_path: config.error_redirect_path.clone(),
            cookie_secure: config.cookie_secure,
        })
    }
}

fn required(value: &Option<String>, missing: ConfigError) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(missing)
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        source,
    })
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "postgresql://localhost:5432/collab".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_oauth_authorize_url() -> String {
    "https://go.second.me/oauth/".to_string()
}

fn default_oauth_token_url() -> String {
    "https://app.mindos.com/gate/lab/api/oauth/token/code".to_string()
}

fn default_oauth_profile_url() -> String {
    "https://app.mindos.com/gate/lab/api/secondme/user/info".to_string()
}

fn default_oauth_prompt() -> String {
    "consent".to_string()
}

fn default_oauth_http_timeout_ms() -> u64 {
    10_000 // 10 seconds
}

fn default_oauth_state_ttl_seconds() -> u64 {
    600 // 10 minutes
}

fn default_post_login_path() -> String {
    "/role-select".to_string()
}

fn default_error_redirect_path() -> String {
    "/".to_string()
}

fn default_cookie_secure() -> bool {
    true
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("OAuth client ID is missing; set COLLAB_CLIENT_ID environment variable")]
    MissingClientId,
    #[error("OAuth client secret is missing; set COLLAB_CLIENT_SECRET environment variable")]
    MissingClientSecret,
    #[error("OAuth redirect URI is missing; set COLLAB_REDIRECT_URI environment variable")]
    MissingRedirectUri,
    #[error("invalid URL for {field} '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("{field} must be a same-origin absolute path, got '{value}'")]
    InvalidRedirectPath { field: &'static str, value: String },
    #[error("OAuth HTTP timeout must be between 1 and 60000 milliseconds, got {value}")]
    InvalidHttpTimeout { value: u64 },
    #[error("OAuth state TTL must be between 60 and 3600 seconds, got {value}")]
    InvalidStateTtl { value: u64 },
}

/// Loads configuration using layered `.env` files and `COLLAB_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates configuration. Credentials are checked separately
    /// by [`OAuthSettings::from_config`].
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_bind_addr =
            take_string(&mut layered, "API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_string(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_parsed(&mut layered, "DB_MAX_CONNECTIONS")
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_parsed(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")
            .unwrap_or_else(default_db_acquire_timeout_ms);

        // Provider credentials
        let client_id = take_string(&mut layered, "CLIENT_ID");
        let client_secret = take_string(&mut layered, "CLIENT_SECRET");
        let redirect_uri = take_string(&mut layered, "REDIRECT_URI");

        let oauth = OAuthProviderConfig {
            authorize_url: take_string(&mut layered, "OAUTH_AUTHORIZE_URL")
                .unwrap_or_else(default_oauth_authorize_url),
            token_url: take_string(&mut layered, "OAUTH_TOKEN_URL")
                .unwrap_or_else(default_oauth_token_url),
            profile_url: take_string(&mut layered, "OAUTH_PROFILE_URL")
                .unwrap_or_else(default_oauth_profile_url),
            prompt: take_string(&mut layered, "OAUTH_PROMPT").unwrap_or_else(default_oauth_prompt),
            http_timeout_ms: take_parsed(&mut layered, "OAUTH_HTTP_TIMEOUT_MS")
                .unwrap_or_else(default_oauth_http_timeout_ms),
            state_ttl_seconds: take_parsed(&mut layered, "OAUTH_STATE_TTL_SECONDS")
                .unwrap_or_else(default_oauth_state_ttl_seconds),
            state_single_use: take_parsed(&mut layered, "OAUTH_STATE_SINGLE_USE")
                .unwrap_or(false),
        };

        let post_login_path =
            take_string(&mut layered, "POST_LOGIN_PATH").unwrap_or_else(default_post_login_path);
        let error_redirect_path = take_string(&mut layered, "ERROR_REDIRECT_PATH")
            .unwrap_or_else(default_error_redirect_path);
        let cookie_secure =
            take_parsed(&mut layered, "COOKIE_SECURE").unwrap_or_else(default_cookie_secure);

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            client_id,
            client_secret,
            redirect_uri,
            oauth,
            post_login_path,
            error_redirect_path,
            cookie_secure,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn take_parsed<T: std::str::FromStr>(layered: &mut BTreeMap<String, String>, key: &str) -> Option<T> {
    layered.remove(key).and_then(|v| v.trim().parse().ok())
}
