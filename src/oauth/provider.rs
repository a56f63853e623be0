//! Identity provider client.
//!
//! Defines the [`IdentityProvider`] seam used by the callback handler and the
//! HTTP implementation talking to the provider's token and profile endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::OAuthSettings;
use crate::oauth::ExchangeError;

/// Provider call that failed, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderCall {
    TokenExchange,
    ProfileFetch,
}

impl std::fmt::Display for ProviderCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderCall::TokenExchange => f.write_str("token exchange"),
            ProviderCall::ProfileFetch => f.write_str("profile fetch"),
        }
    }
}

/// Tokens obtained from the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in_seconds: i64,
}

/// Subject profile as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// Identity key: the email when present, otherwise the provider id.
    /// Blank values count as absent.
    pub fn external_id(&self) -> Option<&str> {
        [self.email.as_deref(), self.id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

/// Operations the login callback needs from an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Redeem an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, ExchangeError>;

    /// Fetch the subject profile with a freshly issued access token.
    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ExchangeError>;
}

/// Response envelope shared by the provider's endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenData {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, alias = "avatarUrl")]
    avatar: Option<String>,
}

impl From<ProfileData> for UserProfile {
    fn from(data: ProfileData) -> Self {
        // Providers report the id as either a string or a number
        let id = match data.id {
            Some(serde_json::Value::String(id)) => Some(id),
            Some(serde_json::Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };

        Self {
            id,
            name: data.name,
            email: data.email,
            avatar_url: data.avatar,
        }
    }
}

/// HTTP client for the provider's token and profile endpoints.
///
/// Every call is bounded by the configured timeout and never retried: an
/// authorization code is single use, so a retry would only fail again.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    token_url: Url,
    profile_url: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: Url,
}

impl HttpIdentityProvider {
    pub fn new(settings: &OAuthSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .connect_timeout(settings.http_timeout.min(Duration::from_secs(5)))
            .user_agent(concat!("collab-auth/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            token_url: settings.token_url.clone(),
            profile_url: settings.profile_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
        })
    }

    async fn read_envelope<T: DeserializeOwned>(
        call: ProviderCall,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, ExchangeError> {
        let response = response.map_err(|source| ExchangeError::transport(call, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExchangeError::HttpStatus {
                call,
                status: status.as_u16(),
            });
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|source| ExchangeError::transport(call, source))?;

        if envelope.code != 0 {
            return Err(ExchangeError::ProviderStatus {
                call,
                code: envelope.code,
                message: envelope.message,
            });
        }

        envelope
            .data
            .ok_or(ExchangeError::MissingPayload { call })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, ExchangeError> {
        let call = ProviderCall::TokenExchange;
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(self.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await;

        let data: TokenData = Self::read_envelope(call, response).await?;

        if data.access_token.trim().is_empty() {
            return Err(ExchangeError::MissingPayload { call });
        }
        Ok(TokenSet {
            access_token: data.access_token,
            refresh_token: data.refresh_token.filter(|t| !t.is_empty()),
            expires_in_seconds: data.expires_in,
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ExchangeError> {
        let response = self
            .client
            .get(self.profile_url.clone())
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await;

        let data: ProfileData = Self::read_envelope(ProviderCall::ProfileFetch, response).await?;
        Ok(data.into())
    }
}
