//! Login flow steps shared by the `/api/auth` handlers.
//!
//! The handlers own HTTP concerns; this module decides what a callback means.
//! [`validate_callback`] runs the checks that need no network access and
//! [`complete_login`] runs the exchange phase against the provider and the
//! identity store.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use sea_orm::DatabaseConnection;
use url::{Url, form_urlencoded};

use crate::config::OAuthSettings;
use crate::models::user_identity::Model as UserIdentityModel;
use crate::oauth::state_token::{self, StateToken};
use crate::oauth::{ExchangeError, IdentityProvider};
use crate::repositories::{OAuthStateRepository, UpsertUserIdentity, UserIdentityRepository};

/// Cookie carrying the encoded state token between login and callback.
pub const STATE_COOKIE: &str = "oauth_state";

/// Cookie carrying the session bearer value after a successful login.
pub const SESSION_COOKIE: &str = "session";

/// Provider error codes longer than this are truncated before being reflected.
const MAX_PROVIDER_ERROR_LEN: usize = 64;

/// Why a callback did not produce a session. Rendered as `?error=<code>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    /// The provider redirected back with its own `error` code.
    Provider(String),
    NoCode,
    InvalidState,
    AuthFailed,
}

impl LoginFailure {
    pub fn code(&self) -> &str {
        match self {
            LoginFailure::Provider(code) => code,
            LoginFailure::NoCode => "no_code",
            LoginFailure::InvalidState => "invalid_state",
            LoginFailure::AuthFailed => "auth_failed",
        }
    }
}

impl From<ExchangeError> for LoginFailure {
    fn from(_: ExchangeError) -> Self {
        LoginFailure::AuthFailed
    }
}

/// Query parameters of the provider redirect.
///
/// Parsed leniently from the raw query string so a malformed callback still
/// gets a redirect (and a cleared state cookie) instead of a rejection. The
/// first occurrence of a repeated key wins; empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                _ => continue,
            };
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value.into_owned());
            }
        }

        params
    }
}

/// Authorization endpoint URL for a login attempt carrying `state`.
pub fn authorization_url(settings: &OAuthSettings, state: &str) -> Url {
    let mut url = settings.authorize_url.clone();
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", &settings.client_id)
            .append_pair("redirect_uri", settings.redirect_uri.as_str())
            .append_pair("response_type", "code")
            .append_pair("state", state);
        if !settings.prompt.is_empty() {
            query.append_pair("prompt", &settings.prompt);
        }
    }
    url
}

/// Run the callback checks that precede the exchange phase, in order:
/// provider error, missing code, state mismatch.
///
/// Returns the authorization code and the decoded state token.
pub fn validate_callback(
    params: &CallbackParams,
    stored_state: Option<&str>,
) -> Result<(String, StateToken), LoginFailure> {
    if let Some(error) = &params.error {
        let mut code = error.clone();
        if code.len() > MAX_PROVIDER_ERROR_LEN {
            let mut end = MAX_PROVIDER_ERROR_LEN;
            while !code.is_char_boundary(end) {
                end -= 1;
            }
            code.truncate(end);
        }
        return Err(LoginFailure::Provider(code));
    }

    let Some(code) = &params.code else {
        return Err(LoginFailure::NoCode);
    };

    let (Some(returned), Some(stored)) = (params.state.as_deref(), stored_state) else {
        return Err(LoginFailure::InvalidState);
    };
    if !state_token::matches_cookie(returned, stored) {
        return Err(LoginFailure::InvalidState);
    }

    let token = StateToken::decode(stored).map_err(|_| LoginFailure::InvalidState)?;

    Ok((code.clone(), token))
}

/// Successful exchange phase result.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: UserIdentityModel,
    /// Bearer value for the session cookie
    pub session_token: String,
    pub session_max_age_seconds: i64,
}

/// Exchange phase: redeem the code, fetch the profile and upsert the identity.
///
/// Nothing is written unless both provider calls succeed and the profile
/// yields a non-empty identity key.
pub async fn complete_login(
    db: &DatabaseConnection,
    provider: &dyn IdentityProvider,
    settings: &OAuthSettings,
    code: &str,
    state: &StateToken,
    now: DateTime<Utc>,
) -> Result<LoginOutcome, ExchangeError> {
    if settings.state_single_use {
        redeem_state(db, settings, state, now).await?;
    }

    let tokens = provider.exchange_code(code).await?;
    if tokens.expires_in_seconds <= 0 {
        return Err(ExchangeError::InvalidTokenLifetime {
            expires_in: tokens.expires_in_seconds,
        });
    }

    let profile = provider.fetch_profile(&tokens.access_token).await?;
    let external_id = profile
        .external_id()
        .ok_or(ExchangeError::EmptyIdentityKey)?
        .to_string();

    let token_expires_at = Duration::try_seconds(tokens.expires_in_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or(ExchangeError::InvalidTokenLifetime {
            expires_in: tokens.expires_in_seconds,
        })?;

    let identity = UserIdentityRepository::new(db)
        .upsert(
            UpsertUserIdentity {
                external_id,
                name: profile.name,
                email: profile.email,
                avatar: profile.avatar_url,
                access_token: tokens.access_token.clone(),
                refresh_token: tokens.refresh_token,
                token_expires_at,
            },
            now,
        )
        .await?;

    Ok(LoginOutcome {
        identity,
        session_token: tokens.access_token,
        session_max_age_seconds: tokens.expires_in_seconds,
    })
}

/// Mark the state nonce as used. Runs before any provider call so a replayed
/// callback never reaches the token endpoint.
async fn redeem_state(
    db: &DatabaseConnection,
    settings: &OAuthSettings,
    state: &StateToken,
    now: DateTime<Utc>,
) -> Result<(), ExchangeError> {
    let ttl = state_ttl(settings);
    if state.is_expired(ttl, now) {
        return Err(ExchangeError::StateExpired);
    }

    let first_use = OAuthStateRepository::new(db)
        .consume(&state.nonce, state.expires_at(ttl), now)
        .await?;
    if !first_use {
        return Err(ExchangeError::StateReplayed);
    }

    Ok(())
}

fn state_ttl(settings: &OAuthSettings) -> Duration {
    Duration::from_std(settings.state_ttl).unwrap_or(Duration::MAX)
}

/// Location for a failed callback: the error landing path with `?error=<code>`.
pub fn failure_redirect(settings: &OAuthSettings, failure: &LoginFailure) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("error", failure.code())
        .finish();
    let path = &settings.error_redirect_path;
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{query}")
}

fn auth_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// State cookie issued at login, living as long as the state token.
pub fn state_cookie(settings: &OAuthSettings, encoded_state: String) -> Cookie<'static> {
    let mut cookie = auth_cookie(STATE_COOKIE, encoded_state, settings.cookie_secure);
    cookie.set_max_age(time::Duration::seconds(
        i64::try_from(settings.state_ttl.as_secs()).unwrap_or(i64::MAX),
    ));
    cookie
}

/// Expired state cookie attached to every callback response.
pub fn clear_state_cookie(settings: &OAuthSettings) -> Cookie<'static> {
    let mut cookie = auth_cookie(STATE_COOKIE, String::new(), settings.cookie_secure);
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

/// Session cookie whose lifetime matches the provider access token.
pub fn session_cookie(
    settings: &OAuthSettings,
    access_token: String,
    max_age_seconds: i64,
) -> Cookie<'static> {
    let mut cookie = auth_cookie(SESSION_COOKIE, access_token, settings.cookie_secure);
    cookie.set_max_age(time::Duration::seconds(max_age_seconds));
    cookie
}

pub fn clear_session_cookie(settings: &OAuthSettings) -> Cookie<'static> {
    let mut cookie = auth_cookie(SESSION_COOKIE, String::new(), settings.cookie_secure);
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn settings() -> OAuthSettings {
        let config = AppConfig {
            client_id: Some("client-123".to_string()),
            client_secret: Some("secret-456".to_string()),
            redirect_uri: Some("https://app.example.com/api/auth/callback".to_string()),
            ..Default::default()
        };
        OAuthSettings::from_config(&config).unwrap()
    }

    #[test]
    fn test_authorization_url_carries_all_parameters() {
        let settings = settings();
        let url = authorization_url(&settings, "state-xyz");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("client_id".to_string(), "client-123".to_string()),
                (
                    "redirect_uri".to_string(),
                    "https://app.example.com/api/auth/callback".to_string()
                ),
                ("response_type".to_string(), "code".to_string()),
                ("state".to_string(), "state-xyz".to_string()),
                ("prompt".to_string(), "consent".to_string()),
            ]
        );
        assert_eq!(url.host_str(), Some("go.second.me"));
    }

    #[test]
    fn test_callback_params_parsing() {
        let params = CallbackParams::from_query(Some("code=abc&state=s%2Bt&code=other&error="));
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("s+t"));
        assert_eq!(params.error, None);

        assert_eq!(CallbackParams::from_query(None), CallbackParams::default());
        assert_eq!(
            CallbackParams::from_query(Some("%%%&&==")),
            CallbackParams::default()
        );
    }

    #[test]
    fn test_validation_order() {
        let stored = StateToken::generate(Utc::now()).encode();

        // Provider error wins over everything else.
        let params = CallbackParams {
            code: Some("abc".to_string()),
            state: Some("bogus".to_string()),
            error: Some("access_denied".to_string()),
        };
        assert_eq!(
            validate_callback(&params, Some(&stored)).unwrap_err(),
            LoginFailure::Provider("access_denied".to_string())
        );

        // Missing code is reported before a state mismatch.
        let params = CallbackParams {
            code: None,
            state: Some("bogus".to_string()),
            error: None,
        };
        assert_eq!(
            validate_callback(&params, Some(&stored)).unwrap_err(),
            LoginFailure::NoCode
        );

        let params = CallbackParams {
            code: Some("abc".to_string()),
            state: Some("bogus".to_string()),
            error: None,
        };
        assert_eq!(
            validate_callback(&params, Some(&stored)).unwrap_err(),
            LoginFailure::InvalidState
        );

        let params = CallbackParams {
            code: Some("abc".to_string()),
            state: Some(stored.clone()),
            error: None,
        };
        assert_eq!(
            validate_callback(&params, None).unwrap_err(),
            LoginFailure::InvalidState
        );

        let (code, token) = validate_callback(&params, Some(&stored)).unwrap();
        assert_eq!(code, "abc");
        assert_eq!(token.encode(), stored);
    }

    #[test]
    fn test_matching_but_undecodable_state_is_invalid() {
        let params = CallbackParams {
            code: Some("abc".to_string()),
            state: Some("forged".to_string()),
            error: None,
        };
        assert_eq!(
            validate_callback(&params, Some("forged")).unwrap_err(),
            LoginFailure::InvalidState
        );
    }

    #[test]
    fn test_provider_error_is_truncated() {
        let params = CallbackParams {
            error: Some("x".repeat(500)),
            ..Default::default()
        };
        let failure = validate_callback(&params, None).unwrap_err();
        assert_eq!(failure.code().len(), MAX_PROVIDER_ERROR_LEN);
    }

    #[test]
    fn test_failure_redirect_encodes_code() {
        let mut settings = settings();
        assert_eq!(
            failure_redirect(&settings, &LoginFailure::InvalidState),
            "/?error=invalid_state"
        );
        assert_eq!(
            failure_redirect(&settings, &LoginFailure::Provider("a b&c".to_string())),
            "/?error=a+b%26c"
        );

        settings.error_redirect_path = "/login?from=oauth".to_string();
        assert_eq!(
            failure_redirect(&settings, &LoginFailure::AuthFailed),
            "/login?from=oauth&error=auth_failed"
        );
    }

    #[test]
    fn test_cookie_attributes() {
        let settings = settings();

        let cookie = state_cookie(&settings, "abc".to_string());
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(600)));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));

        let cleared = clear_state_cookie(&settings);
        assert_eq!(cleared.name(), STATE_COOKIE);
        assert_eq!(cleared.max_age(), Some(time::Duration::ZERO));

        let session = session_cookie(&settings, "at-1".to_string(), 3600);
        assert!(session.to_string().contains("Max-Age=3600"));
    }
}
