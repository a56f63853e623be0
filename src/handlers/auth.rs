//! # Auth Handlers
//!
//! Browser-facing login endpoints. `login` and `callback` always answer with a
//! `302` redirect; `me` and `logout` serve the session contract to the app.

use axum::{
    extract::{RawQuery, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Json, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use crate::error::ApiError;
use crate::models::user_identity::UserIdentityResponse;
use crate::oauth::flow::{clear_session_cookie, clear_state_cookie, session_cookie, state_cookie};
use crate::oauth::{
    CallbackParams, LoginFailure, STATE_COOKIE, StateToken, authorization_url, complete_login,
    failure_redirect, validate_callback,
};
use crate::server::AppState;
use crate::session::SessionUser;

fn found(jar: CookieJar, location: String) -> Response {
    (StatusCode::FOUND, jar, [(LOCATION, location)]).into_response()
}

/// Start a login
///
/// Mints a state token, stores it in the `oauth_state` cookie and redirects
/// the browser to the provider's authorization endpoint.
#[utoipa::path(
    get,
    path = "/api/auth/login",
    responses(
        (status = 302, description = "Redirect to the identity provider; sets the oauth_state cookie")
    ),
    tag = "auth"
)]
pub async fn login(State(state): State<AppState>, jar: CookieJar) -> Response {
    let token = StateToken::generate(Utc::now());
    let encoded = token.encode();
    let location = authorization_url(&state.oauth, &encoded);

    tracing::debug!(nonce_len = token.nonce.len(), "Issued OAuth state token");

    let jar = jar.add(state_cookie(&state.oauth, encoded));
    found(jar, location.into())
}

/// Complete a login
///
/// Validates the provider redirect, exchanges the code, records the identity
/// and issues the session cookie. Failures redirect to the error landing path
/// with `?error=<code>`. The `oauth_state` cookie is cleared on every path.
#[utoipa::path(
    get,
    path = "/api/auth/callback",
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "State token echoed by the provider"),
        ("error" = Option<String>, Query, description = "Provider error code")
    ),
    responses(
        (status = 302, description = "Redirect to the post-login path with a session cookie, or to the error landing path")
    ),
    tag = "auth"
)]
pub async fn callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    jar: CookieJar,
) -> Response {
    let params = CallbackParams::from_query(query.as_deref());
    let stored_state = jar.get(STATE_COOKIE).map(|cookie| cookie.value().to_string());
    let jar = jar.add(clear_state_cookie(&state.oauth));

    let (code, token) = match validate_callback(&params, stored_state.as_deref()) {
        Ok(validated) => validated,
        Err(failure) => {
            match &failure {
                LoginFailure::Provider(code) => {
                    tracing::warn!(provider_error = %code, "Identity provider returned an error")
                }
                LoginFailure::InvalidState => tracing::warn!(
                    state_present = params.state.is_some(),
                    cookie_present = stored_state.is_some(),
                    "OAuth state validation failed"
                ),
                other => tracing::info!(error = other.code(), "OAuth callback rejected"),
            }
            return found(jar, failure_redirect(&state.oauth, &failure));
        }
    };

    let outcome = match complete_login(
        &state.db,
        state.provider.as_ref(),
        &state.oauth,
        &code,
        &token,
        Utc::now(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(error = %err, "OAuth login failed during exchange");
            let failure = LoginFailure::from(err);
            return found(jar, failure_redirect(&state.oauth, &failure));
        }
    };

    tracing::info!(
        external_id = %outcome.identity.external_id,
        session_max_age = outcome.session_max_age_seconds,
        "User logged in"
    );

    let jar = jar.add(session_cookie(
        &state.oauth,
        outcome.session_token,
        outcome.session_max_age_seconds,
    ));
    found(jar, state.oauth.post_login_path.clone())
}

/// Current user
///
/// Returns the identity behind the `session` cookie.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Authenticated user", body = UserIdentityResponse),
        (status = 401, description = "Missing, unknown or expired session", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn me(SessionUser(identity): SessionUser) -> Json<UserIdentityResponse> {
    Json(identity.into())
}

/// Log out
///
/// Expires the `session` cookie. The identity record is kept.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session cookie cleared")
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (StatusCode::NO_CONTENT, jar.add(clear_session_cookie(&state.oauth)))
}
