//! # Session Resolution
//!
//! Resolves the `session` cookie issued by the login callback to the identity
//! it was issued for. This is the "given a session token, identify the user"
//! contract offered to the rest of the application.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use crate::error::{ApiError, unauthorized};
use crate::models::user_identity::Model as UserIdentityModel;
use crate::oauth::SESSION_COOKIE;
use crate::repositories::UserIdentityRepository;
use crate::server::AppState;

/// Identity behind a valid session cookie.
///
/// Rejects with `401` when the cookie is absent, does not match the latest
/// access token of any identity, or has outlived the token's expiry.
#[derive(Debug, Clone)]
pub struct SessionUser(pub UserIdentityModel);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| unauthorized(Some("Session cookie missing")))?;

        let identity = UserIdentityRepository::new(&state.db)
            .find_by_access_token(&token)
            .await?
            .ok_or_else(|| unauthorized(Some("Session is not recognized")))?;

        if identity.token_expires_at <= Utc::now() {
            tracing::debug!(external_id = %identity.external_id, "Session token expired");
            return Err(unauthorized(Some("Session expired")));
        }

        Ok(SessionUser(identity))
    }
}
