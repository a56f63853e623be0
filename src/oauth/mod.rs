//! # OAuth Login
//!
//! Authorization-code login against the identity provider: state token codec,
//! provider client and the callback validation and exchange steps.

pub mod flow;
pub mod provider;
pub mod state_token;

use thiserror::Error;

use crate::error::RepositoryError;

pub use flow::{
    CallbackParams, LoginFailure, LoginOutcome, SESSION_COOKIE, STATE_COOKIE, authorization_url,
    complete_login, failure_redirect, validate_callback,
};
pub use provider::{HttpIdentityProvider, IdentityProvider, ProviderCall, TokenSet, UserProfile};
pub use state_token::{StateToken, StateTokenError};

/// Reasons the exchange phase of a callback failed.
///
/// All of them reach the browser as the same `auth_failed` redirect; the
/// variant is only logged.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("{call} request failed: {source}")]
    Transport {
        call: ProviderCall,
        #[source]
        source: reqwest::Error,
    },
    #[error("{call} timed out")]
    Timeout { call: ProviderCall },
    #[error("{call} returned an unreadable body: {source}")]
    Malformed {
        call: ProviderCall,
        #[source]
        source: reqwest::Error,
    },
    #[error("{call} returned HTTP {status}")]
    HttpStatus { call: ProviderCall, status: u16 },
    #[error("{call} returned provider code {code}: {}", .message.as_deref().unwrap_or("no message"))]
    ProviderStatus {
        call: ProviderCall,
        code: i64,
        message: Option<String>,
    },
    #[error("{call} response carried no data")]
    MissingPayload { call: ProviderCall },
    #[error("token lifetime must be positive, got {expires_in}")]
    InvalidTokenLifetime { expires_in: i64 },
    #[error("profile has neither an email nor an id")]
    EmptyIdentityKey,
    #[error("failed to persist identity: {0}")]
    Persistence(#[from] RepositoryError),
    #[error("state token expired")]
    StateExpired,
    #[error("state token already redeemed")]
    StateReplayed,
}

impl ExchangeError {
    pub(crate) fn transport(call: ProviderCall, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { call }
        } else if source.is_decode() {
            Self::Malformed { call, source }
        } else {
            Self::Transport { call, source }
        }
    }
}
