//! Anti-forgery state token codec.
//!
//! A [`StateToken`] is minted per login attempt, serialized as JSON and encoded
//! as URL-safe unpadded base64 so the same string can travel as the `state`
//! query parameter and as the `oauth_state` cookie value.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Number of random bytes in a nonce.
const NONCE_BYTES: usize = 32;

/// Upper bound on an encoded token accepted for decoding.
const MAX_ENCODED_LEN: usize = 512;

/// Errors produced when decoding a state token.
#[derive(Debug, Error)]
pub enum StateTokenError {
    #[error("state token exceeds {MAX_ENCODED_LEN} bytes")]
    TooLong,
    #[error("state token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("state token payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("state token nonce is empty")]
    EmptyNonce,
}

/// Anti-forgery token round-tripped through the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateToken {
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
}

impl StateToken {
    /// Mint a token with a fresh nonce from the OS random source.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);

        Self {
            nonce: URL_SAFE_NO_PAD.encode(bytes),
            issued_at: now,
        }
    }

    /// Transport encoding shared by the authorization URL and the cookie.
    pub fn encode(&self) -> String {
        // Serializing a String and a DateTime cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(encoded: &str) -> Result<Self, StateTokenError> {
        if encoded.len() > MAX_ENCODED_LEN {
            return Err(StateTokenError::TooLong);
        }

        let json = URL_SAFE_NO_PAD.decode(encoded)?;
        let token: StateToken = serde_json::from_slice(&json)?;
        if token.nonce.is_empty() {
            return Err(StateTokenError::EmptyNonce);
        }
        Ok(token)
    }

    /// Instant after which the token is no longer redeemable.
    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.issued_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now >= self.expires_at(ttl)
    }
}

/// Exact byte comparison of the returned `state` against the stored cookie,
/// in constant time for equal-length inputs.
pub fn matches_cookie(returned: &str, stored: &str) -> bool {
    returned.len() == stored.len() && bool::from(returned.as_bytes().ct_eq(stored.as_bytes()))
}
