//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the
//! identity store and the state nonce ledger.

pub mod oauth_state;
pub mod user_identity;

pub use oauth_state::OAuthStateRepository;
pub use user_identity::{UpsertUserIdentity, UserIdentityRepository};
