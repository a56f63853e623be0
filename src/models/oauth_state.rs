//! # OAuth State Nonce Model
//!
//! Ledger of state nonces already redeemed by a callback. Only written when
//! single-use state tokens are enabled.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth_state_nonces")]
pub struct Model {
    /// Nonce carried by the redeemed state token
    #[sea_orm(primary_key, auto_increment = false)]
    pub nonce: String,

    /// After this instant the matching state cookie has expired anyway
    pub expires_at: chrono::DateTime<chrono::Utc>,

    /// When the callback redeemed the nonce
    pub consumed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
