//! # User Identity Model
//!
//! Local record of an identity provider subject, keyed by the provider-derived
//! external id and refreshed on every login.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User identity entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_identities")]
pub struct Model {
    /// Surrogate primary key
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Provider-derived identity key (email, falling back to the provider id)
    #[sea_orm(unique)]
    pub external_id: String,

    pub name: Option<String>,

    pub email: Option<String>,

    /// Avatar URL as reported by the provider
    pub avatar: Option<String>,

    /// Latest provider access token; doubles as the session bearer value
    pub access_token: String,

    pub refresh_token: Option<String>,

    /// When the access token (and so the session cookie) expires
    pub token_expires_at: chrono::DateTime<chrono::Utc>,

    pub created_at: chrono::DateTime<chrono::Utc>,

    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Public view of a user identity; never exposes tokens
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserIdentityResponse {
    /// Provider-derived identity key
    pub external_id: String,
    /// Display name
    pub name: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Avatar URL
    pub avatar: Option<String>,
    /// Session expiry (RFC 3339)
    pub session_expires_at: String,
}

impl From<Model> for UserIdentityResponse {
    fn from(model: Model) -> Self {
        Self {
            external_id: model.external_id,
            name: model.name,
            email: model.email,
            avatar: model.avatar,
            session_expires_at: model.token_expires_at.to_rfc3339(),
        }
    }
}
