//! # OAuth State Repository
//!
//! Ledger of redeemed state nonces backing single-use state tokens.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::error::RepositoryError;
use crate::models::oauth_state::{ActiveModel, Column, Entity};

/// Repository for consumed OAuth state nonces
pub struct OAuthStateRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> OAuthStateRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Record `nonce` as redeemed.
    ///
    /// Returns `true` for the first redemption and `false` when the nonce was
    /// already in the ledger. The check and the write are one statement.
    pub async fn consume(
        &self,
        nonce: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        if nonce.is_empty() {
            return Err(RepositoryError::validation_error("nonce cannot be empty"));
        }

        let entry = ActiveModel {
            nonce: Set(nonce.to_string()),
            expires_at: Set(expires_at),
            consumed_at: Set(now),
        };

        let inserted = Entity::insert(entry)
            .on_conflict(OnConflict::column(Column::Nonce).do_nothing().to_owned())
            .exec_without_returning(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(inserted == 1)
    }

    /// Delete ledger entries whose state tokens have expired.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = Entity::delete_many()
            .filter(Column::ExpiresAt.lt(now))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        Ok(result.rows_affected)
    }
}
