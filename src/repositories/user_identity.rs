//! # User Identity Repository
//!
//! Persistence for provider identities. A login either creates the record or
//! refreshes it in place; the external id is the natural key.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};

use crate::error::RepositoryError;
use crate::models::user_identity::{
    ActiveModel as UserIdentityActiveModel, Column, Entity as UserIdentity,
    Model as UserIdentityModel,
};

/// Profile and token data captured at the end of a successful login
#[derive(Debug, Clone)]
pub struct UpsertUserIdentity {
    pub external_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: DateTime<Utc>,
}

/// Repository for user identity database operations
pub struct UserIdentityRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> UserIdentityRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create the identity, or overwrite profile and token fields of the
    /// existing record with the same external id.
    ///
    /// The write is a single `INSERT .. ON CONFLICT DO UPDATE`, so concurrent
    /// first logins for one subject still leave exactly one record.
    pub async fn upsert(
        &self,
        request: UpsertUserIdentity,
        now: DateTime<Utc>,
    ) -> Result<UserIdentityModel, RepositoryError> {
        let external_id = request.external_id.trim().to_string();
        if external_id.is_empty() {
            return Err(RepositoryError::validation_error(
                "external id cannot be empty",
            ));
        }
        if request.access_token.is_empty() {
            return Err(RepositoryError::validation_error(
                "access token cannot be empty",
            ));
        }

        let identity = UserIdentityActiveModel {
            external_id: Set(external_id.clone()),
            name: Set(request.name),
            email: Set(request.email),
            avatar: Set(request.avatar),
            access_token: Set(request.access_token),
            refresh_token: Set(request.refresh_token),
            token_expires_at: Set(request.token_expires_at),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        UserIdentity::insert(identity)
            .on_conflict(
                OnConflict::column(Column::ExternalId)
                    .update_columns([
                        Column::Name,
                        Column::Email,
                        Column::Avatar,
                        Column::AccessToken,
                        Column::RefreshToken,
                        Column::TokenExpiresAt,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        self.find_by_external_id(&external_id).await?.ok_or_else(|| {
            RepositoryError::database_error(sea_orm::DbErr::RecordNotFound(format!(
                "user identity {external_id}"
            )))
        })
    }

    pub async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<UserIdentityModel>, RepositoryError> {
        UserIdentity::find()
            .filter(Column::ExternalId.eq(external_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Look up the identity whose current access token is `access_token`.
    ///
    /// Tokens replaced by a later login no longer resolve.
    pub async fn find_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<UserIdentityModel>, RepositoryError> {
        if access_token.is_empty() {
            return Ok(None);
        }

        UserIdentity::find()
            .filter(Column::AccessToken.eq(access_token))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        UserIdentity::find()
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn setup() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    fn login(external_id: &str, token: &str, now: DateTime<Utc>) -> UpsertUserIdentity {
        UpsertUserIdentity {
            external_id: external_id.to_string(),
            name: Some("Ada".to_string()),
            email: Some("a@x.com".to_string()),
            avatar: None,
            access_token: token.to_string(),
            refresh_token: Some("rt-1".to_string()),
            token_expires_at: now + Duration::seconds(3600),
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates_in_place() {
        let db = setup().await;
        let repo = UserIdentityRepository::new(&db);
        let first_login = Utc::now();

        let created = repo
            .upsert(login("a@x.com", "at-1", first_login), first_login)
            .await
            .unwrap();
        assert_eq!(created.access_token, "at-1");
        assert_eq!(repo.count().await.unwrap(), 1);

        let second_login = first_login + Duration::minutes(5);
        let mut request = login("a@x.com", "at-2", second_login);
        request.name = Some("Ada L.".to_string());
        request.refresh_token = None;

        let updated = repo.upsert(request, second_login).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.access_token, "at-2");
        assert_eq!(updated.name.as_deref(), Some("Ada L."));
        assert_eq!(updated.refresh_token, None);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn test_upsert_rejects_empty_external_id() {
        let db = setup().await;
        let repo = UserIdentityRepository::new(&db);
        let now = Utc::now();

        let result = repo.upsert(login("   ", "at-1", now), now).await;

        assert!(matches!(result, Err(RepositoryError::Validation(_))));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_access_token_tracks_latest_login() {
        let db = setup().await;
        let repo = UserIdentityRepository::new(&db);
        let now = Utc::now();

        repo.upsert(login("a@x.com", "at-1", now), now).await.unwrap();
        repo.upsert(login("a@x.com", "at-2", now), now).await.unwrap();

        assert!(repo.find_by_access_token("at-1").await.unwrap().is_none());
        let found = repo.find_by_access_token("at-2").await.unwrap().unwrap();
        assert_eq!(found.external_id, "a@x.com");
        assert!(repo.find_by_access_token("").await.unwrap().is_none());
    }
}
