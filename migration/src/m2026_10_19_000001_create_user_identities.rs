//! Migration to create the user_identities table.
//!
//! One row per external identity; `external_id` carries the unique
//! constraint the login upsert conflicts on.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserIdentities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserIdentities::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserIdentities::ExternalId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(UserIdentities::Name).string().null())
                    .col(ColumnDef::new(UserIdentities::Email).string().null())
                    .col(ColumnDef::new(UserIdentities::Avatar).text().null())
                    .col(ColumnDef::new(UserIdentities::AccessToken).text().not_null())
                    .col(ColumnDef::new(UserIdentities::RefreshToken).text().null())
                    .col(
                        ColumnDef::new(UserIdentities::TokenExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserIdentities::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(UserIdentities::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Session lookups resolve the bearer cookie by access token
        manager
            .create_index(
                Index::create()
                    .name("idx_user_identities_access_token")
                    .table(UserIdentities::Table)
                    .col(UserIdentities::AccessToken)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserIdentities::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserIdentities {
    Table,
    Id,
    ExternalId,
    Name,
    Email,
    Avatar,
    AccessToken,
    RefreshToken,
    TokenExpiresAt,
    CreatedAt,
    UpdatedAt,
}
