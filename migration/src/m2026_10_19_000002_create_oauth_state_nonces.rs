use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OAuthStateNonce::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuthStateNonce::Nonce)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuthStateNonce::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuthStateNonce::ConsumedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index on expires_at for the janitor sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_oauth_state_nonces_expires_at")
                    .table(OAuthStateNonce::Table)
                    .col(OAuthStateNonce::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OAuthStateNonce::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OAuthStateNonce {
    #[sea_orm(iden = "oauth_state_nonces")]
    Table,
    Nonce,
    ExpiresAt,
    ConsumedAt,
}
