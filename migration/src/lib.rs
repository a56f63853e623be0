//! Database migrations for the collaboration auth service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_10_19_000001_create_user_identities;
mod m2026_10_19_000002_create_oauth_state_nonces;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_10_19_000001_create_user_identities::Migration),
            Box::new(m2026_10_19_000002_create_oauth_state_nonces::Migration),
        ]
    }
}
