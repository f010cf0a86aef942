//! Persistence for proposals, evaluations, rubrics and votes.
//!
//! The [`repositories`] talk to Postgres directly. Services go through the
//! [`ProposalStore`] trait so they run unchanged against [`PgProposalStore`]
//! or the in-process [`MemoryProposalStore`].

use sqlx::postgres::PgPoolOptions;

pub mod decision;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use memory::MemoryProposalStore;
pub use store::{PgProposalStore, ProposalStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
