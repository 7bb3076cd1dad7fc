//! Typed error type for the db crate.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("row not found")]
    NotFound,

    #[error("deployment version {version} not found for workflow {workflow_id}")]
    VersionNotFound { workflow_id: Uuid, version: i64 },

    /// Input rejected before touching the database.
    #[error("{0}")]
    Validation(String),
}
