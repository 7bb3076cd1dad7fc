//! `db` crate — pure persistence layer.
//!
//! Provides a SQLite connection pool, typed row structs, and repository
//! functions for workflows, users, workspace permissions and the deployment
//! version store.  No business logic lives here beyond the activation
//! protocol, which is a database transaction.

pub mod error;
pub mod models;
pub mod pool;
pub mod repository;

pub use error::DbError;
pub use pool::{create_pool, run_migrations, DbPool};
