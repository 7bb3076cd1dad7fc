//! Repository functions — one function per database operation.
//!
//! Every function takes a `&DbPool` and returns a `Result<T, DbError>`.
//! Queries are checked at runtime (`sqlx::query` / `query_as`), so building
//! the crate never needs a live database.

pub mod deployments;
pub mod permissions;
pub mod users;
pub mod workflows;
