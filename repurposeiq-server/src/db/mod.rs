//! Database layer: connection pool, schema/seed, repositories.
//!
//! SQLite through sqlx with a small pool. List operations fetch in one
//! query; multi-step writes rely on DB constraints rather than
//! check-then-insert.

pub mod pool;
pub mod repos;
pub mod schema;

pub use pool::create_pool;
pub use repos::DbError;
