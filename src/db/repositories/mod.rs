//! Repository implementations.
//!
//! - [`local`]: in-memory backend for unit tests and local development
//! - [`postgres`]: Diesel/Postgres backend (`postgres-repo` feature)

pub mod local;
#[cfg(feature = "postgres-repo")]
pub mod postgres;

pub use local::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use postgres::{PostgresConfig, PostgresRepository};
