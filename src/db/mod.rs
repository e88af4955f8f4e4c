//! Database module for the outcome graph store.
//!
//! This module provides abstractions for store operations via the Repository
//! pattern, allowing different storage backends to be swapped easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Collaborators (CRUD surfaces, importers, dashboards)    │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/) - Abstract Interface    │
//! │  - GraphRepository (catalog + triggering mutations)      │
//! │  - AchievementRepository (materialized reads, rebuilds)  │
//! │  - AuditRepository (invariant scan)                      │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │ one transaction per trigger
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Engine services (calculator, dispatcher, mutations)     │
//! │  generic over the sync OutcomeStore seam                 │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴────────────────┐
//!     │                                 │
//! ┌───▼──────────────┐     ┌──────────▼──────────────┐
//! │ Postgres (Diesel)│     │  Local Repository       │
//! │ serializable txn │     │  (in-memory, copy-swap) │
//! └──────────────────┘     └─────────────────────────┘
//! ```

#[cfg(all(feature = "postgres-repo", feature = "local-repo"))]
compile_error!("Enable only one repository backend feature at a time.");
#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable exactly one repository backend feature.");

pub mod config;
pub mod factory;
pub mod repositories;
pub mod repository;

pub use config::RepositoryConfig;
pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::{PostgresConfig, PostgresRepository};
pub use repository::{
    AchievementRepository, AuditRepository, FullRepository, GraphRepository, OutcomeStore,
    RepositoryError, RepositoryResult,
};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Global repository instance initialized once per process.
static REPOSITORY: OnceCell<Arc<dyn FullRepository>> = OnceCell::new();

#[cfg(feature = "postgres-repo")]
fn create_selected_repository() -> RepositoryResult<Arc<dyn FullRepository>> {
    let config = PostgresConfig::from_env().map_err(RepositoryError::ConfigurationError)?;
    let repo = RepositoryFactory::create_postgres(&config)?;
    Ok(repo as Arc<dyn FullRepository>)
}

#[cfg(feature = "local-repo")]
fn create_selected_repository() -> RepositoryResult<Arc<dyn FullRepository>> {
    Ok(RepositoryFactory::create_local())
}

/// Initialize the global repository singleton for the selected backend.
pub fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }

    let repo =
        create_selected_repository().map_err(|e| anyhow::Error::msg(e.to_string()))?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// Get a reference to the global repository instance.
pub fn get_repository() -> Result<&'static Arc<dyn FullRepository>> {
    if REPOSITORY.get().is_none() {
        let _ = init_repository();
    }

    REPOSITORY
        .get()
        .context("Repository not initialized. Call init_repository() first.")
}
