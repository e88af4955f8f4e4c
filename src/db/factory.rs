//! Repository factory for dependency injection.
//!
//! This module provides utilities for creating and configuring repository
//! instances based on runtime configuration.

use std::sync::Arc;

use super::repositories::LocalRepository;
use super::repository::{FullRepository, RepositoryError, RepositoryResult};
use crate::services::invalidation::InvalidationSink;

/// Repository type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// PostgreSQL via Diesel (production)
    Postgres,
    /// In-memory local repository
    Local,
}

impl RepositoryType {
    /// Parse repository type from string.
    ///
    /// # Arguments
    /// * `s` - String representation ("postgres", "local")
    ///
    /// # Returns
    /// * `Ok(RepositoryType)` if valid
    /// * `Err` if invalid
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "local" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }

    /// Get repository type from environment variable.
    ///
    /// Reads `REPOSITORY_TYPE`. Defaults to Local if not set.
    pub fn from_env() -> Self {
        std::env::var("REPOSITORY_TYPE")
            .ok()
            .and_then(|s| Self::from_str(&s).ok())
            .unwrap_or(Self::Local)
    }
}

/// Repository factory for creating repository instances.
///
/// # Example
/// ```
/// use oae_rust::db::RepositoryFactory;
///
/// let repo = RepositoryFactory::create_local();
/// ```
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create an in-memory local repository.
    pub fn create_local() -> Arc<dyn FullRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Create a Postgres repository, running pending migrations.
    #[cfg(feature = "postgres-repo")]
    pub fn create_postgres(
        config: &super::repositories::PostgresConfig,
    ) -> RepositoryResult<Arc<super::repositories::PostgresRepository>> {
        Ok(Arc::new(super::repositories::PostgresRepository::new(
            config.clone(),
        )?))
    }

    /// Create a repository from environment configuration.
    ///
    /// Reads `REPOSITORY_TYPE` to determine which backend to construct.
    /// Defaults to the local backend if not set.
    pub fn from_env() -> RepositoryResult<Arc<dyn FullRepository>> {
        match RepositoryType::from_env() {
            RepositoryType::Local => Ok(Self::create_local()),
            RepositoryType::Postgres => Self::postgres_from_env(),
        }
    }

    #[cfg(feature = "postgres-repo")]
    fn postgres_from_env() -> RepositoryResult<Arc<dyn FullRepository>> {
        let config = super::repositories::PostgresConfig::from_env()
            .map_err(RepositoryError::ConfigurationError)?;
        let repo = Self::create_postgres(&config)?;
        Ok(repo as Arc<dyn FullRepository>)
    }

    #[cfg(not(feature = "postgres-repo"))]
    fn postgres_from_env() -> RepositoryResult<Arc<dyn FullRepository>> {
        Err(RepositoryError::ConfigurationError(
            "REPOSITORY_TYPE=postgres but the postgres-repo feature is not enabled".to_string(),
        ))
    }
}

/// Builder for configuring repository creation.
///
/// # Example
/// ```
/// use oae_rust::db::{RepositoryBuilder, RepositoryType};
///
/// let repo = RepositoryBuilder::new()
///     .repository_type(RepositoryType::Local)
///     .build()
///     .unwrap();
/// ```
pub struct RepositoryBuilder {
    repo_type: RepositoryType,
    sink: Option<Arc<dyn InvalidationSink>>,
}

impl RepositoryBuilder {
    /// Create a new repository builder with default settings.
    ///
    /// Defaults to the local repository type.
    pub fn new() -> Self {
        Self {
            repo_type: RepositoryType::Local,
            sink: None,
        }
    }

    /// Set the repository type.
    pub fn repository_type(mut self, repo_type: RepositoryType) -> Self {
        self.repo_type = repo_type;
        self
    }

    /// Publish invalidation keys to `sink` instead of discarding them.
    pub fn invalidation_sink(mut self, sink: Arc<dyn InvalidationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Load the repository type from environment variables.
    pub fn from_env(mut self) -> Self {
        self.repo_type = RepositoryType::from_env();
        self
    }

    /// Build the repository instance.
    pub fn build(self) -> RepositoryResult<Arc<dyn FullRepository>> {
        match self.repo_type {
            RepositoryType::Local => match self.sink {
                Some(sink) => Ok(Arc::new(LocalRepository::with_sink(sink))),
                None => Ok(RepositoryFactory::create_local()),
            },
            RepositoryType::Postgres => self.build_postgres(),
        }
    }

    #[cfg(feature = "postgres-repo")]
    fn build_postgres(self) -> RepositoryResult<Arc<dyn FullRepository>> {
        use super::repositories::{PostgresConfig, PostgresRepository};

        let config =
            PostgresConfig::from_env().map_err(RepositoryError::ConfigurationError)?;
        let repo = match self.sink {
            Some(sink) => PostgresRepository::with_sink(config, sink)?,
            None => PostgresRepository::new(config)?,
        };
        Ok(Arc::new(repo))
    }

    #[cfg(not(feature = "postgres-repo"))]
    fn build_postgres(self) -> RepositoryResult<Arc<dyn FullRepository>> {
        Err(RepositoryError::ConfigurationError(
            "postgres-repo feature is not enabled".to_string(),
        ))
    }
}

impl Default for RepositoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::GraphRepository;

    #[test]
    fn test_repository_type_from_str() {
        assert_eq!(
            RepositoryType::from_str("postgres").unwrap(),
            RepositoryType::Postgres
        );
        assert_eq!(RepositoryType::from_str("local").unwrap(), RepositoryType::Local);
        assert_eq!(RepositoryType::from_str("Local").unwrap(), RepositoryType::Local);
        assert!(RepositoryType::from_str("invalid").is_err());
    }

    #[tokio::test]
    async fn test_create_local_repository() {
        let repo = RepositoryFactory::create_local();
        assert!(repo.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_builder_local_repository() {
        let repo = RepositoryBuilder::new()
            .repository_type(RepositoryType::Local)
            .build()
            .unwrap();

        assert!(repo.health_check().await.unwrap());
    }
}
