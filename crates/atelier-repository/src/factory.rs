//! Storage factory for creating engine instances
//!
//! Provides a flexible way to instantiate different storage engines
//! without exposing implementation details to consumers.

use std::str::FromStr;
use std::sync::Arc;

use crate::local_fs::LocalFsRepository;
use crate::memory::MemoryRepository;
use crate::sql::SqlRepository;
use crate::{Repository, RepositoryError, Result};

/// Storage engine kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// In-memory storage (for testing and development)
    Memory,
    /// Local filesystem storage
    LocalFs,
    /// Relational storage (SQLite or MySQL)
    Sql,
}

impl FromStr for ProviderKind {
    type Err = RepositoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(ProviderKind::Memory),
            "localfs" | "local_fs" | "fs" => Ok(ProviderKind::LocalFs),
            "sql" | "mysql" | "sqlite" => Ok(ProviderKind::Sql),
            _ => Err(RepositoryError::Validation(format!("Unknown storage provider: {s}"))),
        }
    }
}

impl ProviderKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Memory => "memory",
            ProviderKind::LocalFs => "localfs",
            ProviderKind::Sql => "sql",
        }
    }
}

/// Configuration for a storage engine
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Engine kind to use
    pub provider: ProviderKind,
    /// Root directory for the filesystem engine
    pub root_path: Option<String>,
    /// Connection URL for the relational engine
    pub url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::memory()
    }
}

impl StoreConfig {
    /// Create config for the memory engine
    pub fn memory() -> Self {
        Self { provider: ProviderKind::Memory, root_path: None, url: None }
    }

    /// Create config for the filesystem engine
    pub fn local_fs(root_path: impl Into<String>) -> Self {
        Self { provider: ProviderKind::LocalFs, root_path: Some(root_path.into()), url: None }
    }

    /// Create config for the relational engine
    pub fn sql(url: impl Into<String>) -> Self {
        Self { provider: ProviderKind::Sql, root_path: None, url: Some(url.into()) }
    }
}

/// Storage factory for creating engine instances
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a connected storage engine from configuration.
    pub async fn create(config: StoreConfig) -> Result<Arc<dyn Repository>> {
        let repo: Arc<dyn Repository> = match config.provider {
            ProviderKind::Memory => Arc::new(MemoryRepository::new()),
            ProviderKind::LocalFs => {
                let root = config.root_path.ok_or_else(|| {
                    RepositoryError::Validation(
                        "localfs provider requires a root path".to_string(),
                    )
                })?;
                Arc::new(LocalFsRepository::new(root))
            }
            ProviderKind::Sql => {
                let url = config.url.ok_or_else(|| {
                    RepositoryError::Validation("sql provider requires a url".to_string())
                })?;
                Arc::new(SqlRepository::open(&url).await?)
            }
        };
        repo.connect().await?;
        Ok(repo)
    }

    /// Create a storage engine from string configuration
    pub async fn from_str(
        provider: &str,
        root_path: Option<String>,
        url: Option<String>,
    ) -> Result<Arc<dyn Repository>> {
        let provider = ProviderKind::from_str(provider)?;
        Self::create(StoreConfig { provider, root_path, url }).await
    }

    /// Create a default memory engine
    pub fn memory() -> Arc<dyn Repository> {
        Arc::new(MemoryRepository::new()) as Arc<dyn Repository>
    }
}
