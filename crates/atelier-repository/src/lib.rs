//! # Atelier Repository - Storage Abstraction Layer
//!
//! Provides the [`Repository`] trait implemented by every storage engine,
//! plus the engines themselves: in-memory, local filesystem and relational.

use async_trait::async_trait;
use atelier_types::{AccessToken, Org, PipelineTemplate, Project, Source};

pub mod error;
pub mod factory;
pub mod local_fs;
pub mod memory;
pub mod sql;

pub use error::{RepositoryError, RepositoryResult};
pub use factory::{ProviderKind, RepositoryFactory, StoreConfig};
pub use local_fs::LocalFsRepository;
pub use memory::MemoryRepository;
pub use sql::SqlRepository;

type Result<T> = RepositoryResult<T>;

/// The abstract storage interface.
///
/// All engines assign strictly increasing positive IDs at create time and
/// never reuse an ID after a delete. Entities passed to `create_*` carry
/// `id: 0`; the returned value has the assigned ID filled in.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Establish or verify the backing connection.
    ///
    /// Engines that need no handshake return Ok immediately.
    async fn connect(&self) -> Result<()>;

    /// Whether the engine is able to serve requests right now
    async fn is_healthy(&self) -> bool;

    /// List all organizations
    async fn list_orgs(&self) -> Result<Vec<Org>>;

    /// Create an organization and return it with its assigned ID
    async fn create_org(&self, org: Org) -> Result<Org>;

    /// Fetch an organization by ID
    async fn get_org(&self, org_id: i64) -> Result<Org>;

    /// Delete an organization and everything it owns
    async fn remove_org(&self, org_id: i64) -> Result<()>;

    /// Rename an organization and return the stored entity
    async fn update_org(&self, org: Org) -> Result<Org>;

    /// List projects, either for one organization or across all of them
    async fn list_projects(&self, org_id: Option<i64>) -> Result<Vec<Project>>;

    /// Create a project under an existing organization
    async fn create_project(&self, project: Project) -> Result<Project>;

    /// Fetch a project by its composite key
    async fn get_project(&self, org_id: i64, project_id: i64) -> Result<Project>;

    /// Delete a project and its attached source, if any
    async fn remove_project(&self, org_id: i64, project_id: i64) -> Result<()>;

    /// Rename a project and return the stored entity
    async fn update_project(&self, project: Project) -> Result<Project>;

    /// Attach a source to a project; at most one source per project
    async fn create_source(&self, source: Source) -> Result<Source>;

    /// Fetch a source by ID
    async fn get_source(&self, source_id: i64) -> Result<Source>;

    /// Detach and delete a source by ID
    async fn remove_source(&self, source_id: i64) -> Result<()>;

    /// Insert or replace the access token for a `(kind, user)` pair
    async fn upsert_access_token(&self, token: AccessToken) -> Result<AccessToken>;

    /// Fetch the access token for a `(kind, user)` pair
    async fn get_access_token(&self, kind: &str, user: &str) -> Result<AccessToken>;

    /// Delete the access token for a `(kind, user)` pair
    async fn remove_access_token(&self, kind: &str, user: &str) -> Result<()>;

    /// List the pipeline template catalog.
    ///
    /// Engines without template storage report an empty catalog.
    async fn list_pipeline_templates(&self) -> Result<Vec<PipelineTemplate>> {
        Ok(vec![])
    }
}
