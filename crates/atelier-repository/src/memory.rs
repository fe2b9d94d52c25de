//! In-memory storage engine for testing and development
//!
//! All state lives behind a single `RwLock`; nothing survives a restart.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use atelier_types::{AccessToken, Org, Project, Source};
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{Repository, RepositoryError, Result};

#[derive(Debug, Default)]
struct Counters {
    org: i64,
    project: i64,
    source: i64,
    token: i64,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Organizations keyed by ID, kept ordered for stable listings
    orgs: BTreeMap<i64, Org>,

    /// Projects grouped by owning org ID
    projects: BTreeMap<i64, Vec<Project>>,

    /// Access tokens, unique per (kind, user) pair
    tokens: Vec<AccessToken>,

    /// Last assigned ID per entity kind
    counters: Counters,
}

/// In-memory repository implementation.
pub struct MemoryRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self { state: Arc::new(RwLock::new(MemoryState::default())) }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn list_orgs(&self) -> Result<Vec<Org>> {
        let state = self.state.read().await;
        Ok(state.orgs.values().cloned().collect())
    }

    async fn create_org(&self, mut org: Org) -> Result<Org> {
        let mut state = self.state.write().await;
        state.counters.org += 1;
        org.id = state.counters.org;
        state.orgs.insert(org.id, org.clone());
        state.projects.insert(org.id, Vec::new());
        Ok(org)
    }

    async fn get_org(&self, org_id: i64) -> Result<Org> {
        let state = self.state.read().await;
        state
            .orgs
            .get(&org_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("org:{org_id}")))
    }

    async fn remove_org(&self, org_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        if state.orgs.remove(&org_id).is_none() {
            return Err(RepositoryError::NotFound(format!("org:{org_id}")));
        }
        state.projects.remove(&org_id);
        Ok(())
    }

    async fn update_org(&self, org: Org) -> Result<Org> {
        let mut state = self.state.write().await;
        let stored = state
            .orgs
            .get_mut(&org.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("org:{}", org.id)))?;
        stored.name = org.name;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn list_projects(&self, org_id: Option<i64>) -> Result<Vec<Project>> {
        let state = self.state.read().await;
        match org_id {
            Some(org_id) => state
                .projects
                .get(&org_id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(format!("org:{org_id}"))),
            None => Ok(state.projects.values().flatten().cloned().collect()),
        }
    }

    async fn create_project(&self, mut project: Project) -> Result<Project> {
        let mut state = self.state.write().await;
        // The owning org must exist before an ID is consumed
        if !state.orgs.contains_key(&project.org_id) {
            return Err(RepositoryError::NotFound(format!("org:{}", project.org_id)));
        }
        state.counters.project += 1;
        project.id = state.counters.project;
        state
            .projects
            .entry(project.org_id)
            .or_default()
            .push(project.clone());
        Ok(project)
    }

    async fn get_project(&self, org_id: i64, project_id: i64) -> Result<Project> {
        let state = self.state.read().await;
        state
            .projects
            .get(&org_id)
            .and_then(|projects| projects.iter().find(|p| p.id == project_id))
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("project:{org_id}/{project_id}")))
    }

    async fn remove_project(&self, org_id: i64, project_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let projects = state
            .projects
            .get_mut(&org_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("org:{org_id}")))?;
        let before = projects.len();
        projects.retain(|p| p.id != project_id);
        if projects.len() == before {
            return Err(RepositoryError::NotFound(format!("project:{org_id}/{project_id}")));
        }
        Ok(())
    }

    async fn update_project(&self, project: Project) -> Result<Project> {
        let mut state = self.state.write().await;
        let stored = state
            .projects
            .get_mut(&project.org_id)
            .and_then(|projects| projects.iter_mut().find(|p| p.id == project.id))
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("project:{}/{}", project.org_id, project.id))
            })?;
        stored.name = project.name;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn create_source(&self, mut source: Source) -> Result<Source> {
        let mut state = self.state.write().await;
        let occupied = state
            .projects
            .values()
            .flatten()
            .find(|p| p.id == source.project_id)
            .map(|p| p.source.is_some())
            .ok_or_else(|| RepositoryError::NotFound(format!("project:{}", source.project_id)))?;
        if occupied {
            return Err(RepositoryError::Conflict(format!(
                "project {} already has a source",
                source.project_id
            )));
        }
        state.counters.source += 1;
        source.id = state.counters.source;
        if let Some(project) = state
            .projects
            .values_mut()
            .flatten()
            .find(|p| p.id == source.project_id)
        {
            project.source = Some(source.clone());
            project.updated_at = Utc::now();
        }
        Ok(source)
    }

    async fn get_source(&self, source_id: i64) -> Result<Source> {
        let state = self.state.read().await;
        state
            .projects
            .values()
            .flatten()
            .filter_map(|p| p.source.as_ref())
            .find(|s| s.id == source_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("source:{source_id}")))
    }

    async fn remove_source(&self, source_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let project = state
            .projects
            .values_mut()
            .flatten()
            .find(|p| p.source.as_ref().is_some_and(|s| s.id == source_id))
            .ok_or_else(|| RepositoryError::NotFound(format!("source:{source_id}")))?;
        project.source = None;
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_access_token(&self, mut token: AccessToken) -> Result<AccessToken> {
        let mut state = self.state.write().await;
        if let Some(stored) = state
            .tokens
            .iter_mut()
            .find(|t| t.kind == token.kind && t.user == token.user)
        {
            stored.token = token.token;
            stored.updated_at = Utc::now();
            return Ok(stored.clone());
        }
        state.counters.token += 1;
        token.id = state.counters.token;
        state.tokens.push(token.clone());
        Ok(token)
    }

    async fn get_access_token(&self, kind: &str, user: &str) -> Result<AccessToken> {
        let state = self.state.read().await;
        state
            .tokens
            .iter()
            .find(|t| t.kind == kind && t.user == user)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("token:{kind}/{user}")))
    }

    async fn remove_access_token(&self, kind: &str, user: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.tokens.len();
        state.tokens.retain(|t| !(t.kind == kind && t.user == user));
        if state.tokens.len() == before {
            return Err(RepositoryError::NotFound(format!("token:{kind}/{user}")));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_org_crud() {
        let repo = MemoryRepository::new();
        repo.connect().await.unwrap();
        assert!(repo.is_healthy().await);

        let created = repo.create_org(Org::new("acme")).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.name, "acme");

        let fetched = repo.get_org(created.id).await.unwrap();
        assert_eq!(fetched, created);

        let mut renamed = created.clone();
        renamed.name = "acme-corp".to_string();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let updated = repo.update_org(renamed).await.unwrap();
        assert_eq!(updated.name, "acme-corp");
        assert!(updated.updated_at > created.updated_at);

        repo.remove_org(created.id).await.unwrap();
        assert!(matches!(
            repo.get_org(created.id).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_org_ids_are_never_reused() {
        let repo = MemoryRepository::new();
        let first = repo.create_org(Org::new("a")).await.unwrap();
        repo.remove_org(first.id).await.unwrap();
        let second = repo.create_org(Org::new("b")).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_project_requires_existing_org() {
        let repo = MemoryRepository::new();
        let err = repo.create_project(Project::new(42, "web")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));

        // The failed create must not have consumed an ID
        let org = repo.create_org(Org::new("acme")).await.unwrap();
        let project = repo.create_project(Project::new(org.id, "web")).await.unwrap();
        assert_eq!(project.id, 1);
    }

    #[tokio::test]
    async fn test_project_crud_and_listing() {
        let repo = MemoryRepository::new();
        let acme = repo.create_org(Org::new("acme")).await.unwrap();
        let other = repo.create_org(Org::new("other")).await.unwrap();

        let web = repo.create_project(Project::new(acme.id, "web")).await.unwrap();
        let api = repo.create_project(Project::new(acme.id, "api")).await.unwrap();
        let tool = repo.create_project(Project::new(other.id, "tool")).await.unwrap();

        let acme_projects = repo.list_projects(Some(acme.id)).await.unwrap();
        assert_eq!(acme_projects.len(), 2);
        assert!(acme_projects.iter().all(|p| p.org_id == acme.id));

        let all = repo.list_projects(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let fetched = repo.get_project(acme.id, web.id).await.unwrap();
        assert_eq!(fetched.name, "web");

        // A project is only visible under its own org
        assert!(matches!(
            repo.get_project(other.id, web.id).await,
            Err(RepositoryError::NotFound(_))
        ));

        let mut renamed = api.clone();
        renamed.name = "api-v2".to_string();
        let updated = repo.update_project(renamed).await.unwrap();
        assert_eq!(updated.name, "api-v2");

        repo.remove_project(other.id, tool.id).await.unwrap();
        assert!(repo.list_projects(Some(other.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_org_cascades_to_projects() {
        let repo = MemoryRepository::new();
        let org = repo.create_org(Org::new("acme")).await.unwrap();
        repo.create_project(Project::new(org.id, "web")).await.unwrap();
        repo.create_project(Project::new(org.id, "api")).await.unwrap();

        repo.remove_org(org.id).await.unwrap();
        assert!(repo.list_projects(None).await.unwrap().is_empty());
        assert!(matches!(
            repo.list_projects(Some(org.id)).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_source_attach_conflict_and_detach() {
        let repo = MemoryRepository::new();
        let org = repo.create_org(Org::new("acme")).await.unwrap();
        let project = repo.create_project(Project::new(org.id, "web")).await.unwrap();

        let source = repo
            .create_source(Source::new(project.id, "github", "acme/web"))
            .await
            .unwrap();
        assert_eq!(source.id, 1);

        // Second attach on the same project is refused
        let err = repo
            .create_source(Source::new(project.id, "github", "acme/other"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let fetched = repo.get_source(source.id).await.unwrap();
        assert_eq!(fetched.repository, "acme/web");

        let stored = repo.get_project(org.id, project.id).await.unwrap();
        assert_eq!(stored.source.as_ref().unwrap().id, source.id);

        repo.remove_source(source.id).await.unwrap();
        assert!(matches!(
            repo.get_source(source.id).await,
            Err(RepositoryError::NotFound(_))
        ));
        let stored = repo.get_project(org.id, project.id).await.unwrap();
        assert!(stored.source.is_none());
    }

    #[tokio::test]
    async fn test_source_requires_existing_project() {
        let repo = MemoryRepository::new();
        let err = repo
            .create_source(Source::new(99, "github", "acme/web"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_access_token_upsert_replaces_value() {
        let repo = MemoryRepository::new();
        let first = repo
            .upsert_access_token(AccessToken::new("github", "alice", "T1"))
            .await
            .unwrap();
        assert_eq!(first.id, 1);

        let second = repo
            .upsert_access_token(AccessToken::new("github", "alice", "T2"))
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.token, "T2");

        let fetched = repo.get_access_token("github", "alice").await.unwrap();
        assert_eq!(fetched.token, "T2");

        // A different user under the same kind is a separate token
        let bob = repo
            .upsert_access_token(AccessToken::new("github", "bob", "T3"))
            .await
            .unwrap();
        assert_ne!(bob.id, first.id);

        repo.remove_access_token("github", "alice").await.unwrap();
        assert!(matches!(
            repo.get_access_token("github", "alice").await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(repo.get_access_token("github", "bob").await.is_ok());
    }

    #[tokio::test]
    async fn test_pipeline_templates_default_empty() {
        let repo = MemoryRepository::new();
        assert!(repo.list_pipeline_templates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_ids() {
        let repo = Arc::new(MemoryRepository::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.create_org(Org::new(format!("org-{i}"))).await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 16);
    }
}
