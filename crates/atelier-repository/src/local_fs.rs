//! Local filesystem storage engine
//!
//! Maps the entity hierarchy directly onto directories: each organization is
//! a directory named by its decimal ID under the configured root, each
//! project a subdirectory under its org, and each entity's JSON lives in a
//! `.meta` file inside its directory. Access tokens live in a single
//! `tokens.json` at the root, and assigned IDs are tracked in `.counters`.
//!
//! Every write goes to a temporary file first and is renamed into place, so
//! a crash mid-write never leaves a truncated meta file behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use atelier_types::{AccessToken, Org, Project, Source};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{Repository, RepositoryError, Result};

const META_FILE: &str = ".meta";
const COUNTERS_FILE: &str = ".counters";
const TOKENS_FILE: &str = "tokens.json";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct FsCounters {
    org: i64,
    project: i64,
    source: i64,
    token: i64,
}

/// Filesystem-backed repository implementation.
pub struct LocalFsRepository {
    root: PathBuf,

    /// Serializes mutations; reads go straight to disk
    counters: Mutex<FsCounters>,
}

impl LocalFsRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), counters: Mutex::new(FsCounters::default()) }
    }

    fn org_dir(&self, org_id: i64) -> PathBuf {
        self.root.join(org_id.to_string())
    }

    fn project_dir(&self, org_id: i64, project_id: i64) -> PathBuf {
        self.org_dir(org_id).join(project_id.to_string())
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write via a sibling temp file and rename into place.
    async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn persist_counters(&self, counters: &FsCounters) -> Result<()> {
        Self::write_json_atomic(&self.root.join(COUNTERS_FILE), counters).await
    }

    /// List the numeric child directories of `dir`.
    async fn numeric_dirs(dir: &Path) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<i64>().ok()) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Rebuild counters from the directory tree, used when `.counters` is
    /// missing. Source and token highs come from the stored entities.
    async fn scan_counters(&self) -> Result<FsCounters> {
        let mut counters = FsCounters::default();
        for org_id in Self::numeric_dirs(&self.root).await? {
            counters.org = counters.org.max(org_id);
            for project_id in Self::numeric_dirs(&self.org_dir(org_id)).await? {
                counters.project = counters.project.max(project_id);
                let project: Project =
                    Self::read_json(&self.project_dir(org_id, project_id).join(META_FILE)).await?;
                if let Some(source) = project.source {
                    counters.source = counters.source.max(source.id);
                }
            }
        }
        for token in self.load_tokens().await? {
            counters.token = counters.token.max(token.id);
        }
        Ok(counters)
    }

    async fn load_org(&self, org_id: i64) -> Result<Org> {
        Self::read_json(&self.org_dir(org_id).join(META_FILE))
            .await
            .map_err(|_| RepositoryError::NotFound(format!("org:{org_id}")))
    }

    async fn load_project(&self, org_id: i64, project_id: i64) -> Result<Project> {
        Self::read_json(&self.project_dir(org_id, project_id).join(META_FILE))
            .await
            .map_err(|_| RepositoryError::NotFound(format!("project:{org_id}/{project_id}")))
    }

    async fn store_project(&self, project: &Project) -> Result<()> {
        let dir = self.project_dir(project.org_id, project.id);
        Self::write_json_atomic(&dir.join(META_FILE), project).await
    }

    /// Locate a project by its ID alone, scanning across organizations.
    async fn find_project(&self, project_id: i64) -> Result<Project> {
        for org_id in Self::numeric_dirs(&self.root).await? {
            let path = self.project_dir(org_id, project_id).join(META_FILE);
            if tokio::fs::try_exists(&path).await? {
                return Self::read_json(&path).await;
            }
        }
        Err(RepositoryError::NotFound(format!("project:{project_id}")))
    }

    async fn load_tokens(&self) -> Result<Vec<AccessToken>> {
        let path = self.root.join(TOKENS_FILE);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        Self::read_json(&path).await
    }

    async fn store_tokens(&self, tokens: &[AccessToken]) -> Result<()> {
        Self::write_json_atomic(&self.root.join(TOKENS_FILE), &tokens).await
    }
}

#[async_trait]
impl Repository for LocalFsRepository {
    async fn connect(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let counters_path = self.root.join(COUNTERS_FILE);
        let loaded = if tokio::fs::try_exists(&counters_path).await? {
            Self::read_json(&counters_path).await?
        } else {
            warn!(root = %self.root.display(), "counters file missing, rebuilding from tree");
            let scanned = self.scan_counters().await?;
            self.persist_counters(&scanned).await?;
            scanned
        };
        *self.counters.lock().await = loaded;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        tokio::fs::try_exists(&self.root).await.unwrap_or(false)
    }

    async fn list_orgs(&self) -> Result<Vec<Org>> {
        let mut orgs = Vec::new();
        for org_id in Self::numeric_dirs(&self.root).await? {
            orgs.push(self.load_org(org_id).await?);
        }
        Ok(orgs)
    }

    async fn create_org(&self, mut org: Org) -> Result<Org> {
        let mut counters = self.counters.lock().await;
        counters.org += 1;
        org.id = counters.org;
        tokio::fs::create_dir_all(self.org_dir(org.id)).await?;
        Self::write_json_atomic(&self.org_dir(org.id).join(META_FILE), &org).await?;
        self.persist_counters(&counters).await?;
        Ok(org)
    }

    async fn get_org(&self, org_id: i64) -> Result<Org> {
        self.load_org(org_id).await
    }

    async fn remove_org(&self, org_id: i64) -> Result<()> {
        let _counters = self.counters.lock().await;
        let dir = self.org_dir(org_id);
        if !tokio::fs::try_exists(&dir).await? {
            return Err(RepositoryError::NotFound(format!("org:{org_id}")));
        }
        tokio::fs::remove_dir_all(&dir).await?;
        Ok(())
    }

    async fn update_org(&self, org: Org) -> Result<Org> {
        let _counters = self.counters.lock().await;
        let mut stored = self.load_org(org.id).await?;
        stored.name = org.name;
        stored.updated_at = Utc::now();
        Self::write_json_atomic(&self.org_dir(stored.id).join(META_FILE), &stored).await?;
        Ok(stored)
    }

    async fn list_projects(&self, org_id: Option<i64>) -> Result<Vec<Project>> {
        let org_ids = match org_id {
            Some(org_id) => {
                if !tokio::fs::try_exists(self.org_dir(org_id)).await? {
                    return Err(RepositoryError::NotFound(format!("org:{org_id}")));
                }
                vec![org_id]
            }
            None => Self::numeric_dirs(&self.root).await?,
        };
        let mut projects = Vec::new();
        for org_id in org_ids {
            for project_id in Self::numeric_dirs(&self.org_dir(org_id)).await? {
                projects.push(self.load_project(org_id, project_id).await?);
            }
        }
        Ok(projects)
    }

    async fn create_project(&self, mut project: Project) -> Result<Project> {
        let mut counters = self.counters.lock().await;
        // The owning org must exist before an ID is consumed
        self.load_org(project.org_id).await?;
        counters.project += 1;
        project.id = counters.project;
        tokio::fs::create_dir_all(self.project_dir(project.org_id, project.id)).await?;
        self.store_project(&project).await?;
        self.persist_counters(&counters).await?;
        Ok(project)
    }

    async fn get_project(&self, org_id: i64, project_id: i64) -> Result<Project> {
        self.load_project(org_id, project_id).await
    }

    async fn remove_project(&self, org_id: i64, project_id: i64) -> Result<()> {
        let _counters = self.counters.lock().await;
        let dir = self.project_dir(org_id, project_id);
        if !tokio::fs::try_exists(&dir).await? {
            return Err(RepositoryError::NotFound(format!("project:{org_id}/{project_id}")));
        }
        tokio::fs::remove_dir_all(&dir).await?;
        Ok(())
    }

    async fn update_project(&self, project: Project) -> Result<Project> {
        let _counters = self.counters.lock().await;
        let mut stored = self.load_project(project.org_id, project.id).await?;
        stored.name = project.name;
        stored.updated_at = Utc::now();
        self.store_project(&stored).await?;
        Ok(stored)
    }

    async fn create_source(&self, mut source: Source) -> Result<Source> {
        let mut counters = self.counters.lock().await;
        let mut project = self.find_project(source.project_id).await?;
        if project.source.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "project {} already has a source",
                source.project_id
            )));
        }
        counters.source += 1;
        source.id = counters.source;
        project.source = Some(source.clone());
        project.updated_at = Utc::now();
        self.store_project(&project).await?;
        self.persist_counters(&counters).await?;
        Ok(source)
    }

    async fn get_source(&self, source_id: i64) -> Result<Source> {
        for project in self.list_projects(None).await? {
            if let Some(source) = project.source {
                if source.id == source_id {
                    return Ok(source);
                }
            }
        }
        Err(RepositoryError::NotFound(format!("source:{source_id}")))
    }

    async fn remove_source(&self, source_id: i64) -> Result<()> {
        let _counters = self.counters.lock().await;
        for mut project in self.list_projects(None).await? {
            if project.source.as_ref().is_some_and(|s| s.id == source_id) {
                project.source = None;
                project.updated_at = Utc::now();
                self.store_project(&project).await?;
                return Ok(());
            }
        }
        Err(RepositoryError::NotFound(format!("source:{source_id}")))
    }

    async fn upsert_access_token(&self, mut token: AccessToken) -> Result<AccessToken> {
        let mut counters = self.counters.lock().await;
        let mut tokens = self.load_tokens().await?;
        if let Some(stored) = tokens
            .iter_mut()
            .find(|t| t.kind == token.kind && t.user == token.user)
        {
            stored.token = token.token;
            stored.updated_at = Utc::now();
            let result = stored.clone();
            self.store_tokens(&tokens).await?;
            return Ok(result);
        }
        counters.token += 1;
        token.id = counters.token;
        tokens.push(token.clone());
        self.store_tokens(&tokens).await?;
        self.persist_counters(&counters).await?;
        Ok(token)
    }

    async fn get_access_token(&self, kind: &str, user: &str) -> Result<AccessToken> {
        self.load_tokens()
            .await?
            .into_iter()
            .find(|t| t.kind == kind && t.user == user)
            .ok_or_else(|| RepositoryError::NotFound(format!("token:{kind}/{user}")))
    }

    async fn remove_access_token(&self, kind: &str, user: &str) -> Result<()> {
        let _counters = self.counters.lock().await;
        let mut tokens = self.load_tokens().await?;
        let before = tokens.len();
        tokens.retain(|t| !(t.kind == kind && t.user == user));
        if tokens.len() == before {
            return Err(RepositoryError::NotFound(format!("token:{kind}/{user}")));
        }
        self.store_tokens(&tokens).await
    }
}
