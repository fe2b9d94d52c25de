//! Relational storage engine
//!
//! Runs on `sqlx`'s Any driver so the same code serves SQLite (development,
//! tests) and MySQL (production); the URL scheme selects the driver. Both
//! dialects accept `?` placeholders, and timestamps are stored as unix
//! milliseconds so no dialect-specific datetime codec is needed.
//!
//! IDs come from a `counters` table bumped inside the same transaction as
//! the insert, so they stay strictly increasing and are never reused.

use std::sync::Once;

use async_trait::async_trait;
use atelier_types::{AccessToken, Org, PipelineTemplate, Project, Source};
use chrono::{DateTime, Utc};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Connection, Row};
use tracing::info;

use crate::{Repository, RepositoryError, Result};

static DRIVERS: Once = Once::new();

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS counters (
        name VARCHAR(32) PRIMARY KEY,
        value BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS orgs (
        id BIGINT PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS projects (
        id BIGINT PRIMARY KEY,
        org_id BIGINT NOT NULL,
        name VARCHAR(255) NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS sources (
        id BIGINT PRIMARY KEY,
        project_id BIGINT NOT NULL,
        kind VARCHAR(64) NOT NULL,
        repository VARCHAR(255) NOT NULL,
        username VARCHAR(255) NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS access_tokens (
        id BIGINT PRIMARY KEY,
        kind VARCHAR(64) NOT NULL,
        username VARCHAR(255) NOT NULL,
        token TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS pipeline_templates (
        id BIGINT PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        language VARCHAR(64) NOT NULL,
        content TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    )",
];

const PROJECT_COLUMNS: &str = "p.id, p.org_id, p.name, p.created_at, p.updated_at, \
     s.id AS source_id, s.kind AS source_kind, s.repository AS source_repository, \
     s.username AS source_username, \
     s.created_at AS source_created_at, s.updated_at AS source_updated_at";

/// SQL-backed repository implementation.
pub struct SqlRepository {
    pool: AnyPool,
}

impl SqlRepository {
    /// Open a pool against `url` and ensure the schema exists.
    ///
    /// For MySQL URLs the database named in the path is created first when
    /// it does not exist yet.
    pub async fn open(url: &str) -> Result<Self> {
        DRIVERS.call_once(sqlx::any::install_default_drivers);
        if url.starts_with("mysql://") {
            Self::ensure_database(url).await?;
        }
        let pool = AnyPoolOptions::new().max_connections(5).connect(url).await?;
        let repo = Self { pool };
        repo.migrate().await?;
        info!("sql repository ready");
        Ok(repo)
    }

    /// Connect to the MySQL server without a database path and create the
    /// target database when missing.
    async fn ensure_database(url: &str) -> Result<()> {
        let without_params = url.split('?').next().unwrap_or(url);
        let Some((server, database)) = without_params.rsplit_once('/') else {
            return Ok(());
        };
        if database.is_empty() || server.ends_with(':') || !server.contains("://") {
            return Err(RepositoryError::Validation(format!("malformed database url: {url}")));
        }
        let mut conn = sqlx::AnyConnection::connect(server).await?;
        sqlx::query(&format!("CREATE DATABASE IF NOT EXISTS `{database}`"))
            .execute(&mut conn)
            .await?;
        conn.close().await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Bump and return the named counter inside the caller's transaction.
    async fn next_id(
        tx: &mut sqlx::Transaction<'_, sqlx::Any>,
        name: &str,
    ) -> Result<i64> {
        let updated = sqlx::query("UPDATE counters SET value = value + 1 WHERE name = ?")
            .bind(name)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        if updated == 0 {
            sqlx::query("INSERT INTO counters (name, value) VALUES (?, 1)")
                .bind(name)
                .execute(&mut **tx)
                .await?;
            return Ok(1);
        }
        let row = sqlx::query("SELECT value FROM counters WHERE name = ?")
            .bind(name)
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.try_get(0)?)
    }

    fn timestamp(millis: i64) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| RepositoryError::Serialization(format!("invalid timestamp: {millis}")))
    }

    fn org_from_row(row: &AnyRow) -> Result<Org> {
        Ok(Org {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: Self::timestamp(row.try_get("created_at")?)?,
            updated_at: Self::timestamp(row.try_get("updated_at")?)?,
        })
    }

    fn project_from_row(row: &AnyRow) -> Result<Project> {
        let project_id: i64 = row.try_get("id")?;
        let source = match row.try_get::<Option<i64>, _>("source_id")? {
            Some(source_id) => Some(Source {
                id: source_id,
                project_id,
                kind: row.try_get("source_kind")?,
                repository: row.try_get("source_repository")?,
                user: row.try_get("source_username")?,
                created_at: Self::timestamp(row.try_get("source_created_at")?)?,
                updated_at: Self::timestamp(row.try_get("source_updated_at")?)?,
            }),
            None => None,
        };
        Ok(Project {
            id: project_id,
            org_id: row.try_get("org_id")?,
            name: row.try_get("name")?,
            source,
            created_at: Self::timestamp(row.try_get("created_at")?)?,
            updated_at: Self::timestamp(row.try_get("updated_at")?)?,
        })
    }

    fn source_from_row(row: &AnyRow) -> Result<Source> {
        Ok(Source {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            kind: row.try_get("kind")?,
            repository: row.try_get("repository")?,
            user: row.try_get("username")?,
            created_at: Self::timestamp(row.try_get("created_at")?)?,
            updated_at: Self::timestamp(row.try_get("updated_at")?)?,
        })
    }

    fn token_from_row(row: &AnyRow) -> Result<AccessToken> {
        Ok(AccessToken {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            user: row.try_get("username")?,
            token: row.try_get("token")?,
            created_at: Self::timestamp(row.try_get("created_at")?)?,
            updated_at: Self::timestamp(row.try_get("updated_at")?)?,
        })
    }
}

#[async_trait]
impl Repository for SqlRepository {
    async fn connect(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    async fn list_orgs(&self) -> Result<Vec<Org>> {
        let rows = sqlx::query("SELECT id, name, created_at, updated_at FROM orgs ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::org_from_row).collect()
    }

    async fn create_org(&self, mut org: Org) -> Result<Org> {
        let mut tx = self.pool.begin().await?;
        org.id = Self::next_id(&mut tx, "org").await?;
        sqlx::query(
            "INSERT INTO orgs (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(org.created_at.timestamp_millis())
        .bind(org.updated_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(org)
    }

    async fn get_org(&self, org_id: i64) -> Result<Org> {
        let row = sqlx::query("SELECT id, name, created_at, updated_at FROM orgs WHERE id = ?")
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("org:{org_id}")))?;
        Self::org_from_row(&row)
    }

    async fn remove_org(&self, org_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM orgs WHERE id = ?")
            .bind(org_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(RepositoryError::NotFound(format!("org:{org_id}")));
        }
        sqlx::query(
            "DELETE FROM sources WHERE project_id IN (SELECT id FROM projects WHERE org_id = ?)",
        )
        .bind(org_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM projects WHERE org_id = ?")
            .bind(org_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_org(&self, org: Org) -> Result<Org> {
        let now = Utc::now();
        let updated = sqlx::query("UPDATE orgs SET name = ?, updated_at = ? WHERE id = ?")
            .bind(&org.name)
            .bind(now.timestamp_millis())
            .bind(org.id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(RepositoryError::NotFound(format!("org:{}", org.id)));
        }
        self.get_org(org.id).await
    }

    async fn list_projects(&self, org_id: Option<i64>) -> Result<Vec<Project>> {
        let rows = match org_id {
            Some(org_id) => {
                // Listing under a missing org is an error, not an empty list
                self.get_org(org_id).await?;
                sqlx::query(&format!(
                    "SELECT {PROJECT_COLUMNS} FROM projects p \
                     LEFT JOIN sources s ON s.project_id = p.id \
                     WHERE p.org_id = ? ORDER BY p.id"
                ))
                .bind(org_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {PROJECT_COLUMNS} FROM projects p \
                     LEFT JOIN sources s ON s.project_id = p.id ORDER BY p.id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(Self::project_from_row).collect()
    }

    async fn create_project(&self, mut project: Project) -> Result<Project> {
        let mut tx = self.pool.begin().await?;
        // The owning org must exist before an ID is consumed
        let org_exists = sqlx::query("SELECT id FROM orgs WHERE id = ?")
            .bind(project.org_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !org_exists {
            return Err(RepositoryError::NotFound(format!("org:{}", project.org_id)));
        }
        project.id = Self::next_id(&mut tx, "project").await?;
        sqlx::query(
            "INSERT INTO projects (id, org_id, name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(project.id)
        .bind(project.org_id)
        .bind(&project.name)
        .bind(project.created_at.timestamp_millis())
        .bind(project.updated_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(project)
    }

    async fn get_project(&self, org_id: i64, project_id: i64) -> Result<Project> {
        let row = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p \
             LEFT JOIN sources s ON s.project_id = p.id \
             WHERE p.org_id = ? AND p.id = ?"
        ))
        .bind(org_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("project:{org_id}/{project_id}")))?;
        Self::project_from_row(&row)
    }

    async fn remove_project(&self, org_id: i64, project_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM projects WHERE org_id = ? AND id = ?")
            .bind(org_id)
            .bind(project_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(RepositoryError::NotFound(format!("project:{org_id}/{project_id}")));
        }
        sqlx::query("DELETE FROM sources WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_project(&self, project: Project) -> Result<Project> {
        let now = Utc::now();
        let updated = sqlx::query(
            "UPDATE projects SET name = ?, updated_at = ? WHERE org_id = ? AND id = ?",
        )
        .bind(&project.name)
        .bind(now.timestamp_millis())
        .bind(project.org_id)
        .bind(project.id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(RepositoryError::NotFound(format!(
                "project:{}/{}",
                project.org_id, project.id
            )));
        }
        self.get_project(project.org_id, project.id).await
    }

    async fn create_source(&self, mut source: Source) -> Result<Source> {
        let mut tx = self.pool.begin().await?;
        let project_exists = sqlx::query("SELECT id FROM projects WHERE id = ?")
            .bind(source.project_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !project_exists {
            return Err(RepositoryError::NotFound(format!("project:{}", source.project_id)));
        }
        let occupied = sqlx::query("SELECT id FROM sources WHERE project_id = ?")
            .bind(source.project_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if occupied {
            return Err(RepositoryError::Conflict(format!(
                "project {} already has a source",
                source.project_id
            )));
        }
        source.id = Self::next_id(&mut tx, "source").await?;
        sqlx::query(
            "INSERT INTO sources (id, project_id, kind, repository, username, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(source.id)
        .bind(source.project_id)
        .bind(&source.kind)
        .bind(&source.repository)
        .bind(&source.user)
        .bind(source.created_at.timestamp_millis())
        .bind(source.updated_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(source)
    }

    async fn get_source(&self, source_id: i64) -> Result<Source> {
        let row = sqlx::query(
            "SELECT id, project_id, kind, repository, username, created_at, updated_at \
             FROM sources WHERE id = ?",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("source:{source_id}")))?;
        Self::source_from_row(&row)
    }

    async fn remove_source(&self, source_id: i64) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(RepositoryError::NotFound(format!("source:{source_id}")));
        }
        Ok(())
    }

    async fn upsert_access_token(&self, mut token: AccessToken) -> Result<AccessToken> {
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query(
            "SELECT id, kind, username, token, created_at, updated_at \
             FROM access_tokens WHERE kind = ? AND username = ?",
        )
        .bind(&token.kind)
        .bind(&token.user)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = existing {
            let mut stored = Self::token_from_row(&row)?;
            stored.token = token.token;
            stored.updated_at = Utc::now();
            sqlx::query("UPDATE access_tokens SET token = ?, updated_at = ? WHERE id = ?")
                .bind(&stored.token)
                .bind(stored.updated_at.timestamp_millis())
                .bind(stored.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(stored);
        }
        token.id = Self::next_id(&mut tx, "token").await?;
        sqlx::query(
            "INSERT INTO access_tokens (id, kind, username, token, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(token.id)
        .bind(&token.kind)
        .bind(&token.user)
        .bind(&token.token)
        .bind(token.created_at.timestamp_millis())
        .bind(token.updated_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(token)
    }

    async fn get_access_token(&self, kind: &str, user: &str) -> Result<AccessToken> {
        let row = sqlx::query(
            "SELECT id, kind, username, token, created_at, updated_at \
             FROM access_tokens WHERE kind = ? AND username = ?",
        )
        .bind(kind)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("token:{kind}/{user}")))?;
        Self::token_from_row(&row)
    }

    async fn remove_access_token(&self, kind: &str, user: &str) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM access_tokens WHERE kind = ? AND username = ?")
            .bind(kind)
            .bind(user)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(RepositoryError::NotFound(format!("token:{kind}/{user}")));
        }
        Ok(())
    }

    async fn list_pipeline_templates(&self) -> Result<Vec<PipelineTemplate>> {
        let rows = sqlx::query(
            "SELECT id, name, language, content, created_at, updated_at \
             FROM pipeline_templates ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(PipelineTemplate {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    language: row.try_get("language")?,
                    content: row.try_get("content")?,
                    created_at: Self::timestamp(row.try_get("created_at")?)?,
                    updated_at: Self::timestamp(row.try_get("updated_at")?)?,
                })
            })
            .collect()
    }
}
