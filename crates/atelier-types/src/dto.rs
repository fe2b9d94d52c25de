//! Request/response DTOs for the HTTP layer
//!
//! Requests carry only the client-settable fields; responses mirror the
//! stored entities, except that access token values are never echoed back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccessToken, Org, PipelineTemplate, Project, Source};

/// Request to create a new organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrgRequest {
    /// Organization name; a random identifier is substituted when absent
    #[serde(default)]
    pub name: Option<String>,
}

/// Request to rename an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrgRequest {
    pub name: String,
}

/// Organization representation returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgResponse {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Org> for OrgResponse {
    fn from(org: Org) -> Self {
        Self {
            id: org.id,
            name: org.name,
            created_at: org.created_at,
            updated_at: org.updated_at,
        }
    }
}

/// Request to create a new project under an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    /// Project name; a random identifier is substituted when absent
    #[serde(default)]
    pub name: Option<String>,
}

/// Request to rename a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: String,
}

/// Project representation returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub id: i64,
    pub org_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            org_id: project.org_id,
            name: project.name,
            source: project.source.map(SourceResponse::from),
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

/// Request to attach a source repository to a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSourceRequest {
    /// Provider discriminator, e.g. "github"
    pub kind: String,

    /// Repository locator, e.g. "acme/web"
    pub repository: String,
}

/// Source representation returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResponse {
    pub id: i64,
    pub project_id: i64,
    pub kind: String,
    pub repository: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Source> for SourceResponse {
    fn from(source: Source) -> Self {
        Self {
            id: source.id,
            project_id: source.project_id,
            kind: source.kind,
            repository: source.repository,
            user: source.user,
            created_at: source.created_at,
            updated_at: source.updated_at,
        }
    }
}

/// Access token representation returned by the API.
///
/// The stored token value is deliberately omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub id: i64,
    pub kind: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AccessToken> for AccessTokenResponse {
    fn from(token: AccessToken) -> Self {
        Self {
            id: token.id,
            kind: token.kind,
            user: token.user,
            created_at: token.created_at,
            updated_at: token.updated_at,
        }
    }
}

/// Pipeline template representation returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateResponse {
    pub id: i64,
    pub name: String,
    pub language: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PipelineTemplate> for TemplateResponse {
    fn from(template: PipelineTemplate) -> Self {
        Self {
            id: template.id,
            name: template.name,
            language: template.language,
            content: template.content,
            created_at: template.created_at,
            updated_at: template.updated_at,
        }
    }
}

/// Generic acknowledgement for delete operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: bool,
}
