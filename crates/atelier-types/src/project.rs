//! Project and Source types
//!
//! A Project belongs to exactly one Organization for its lifetime and may
//! carry at most one attached Source (a link to an external code repository).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of work owned by exactly one organization.
///
/// The owning org ID stored on the project is the single source of truth for
/// ownership; projects are addressed by the composite key `(org_id, id)` and
/// cannot be reassigned to another organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier, assigned by the storage engine
    pub id: i64,

    /// Owning organization
    pub org_id: i64,

    /// Human-readable name for the project
    pub name: String,

    /// Attached source repository, at most one per project
    #[serde(default)]
    pub source: Option<Source>,

    /// When this project was created
    pub created_at: DateTime<Utc>,

    /// When this project was last updated
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new Project under `org_id` that has not been persisted yet.
    ///
    /// A random identifier is substituted when `name` is empty.
    pub fn new(org_id: i64, name: impl Into<String>) -> Self {
        let mut name = name.into();
        if name.is_empty() {
            name = Uuid::new_v4().to_string();
        }
        let now = Utc::now();
        Self { id: 0, org_id, name, source: None, created_at: now, updated_at: now }
    }
}

/// A reference to an external code repository attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Unique identifier, assigned by the storage engine
    pub id: i64,

    /// Owning project (1:1)
    pub project_id: i64,

    /// Provider discriminator, e.g. "github"
    pub kind: String,

    /// Repository locator, e.g. "acme/web"
    pub repository: String,

    /// Provider-side user the source was linked by
    #[serde(default)]
    pub user: String,

    /// When this source was created
    pub created_at: DateTime<Utc>,

    /// When this source was last updated
    pub updated_at: DateTime<Utc>,
}

impl Source {
    /// Create a new Source for `project_id` that has not been persisted yet.
    pub fn new(project_id: i64, kind: impl Into<String>, repository: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            project_id,
            kind: kind.into(),
            repository: repository.into(),
            user: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
