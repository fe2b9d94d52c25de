//! Organization type
//!
//! Represents an organization, the top-level tenant entity that owns projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An Organization that owns zero or more Projects.
///
/// IDs are strictly increasing positive integers assigned by the active
/// storage engine at create time; an `id` of 0 marks a not-yet-persisted
/// entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Org {
    /// Unique identifier, assigned by the storage engine
    pub id: i64,

    /// Human-readable name for the organization
    pub name: String,

    /// When this organization was created
    pub created_at: DateTime<Utc>,

    /// When this organization was last updated
    pub updated_at: DateTime<Utc>,
}

impl Org {
    /// Create a new Organization that has not been persisted yet.
    ///
    /// A random identifier is substituted when `name` is empty.
    pub fn new(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if name.is_empty() {
            name = Uuid::new_v4().to_string();
        }
        let now = Utc::now();
        Self { id: 0, name, created_at: now, updated_at: now }
    }
}
