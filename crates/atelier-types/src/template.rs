//! Pipeline template type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reusable pipeline definition offered to clients as a starting point.
///
/// Templates are read-only through the public API; engines that do not store
/// any simply report an empty catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTemplate {
    /// Unique identifier, assigned by the storage engine
    pub id: i64,

    /// Human-readable name for the template
    pub name: String,

    /// Language or toolchain the template targets, e.g. "go", "node"
    pub language: String,

    /// Raw template body
    pub content: String,

    /// When this template was created
    pub created_at: DateTime<Utc>,

    /// When this template was last updated
    pub updated_at: DateTime<Utc>,
}
