//! Access token type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A credential for a `(kind, user)` provider pair.
///
/// The pair is a unique logical key: upserting a token for an existing pair
/// replaces the stored token value instead of erroring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Unique identifier, assigned by the storage engine
    pub id: i64,

    /// Provider discriminator, e.g. "github"
    pub kind: String,

    /// Provider-side user name
    pub user: String,

    /// Opaque token value
    pub token: String,

    /// When this token was created
    pub created_at: DateTime<Utc>,

    /// When this token was last updated
    pub updated_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create a new AccessToken that has not been persisted yet.
    pub fn new(kind: impl Into<String>, user: impl Into<String>, token: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            kind: kind.into(),
            user: user.into(),
            token: token.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
