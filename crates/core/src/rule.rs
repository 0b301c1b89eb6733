//! Tenant-owned matching rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The literal that matches any value in a rule criterion.
pub const WILDCARD: &str = "*";

/// A tenant-owned 3-tuple predicate over `(severity, source, name)`.
///
/// Each criterion is either a literal value or [`WILDCARD`]. A rule with
/// all three criteria set to the wildcard is invalid and rejected at
/// creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: Uuid,
    /// Owning tenant.
    pub client_id: String,
    pub severity: String,
    pub source: String,
    pub name: String,
    pub enabled: bool,
    /// Monotonic per-rule version, bumped on every mutation.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Whether every criterion is the wildcard.
    pub fn is_all_wildcard(&self) -> bool {
        self.severity == WILDCARD && self.source == WILDCARD && self.name == WILDCARD
    }
}
