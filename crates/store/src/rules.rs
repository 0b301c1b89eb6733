//! Rule repository: publisher writes, snapshot builder reads.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use alertflow_core::Rule;

use crate::error::{conflict_on_unique, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    rule_id: Uuid,
    client_id: String,
    severity: String,
    source: String,
    name: String,
    enabled: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RuleRow> for Rule {
    fn from(row: RuleRow) -> Self {
        Rule {
            rule_id: row.rule_id,
            client_id: row.client_id,
            severity: row.severity,
            source: row.source,
            name: row.name,
            enabled: row.enabled,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const RULE_COLUMNS: &str =
    "rule_id, client_id, severity, source, name, enabled, version, created_at, updated_at";

#[derive(Clone)]
pub struct RuleRepo {
    pool: PgPool,
}

impl RuleRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly validated rule. The `(client_id, severity, source,
    /// name)` uniqueness constraint surfaces as [`StoreError::Conflict`].
    pub async fn insert(&self, rule: &Rule) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO rules \
             (rule_id, client_id, severity, source, name, enabled, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(rule.rule_id)
        .bind(&rule.client_id)
        .bind(&rule.severity)
        .bind(&rule.source)
        .bind(&rule.name)
        .bind(rule.enabled)
        .bind(rule.version)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "rule tuple already exists for tenant"))?;
        Ok(())
    }

    /// Replace a rule's match criteria, bumping its version. Returns the
    /// updated row.
    pub async fn update_criteria(
        &self,
        rule_id: Uuid,
        severity: &str,
        source: &str,
        name: &str,
    ) -> Result<Rule, StoreError> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "UPDATE rules \
             SET severity = $2, source = $3, name = $4, \
                 version = version + 1, updated_at = now() \
             WHERE rule_id = $1 \
             RETURNING {RULE_COLUMNS}"
        ))
        .bind(rule_id)
        .bind(severity)
        .bind(source)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "rule tuple already exists for tenant"))?
        .ok_or_else(|| StoreError::NotFound(format!("rule {rule_id}")))?;
        Ok(row.into())
    }

    /// Flip the enabled flag, bumping the version. Returns the updated row.
    pub async fn set_enabled(&self, rule_id: Uuid, enabled: bool) -> Result<Rule, StoreError> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "UPDATE rules \
             SET enabled = $2, version = version + 1, updated_at = now() \
             WHERE rule_id = $1 \
             RETURNING {RULE_COLUMNS}"
        ))
        .bind(rule_id)
        .bind(enabled)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("rule {rule_id}")))?;
        Ok(row.into())
    }

    /// Delete a rule, returning its last state for the change event.
    pub async fn delete(&self, rule_id: Uuid) -> Result<Rule, StoreError> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "DELETE FROM rules WHERE rule_id = $1 RETURNING {RULE_COLUMNS}"
        ))
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("rule {rule_id}")))?;
        Ok(row.into())
    }

    /// Fetch a rule by id. `None` when the rule no longer exists (e.g. a
    /// CREATED event racing a delete).
    pub async fn fetch(&self, rule_id: Uuid) -> Result<Option<Rule>, StoreError> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM rules WHERE rule_id = $1"
        ))
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }
}
