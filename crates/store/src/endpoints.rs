//! Endpoint repository: read-only from the data plane.

use sqlx::PgPool;
use uuid::Uuid;

use alertflow_core::{Endpoint, EndpointKind};

use crate::error::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct EndpointRow {
    endpoint_id: Uuid,
    rule_id: Uuid,
    kind: String,
    value: String,
    enabled: bool,
}

impl TryFrom<EndpointRow> for Endpoint {
    type Error = StoreError;

    fn try_from(row: EndpointRow) -> Result<Self, StoreError> {
        let kind: EndpointKind = row
            .kind
            .parse()
            .map_err(|e: String| StoreError::Decode(format!("endpoint {}: {e}", row.endpoint_id)))?;
        Ok(Endpoint {
            endpoint_id: row.endpoint_id,
            rule_id: row.rule_id,
            kind,
            value: row.value,
            enabled: row.enabled,
        })
    }
}

#[derive(Clone)]
pub struct EndpointRepo {
    pool: PgPool,
}

impl EndpointRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All enabled endpoints attached to any of `rule_ids`. The sender
    /// deduplicates by `(kind, value)` afterwards; the query returns raw
    /// rows so that per-rule attribution stays available for logging.
    pub async fn enabled_for_rules(&self, rule_ids: &[Uuid]) -> Result<Vec<Endpoint>, StoreError> {
        let rows = sqlx::query_as::<_, EndpointRow>(
            "SELECT endpoint_id, rule_id, kind, value, enabled \
             FROM endpoints \
             WHERE rule_id = ANY($1) AND enabled = true \
             ORDER BY endpoint_id",
        )
        .bind(rule_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Endpoint::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_conversion_parses_kind() {
        let row = EndpointRow {
            endpoint_id: Uuid::new_v4(),
            rule_id: Uuid::new_v4(),
            kind: "slack".to_string(),
            value: "https://hooks.slack.com/services/T0/B0/x".to_string(),
            enabled: true,
        };
        let endpoint = Endpoint::try_from(row).unwrap();
        assert_eq!(endpoint.kind, EndpointKind::Slack);
    }

    #[test]
    fn row_conversion_rejects_unknown_kind() {
        let row = EndpointRow {
            endpoint_id: Uuid::new_v4(),
            rule_id: Uuid::new_v4(),
            kind: "pager".to_string(),
            value: "x".to_string(),
            enabled: true,
        };
        assert!(matches!(
            Endpoint::try_from(row),
            Err(StoreError::Decode(_))
        ));
    }
}
