//! Notification repository: the deduplication boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use alertflow_core::events::AlertMatched;
use alertflow_core::{Notification, NotificationStatus};

use crate::error::StoreError;

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    notification_id: Uuid,
    client_id: String,
    alert_id: Uuid,
    severity: String,
    source: String,
    name: String,
    context: Option<serde_json::Value>,
    rule_ids: Vec<Uuid>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, StoreError> {
        let status: NotificationStatus = row.status.parse().map_err(|e: String| {
            StoreError::Decode(format!("notification {}: {e}", row.notification_id))
        })?;
        let context: Option<HashMap<String, String>> = match row.context {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                StoreError::Decode(format!("notification {} context: {e}", row.notification_id))
            })?,
            None => None,
        };
        Ok(Notification {
            notification_id: row.notification_id,
            client_id: row.client_id,
            alert_id: row.alert_id,
            severity: row.severity,
            source: row.source,
            name: row.name,
            context,
            rule_ids: row.rule_ids,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct NotificationRepo {
    pool: PgPool,
}

impl NotificationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Materialize a notification for a matched alert, idempotently.
    ///
    /// `ON CONFLICT (client_id, alert_id) DO NOTHING RETURNING` makes the
    /// database the single source of "new or not": a returned id means this
    /// call inserted the row, an empty result means it already existed and
    /// the caller must not emit downstream. A crash between this insert and
    /// the `notifications.ready` emit loses that emit for the pair; closing
    /// the gap needs a durable outbox, which the MVP does not have.
    pub async fn insert_if_absent(&self, matched: &AlertMatched) -> Result<Option<Uuid>, StoreError> {
        let context = matched
            .context
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Decode(format!("context encoding: {e}")))?;

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            "INSERT INTO notifications \
             (notification_id, client_id, alert_id, severity, source, name, \
              context, rule_ids, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now()) \
             ON CONFLICT (client_id, alert_id) DO NOTHING \
             RETURNING notification_id",
        )
        .bind(Uuid::new_v4())
        .bind(&matched.client_id)
        .bind(matched.alert_id)
        .bind(matched.severity.as_str())
        .bind(&matched.source)
        .bind(&matched.name)
        .bind(context)
        .bind(&matched.rule_ids)
        .bind(NotificationStatus::Received.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.map(|(id,)| id))
    }

    pub async fn fetch(&self, notification_id: Uuid) -> Result<Option<Notification>, StoreError> {
        let row = sqlx::query_as::<_, NotificationRow>(
            "SELECT notification_id, client_id, alert_id, severity, source, name, \
                    context, rule_ids, status, created_at, updated_at \
             FROM notifications WHERE notification_id = $1",
        )
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Notification::try_from).transpose()
    }

    /// Transition `RECEIVED -> SENT`. The status guard in the predicate
    /// makes redelivered sends a no-op; returns whether a row transitioned.
    pub async fn mark_sent(&self, notification_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET status = $2, updated_at = now() \
             WHERE notification_id = $1 AND status = $3",
        )
        .bind(notification_id)
        .bind(NotificationStatus::Sent.as_str())
        .bind(NotificationStatus::Received.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, context: Option<serde_json::Value>) -> NotificationRow {
        NotificationRow {
            notification_id: Uuid::new_v4(),
            client_id: "client-1".to_string(),
            alert_id: Uuid::new_v4(),
            severity: "HIGH".to_string(),
            source: "api".to_string(),
            name: "timeout".to_string(),
            context,
            rule_ids: vec![Uuid::new_v4()],
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_conversion_parses_status_and_context() {
        let n = Notification::try_from(row(
            "RECEIVED",
            Some(serde_json::json!({"region": "eu-west-1"})),
        ))
        .unwrap();
        assert_eq!(n.status, NotificationStatus::Received);
        assert_eq!(n.context.unwrap()["region"], "eu-west-1");
    }

    #[test]
    fn row_conversion_allows_missing_context() {
        let n = Notification::try_from(row("SENT", None)).unwrap();
        assert_eq!(n.status, NotificationStatus::Sent);
        assert!(n.context.is_none());
    }

    #[test]
    fn row_conversion_rejects_unknown_status() {
        assert!(matches!(
            Notification::try_from(row("PENDING", None)),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn row_conversion_rejects_non_string_context() {
        let result = Notification::try_from(row("RECEIVED", Some(serde_json::json!({"n": 42}))));
        assert!(matches!(result, Err(StoreError::Decode(_))));
    }
}
