//! Generic HTTP webhook channel.

use chrono::{DateTime, SecondsFormat, Utc};

use alertflow_core::{EndpointKind, Notification};

use crate::traits::{Channel, NotifyError};

const HTTP_TIMEOUT_SECS: u64 = 30;

/// The canonical JSON body posted to webhook endpoints. `timestamp` is
/// the delivery time, RFC3339 in UTC.
pub fn webhook_payload(
    notification: &Notification,
    timestamp: DateTime<Utc>,
) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "notification_id": notification.notification_id,
        "client_id": &notification.client_id,
        "alert_id": notification.alert_id,
        "severity": &notification.severity,
        "source": &notification.source,
        "name": &notification.name,
        "rule_ids": &notification.rule_ids,
        "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
    });
    if let Some(context) = &notification.context {
        payload["context"] = serde_json::json!(context);
    }
    payload
}

/// Posts the canonical notification JSON to the endpoint's URL.
pub struct WebhookChannel {
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new() -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(NotifyError::Http)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Channel for WebhookChannel {
    async fn send(
        &self,
        endpoint_value: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let payload = webhook_payload(notification, Utc::now());
        let response = self
            .client
            .post(endpoint_value)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            notification_id = %notification.notification_id,
            url = endpoint_value,
            "webhook notification delivered"
        );
        Ok(())
    }

    fn kind(&self) -> EndpointKind {
        EndpointKind::Webhook
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertflow_core::NotificationStatus;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn notification() -> Notification {
        Notification {
            notification_id: Uuid::new_v4(),
            client_id: "client-1".to_string(),
            alert_id: Uuid::new_v4(),
            severity: "CRITICAL".to_string(),
            source: "db".to_string(),
            name: "replication-lag".to_string(),
            context: None,
            rule_ids: vec![Uuid::new_v4()],
            status: NotificationStatus::Received,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn payload_carries_all_notification_fields() {
        let n = notification();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let payload = webhook_payload(&n, ts);

        assert_eq!(payload["notification_id"], n.notification_id.to_string());
        assert_eq!(payload["client_id"], "client-1");
        assert_eq!(payload["alert_id"], n.alert_id.to_string());
        assert_eq!(payload["severity"], "CRITICAL");
        assert_eq!(payload["source"], "db");
        assert_eq!(payload["name"], "replication-lag");
        assert_eq!(payload["rule_ids"][0], n.rule_ids[0].to_string());
        assert_eq!(payload["timestamp"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn context_is_omitted_when_absent() {
        let payload = webhook_payload(&notification(), Utc::now());
        assert!(payload.get("context").is_none());
    }

    #[test]
    fn context_is_included_when_present() {
        let mut n = notification();
        n.context = Some(HashMap::from([(
            "shard".to_string(),
            "7".to_string(),
        )]));
        let payload = webhook_payload(&n, Utc::now());
        assert_eq!(payload["context"]["shard"], "7");
    }
}
