//! Slack incoming-webhook channel.

use alertflow_core::{EndpointKind, Notification};

use crate::traits::{Channel, NotifyError};

const HTTP_TIMEOUT_SECS: u64 = 30;

/// Attachment colour for a severity string.
pub fn severity_color(severity: &str) -> &'static str {
    match severity {
        "CRITICAL" => "#ff0000",
        "HIGH" | "MEDIUM" => "#ffcc00",
        _ => "#36a64f",
    }
}

/// Build the attachment payload posted to the Slack webhook.
pub fn slack_payload(notification: &Notification) -> serde_json::Value {
    let rule_ids = notification
        .rule_ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let mut text = format!(
        "Alert *{}* from source *{}*.",
        notification.name, notification.source
    );
    if let Some(context) = &notification.context {
        let mut pairs: Vec<_> = context.iter().collect();
        pairs.sort();
        for (key, value) in pairs {
            text.push_str(&format!("\n• {key}: {value}"));
        }
    }

    serde_json::json!({
        "attachments": [{
            "color": severity_color(&notification.severity),
            "title": format!("Alert: {} - {}", notification.severity, notification.name),
            "text": text,
            "fields": [
                { "title": "Severity", "value": &notification.severity, "short": true },
                { "title": "Source", "value": &notification.source, "short": true },
                { "title": "Name", "value": &notification.name, "short": true },
                { "title": "Alert ID", "value": notification.alert_id.to_string(), "short": true },
                { "title": "Client ID", "value": &notification.client_id, "short": true },
                { "title": "Notification ID", "value": notification.notification_id.to_string(), "short": true },
                { "title": "Matched rules", "value": rule_ids, "short": false },
            ],
        }]
    })
}

/// Posts one attachment per notification to the endpoint's webhook URL.
pub struct SlackChannel {
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new() -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(NotifyError::Http)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Channel for SlackChannel {
    async fn send(
        &self,
        endpoint_value: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let payload = slack_payload(notification);
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
            "slack notification delivered"
        );
        Ok(())
    }

    fn kind(&self) -> EndpointKind {
        EndpointKind::Slack
    }
}
