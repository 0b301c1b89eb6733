//! Routes notifications to channels by endpoint kind.
//!
//! The sender resolves a notification's endpoints, deduplicates them, and
//! hands each to the registry. Individual channel failures are reported
//! in the results and don't block other deliveries.

use std::collections::HashMap;

use alertflow_core::{EndpointKind, Notification};

use crate::traits::{Channel, NotifyError};

/// Result of dispatching a notification to a single endpoint.
#[derive(Debug)]
pub struct DispatchResult {
    pub kind: EndpointKind,
    pub endpoint_value: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Kind-keyed channel registry.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: HashMap<EndpointKind, Box<dyn Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: Box<dyn Channel>) {
        self.channels.insert(channel.kind(), channel);
    }

    /// Deliver to one endpoint, selected by its kind tag.
    pub async fn dispatch(
        &self,
        kind: EndpointKind,
        endpoint_value: &str,
        notification: &Notification,
    ) -> DispatchResult {
        let start = std::time::Instant::now();
        let result = match self.channels.get(&kind) {
            Some(channel) => channel.send(endpoint_value, notification).await,
            None => Err(NotifyError::Config(format!(
                "no channel registered for kind '{kind}'"
            ))),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, error) = match result {
            Ok(()) => {
                tracing::info!(
                    notification_id = %notification.notification_id,
                    channel = %kind,
                    duration_ms,
                    "notification delivered"
                );
                (true, None)
            }
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification.notification_id,
                    channel = %kind,
                    error = %e,
                    duration_ms,
                    "notification delivery failed"
                );
                (false, Some(e.to_string()))
            }
        };

        DispatchResult {
            kind,
            endpoint_value: endpoint_value.to_string(),
            success,
            error,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use alertflow_core::NotificationStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn notification() -> Notification {
        Notification {
            notification_id: Uuid::new_v4(),
            client_id: "client-1".to_string(),
            alert_id: Uuid::new_v4(),
            severity: "HIGH".to_string(),
            source: "api".to_string(),
            name: "timeout".to_string(),
            context: Some(HashMap::from([(
                "region".to_string(),
                "eu-west-1".to_string(),
            )])),
            rule_ids: vec![Uuid::new_v4()],
            status: NotificationStatus::Received,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct MockChannel {
        kind: EndpointKind,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Channel for MockChannel {
        async fn send(
            &self,
            _endpoint_value: &str,
            _notification: &Notification,
        ) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }

        fn kind(&self) -> EndpointKind {
            self.kind
        }
    }

    #[tokio::test]
    async fn dispatch_routes_on_kind() {
        let slack_count = Arc::new(AtomicUsize::new(0));
        let webhook_count = Arc::new(AtomicUsize::new(0));

        let mut registry = ChannelRegistry::new();
        registry.register(Box::new(MockChannel {
            kind: EndpointKind::Slack,
            send_count: slack_count.clone(),
            should_fail: false,
        }));
        registry.register(Box::new(MockChannel {
            kind: EndpointKind::Webhook,
            send_count: webhook_count.clone(),
            should_fail: false,
        }));

        let n = notification();
        let result = registry
            .dispatch(EndpointKind::Slack, "https://hooks.slack.test/x", &n)
            .await;
        assert!(result.success);
        assert_eq!(slack_count.load(Ordering::SeqCst), 1);
        assert_eq!(webhook_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_is_reported_not_raised() {
        let mut registry = ChannelRegistry::new();
        registry.register(Box::new(MockChannel {
            kind: EndpointKind::Email,
            send_count: Arc::new(AtomicUsize::new(0)),
            should_fail: true,
        }));

        let result = registry
            .dispatch(EndpointKind::Email, "ops@corp.io", &notification())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("mock failure"));
    }

    #[tokio::test]
    async fn unregistered_kind_fails_cleanly() {
        let registry = ChannelRegistry::new();
        let result = registry
            .dispatch(EndpointKind::Webhook, "https://x.test", &notification())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no channel registered"));
    }
}
