//! Sender: turns ready notifications into channel deliveries.
//!
//! For each `notifications.ready` message the sender re-reads the row
//! (skipping anything already `SENT`), resolves the enabled endpoints of
//! every matched rule, deduplicates them, dispatches through the channel
//! registry, and marks the row `SENT`. Channel failures are best-effort:
//! logged and counted, never blocking the status transition.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use alertflow_bus::{decode, BusConsumer, Message};
use alertflow_core::events::NotificationReady;
use alertflow_core::{Endpoint, EndpointKind, MetricsCollector, NotificationStatus};
use alertflow_notify::ChannelRegistry;
use alertflow_store::{EndpointRepo, NotificationRepo};

/// Collapse endpoints to distinct `(kind, value)` pairs, preserving first
/// occurrence order. Several matched rules often share a destination; the
/// recipient gets one message.
pub fn dedup_endpoints(endpoints: &[Endpoint]) -> Vec<(EndpointKind, String)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for endpoint in endpoints {
        let key = (endpoint.kind, endpoint.value.clone());
        if seen.insert(key.clone()) {
            out.push(key);
        }
    }
    out
}

pub struct Sender {
    notifications: NotificationRepo,
    endpoints: EndpointRepo,
    registry: ChannelRegistry,
    metrics: Arc<MetricsCollector>,
}

impl Sender {
    pub fn new(
        notifications: NotificationRepo,
        endpoints: EndpointRepo,
        registry: ChannelRegistry,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            notifications,
            endpoints,
            registry,
            metrics,
        }
    }

    /// Deliver one ready notification. Returns `Ok(())` when the offset
    /// may commit; errors are infrastructure failures that warrant
    /// redelivery.
    pub async fn handle_ready(
        &self,
        event: &NotificationReady,
    ) -> Result<(), alertflow_store::StoreError> {
        let Some(notification) = self.notifications.fetch(event.notification_id).await? else {
            // The aggregator committed the row before emitting, so an
            // absent row means the event outlived its data. Nothing to
            // deliver; let the offset commit.
            warn!(
                notification_id = %event.notification_id,
                "ready event references a missing notification, skipping"
            );
            self.metrics.incr("notifications_missing");
            return Ok(());
        };

        if notification.status == NotificationStatus::Sent {
            self.metrics.incr("notifications_already_sent");
            info!(
                notification_id = %notification.notification_id,
                "notification already sent, redelivery skipped"
            );
            return Ok(());
        }

        let endpoints = self
            .endpoints
            .enabled_for_rules(&notification.rule_ids)
            .await?;
        let targets = dedup_endpoints(&endpoints);

        for (kind, value) in &targets {
            let result = self.registry.dispatch(*kind, value, &notification).await;
            if result.success {
                self.metrics.incr(&format!("deliveries_{kind}_ok"));
            } else {
                self.metrics.incr(&format!("deliveries_{kind}_failed"));
            }
        }

        // Best-effort per channel: the transition happens even when some
        // dispatches failed, which were logged and counted above.
        let transitioned = self
            .notifications
            .mark_sent(notification.notification_id)
            .await?;
        if transitioned {
            self.metrics.incr("notifications_sent");
            info!(
                notification_id = %notification.notification_id,
                client_id = %notification.client_id,
                endpoints = targets.len(),
                "notification sent"
            );
        }
        Ok(())
    }
}

/// Consume `notifications.ready` and drive [`Sender::handle_ready`],
/// committing offsets only after success.
pub async fn run_sender_loop(
    consumer: BusConsumer,
    sender: Sender,
    metrics: Arc<MetricsCollector>,
    cancel: CancellationToken,
) {
    loop {
        let msg = match consumer.recv(&cancel).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(e) => {
                metrics.incr("bus_errors");
                error!(error = %e, "notifications.ready receive failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let event: NotificationReady = match decode(msg.payload()) {
            Ok(event) => event,
            Err(e) => {
                metrics.incr("ready_malformed");
                error!(error = %e, "malformed notifications.ready event, offset left uncommitted");
                continue;
            }
        };

        match sender.handle_ready(&event).await {
            Ok(()) => {
                if let Err(e) = consumer.commit(&msg) {
                    error!(error = %e, "offset commit failed");
                }
            }
            Err(e) => {
                metrics.incr("store_errors");
                error!(
                    error = %e,
                    notification_id = %event.notification_id,
                    "delivery attempt failed, offset left uncommitted"
                );
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn endpoint(kind: EndpointKind, value: &str) -> Endpoint {
        Endpoint {
            endpoint_id: Uuid::new_v4(),
            rule_id: Uuid::new_v4(),
            kind,
            value: value.to_string(),
            enabled: true,
        }
    }

    #[test]
    fn dedup_collapses_shared_destinations() {
        let endpoints = vec![
            endpoint(EndpointKind::Email, "ops@corp.io"),
            endpoint(EndpointKind::Email, "ops@corp.io"),
            endpoint(EndpointKind::Slack, "https://hooks.slack.test/a"),
        ];
        let deduped = dedup_endpoints(&endpoints);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0], (EndpointKind::Email, "ops@corp.io".to_string()));
    }

    #[test]
    fn same_value_different_kind_is_distinct() {
        let endpoints = vec![
            endpoint(EndpointKind::Slack, "https://hooks.test/x"),
            endpoint(EndpointKind::Webhook, "https://hooks.test/x"),
        ];
        assert_eq!(dedup_endpoints(&endpoints).len(), 2);
    }

    #[test]
    fn dedup_preserves_first_occurrence_order() {
        let endpoints = vec![
            endpoint(EndpointKind::Webhook, "https://b.test"),
            endpoint(EndpointKind::Email, "a@corp.io"),
            endpoint(EndpointKind::Webhook, "https://b.test"),
        ];
        let deduped = dedup_endpoints(&endpoints);
        assert_eq!(deduped[0].1, "https://b.test");
        assert_eq!(deduped[1].1, "a@corp.io");
    }

    #[test]
    fn empty_endpoint_list_dedups_to_empty() {
        assert!(dedup_endpoints(&[]).is_empty());
    }
}
