//! Aggregator: collapses matched alerts into notifications.
//!
//! This is the deduplication boundary. For every `alerts.matched` message
//! the aggregator attempts an idempotent insert keyed on
//! `(client_id, alert_id)`; only an insert that actually created a row
//! emits `notifications.ready`. Redeliveries find the existing row and
//! emit nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use alertflow_bus::{decode, BusConsumer, BusProducer, Message};
use alertflow_core::events::{AlertMatched, NotificationReady};
use alertflow_core::MetricsCollector;
use alertflow_store::NotificationRepo;

/// Build the downstream event for a freshly inserted notification.
pub fn ready_event(matched: &AlertMatched, notification_id: Uuid) -> NotificationReady {
    NotificationReady {
        notification_id,
        client_id: matched.client_id.clone(),
        alert_id: matched.alert_id,
        severity: matched.severity,
        source: matched.source.clone(),
        name: matched.name.clone(),
    }
}

/// Consume `alerts.matched`; insert-or-skip; emit `notifications.ready`
/// for new rows only; commit the offset after both steps succeed.
pub async fn run_aggregator_loop(
    consumer: BusConsumer,
    producer: BusProducer,
    notifications: NotificationRepo,
    ready_topic: String,
    metrics: Arc<MetricsCollector>,
    cancel: CancellationToken,
) {
    loop {
        let msg = match consumer.recv(&cancel).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(e) => {
                metrics.incr("bus_errors");
                error!(error = %e, "alerts.matched receive failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let matched: AlertMatched = match decode(msg.payload()) {
            Ok(matched) => matched,
            Err(e) => {
                metrics.incr("matches_malformed");
                error!(error = %e, "malformed alerts.matched event, offset left uncommitted");
                continue;
            }
        };

        metrics.incr("matches_consumed");

        let inserted = match notifications.insert_if_absent(&matched).await {
            Ok(inserted) => inserted,
            Err(e) => {
                metrics.incr("store_errors");
                error!(
                    error = %e,
                    alert_id = %matched.alert_id,
                    client_id = %matched.client_id,
                    "notification insert failed, offset left uncommitted"
                );
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        match inserted {
            Some(notification_id) => {
                let event = ready_event(&matched, notification_id);
                if let Err(e) = producer
                    .send_json(&ready_topic, &event.client_id, &event)
                    .await
                {
                    // The row exists but the emit failed: redelivery will
                    // find the row and skip the emit, so this is the known
                    // no-outbox gap. Leave the offset uncommitted anyway.
                    metrics.incr("ready_emit_failures");
                    error!(
                        error = %e,
                        notification_id = %notification_id,
                        "notifications.ready emit failed, offset left uncommitted"
                    );
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
                metrics.incr("notifications_created");
                info!(
                    notification_id = %notification_id,
                    client_id = %matched.client_id,
                    alert_id = %matched.alert_id,
                    "notification created"
                );
            }
            None => {
                metrics.incr("matches_deduplicated");
                debug!(
                    client_id = %matched.client_id,
                    alert_id = %matched.alert_id,
                    "duplicate match absorbed"
                );
            }
        }

        if let Err(e) = consumer.commit(&msg) {
            error!(error = %e, "offset commit failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertflow_core::Severity;

    #[test]
    fn ready_event_carries_denormalised_fields() {
        let matched = AlertMatched {
            alert_id: Uuid::new_v4(),
            schema_version: 1,
            event_ts: 1_700_000_000,
            severity: Severity::Medium,
            source: "api".to_string(),
            name: "timeout".to_string(),
            context: None,
            client_id: "client-3".to_string(),
            rule_ids: vec![Uuid::new_v4()],
        };
        let notification_id = Uuid::new_v4();
        let event = ready_event(&matched, notification_id);
        assert_eq!(event.notification_id, notification_id);
        assert_eq!(event.client_id, "client-3");
        assert_eq!(event.alert_id, matched.alert_id);
        assert_eq!(event.severity, Severity::Medium);
        assert_eq!(event.source, "api");
        assert_eq!(event.name, "timeout");
    }
}
