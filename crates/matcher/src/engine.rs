//! The alert consume-match-emit loop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use alertflow_bus::{decode, BusConsumer, BusProducer, Message};
use alertflow_core::events::AlertMatched;
use alertflow_core::{Alert, MetricsCollector};

use crate::reload::SharedIndexes;

/// Consume `alerts.new`, match each alert against the current indexes, and
/// emit one `alerts.matched` per matching tenant, keyed by `client_id`.
///
/// The offset commits only after every per-tenant produce is acked; an
/// empty match set commits immediately. Malformed or invalid alerts are
/// persistent data errors: logged, counted, offset left uncommitted.
pub async fn run_alert_loop(
    consumer: BusConsumer,
    producer: BusProducer,
    shared: Arc<SharedIndexes>,
    matched_topic: String,
    metrics: Arc<MetricsCollector>,
    cancel: CancellationToken,
) {
    loop {
        let msg = match consumer.recv(&cancel).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(e) => {
                metrics.incr("bus_errors");
                error!(error = %e, "alerts.new receive failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let alert: Alert = match decode(msg.payload()) {
            Ok(alert) => alert,
            Err(e) => {
                metrics.incr("alerts_malformed");
                error!(error = %e, "malformed alert, offset left uncommitted");
                continue;
            }
        };

        if let Err(reason) = alert.validate() {
            metrics.incr("alerts_malformed");
            error!(alert_id = %alert.alert_id, reason = %reason, "invalid alert, offset left uncommitted");
            continue;
        }

        metrics.incr("alerts_consumed");

        // One pointer load per alert; the indexes stay consistent for the
        // whole match even if a reload lands meanwhile.
        let indexes = shared.current();
        let by_client = indexes.match_alert(&alert);

        if by_client.is_empty() {
            metrics.incr("alerts_unmatched");
            debug!(alert_id = %alert.alert_id, "no matching rules");
            if let Err(e) = consumer.commit(&msg) {
                error!(error = %e, "offset commit failed");
            }
            continue;
        }

        let mut all_emitted = true;
        for (client_id, rule_ids) in by_client {
            let event = AlertMatched::from_alert(&alert, client_id, rule_ids);
            if let Err(e) = producer
                .send_json(&matched_topic, &event.client_id, &event)
                .await
            {
                metrics.incr("matches_emit_failures");
                warn!(
                    error = %e,
                    alert_id = %alert.alert_id,
                    client_id = %event.client_id,
                    "alerts.matched emit failed, alert will be redelivered"
                );
                all_emitted = false;
                break;
            }
            metrics.incr("matches_emitted");
        }

        if all_emitted {
            if let Err(e) = consumer.commit(&msg) {
                error!(error = %e, "offset commit failed");
            }
        } else {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}
