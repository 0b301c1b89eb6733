//! Background metrics reporter.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use alertflow_core::config::MetricsConfig;
use alertflow_core::MetricsCollector;

use crate::store::KvStore;

/// Periodically publish the collector's counters to `metrics:<service>`.
///
/// Runs until `cancel` fires, then performs one final publish so the last
/// counts of a shutting-down service are always recorded.
pub async fn run_metrics_reporter(
    kv: KvStore,
    metrics: Arc<MetricsCollector>,
    config: MetricsConfig,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.report_interval_secs));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                publish(&kv, &metrics, config.ttl_secs).await;
            }
        }
    }
    publish(&kv, &metrics, config.ttl_secs).await;
    tracing::debug!(service = metrics.service(), "metrics reporter stopped");
}

async fn publish(kv: &KvStore, metrics: &MetricsCollector, ttl_secs: u64) {
    if let Err(e) = kv.put_metrics(metrics.service(), &metrics.to_json(), ttl_secs).await {
        tracing::warn!(error = %e, "failed to publish metrics snapshot");
    }
}
