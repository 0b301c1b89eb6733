//! snapshot-builder — single-writer consumer on `rule.changed` that keeps
//! the canonical rule snapshot in Redis current.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use alertflow_builder::SnapshotBuilder;
use alertflow_bus::{decode, BusConsumer, Message};
use alertflow_core::config::{KafkaConfig, MetricsConfig, PostgresConfig, RedisConfig, Topics};
use alertflow_core::events::RuleChanged;
use alertflow_core::{load_dotenv, MetricsCollector};
use alertflow_kv::{run_metrics_reporter, KvStore};
use alertflow_store::RuleRepo;

/// Snapshot builder worker.
#[derive(Parser, Debug)]
#[command(name = "snapshot-builder", version, about)]
struct Cli {
    /// Shutdown grace period in seconds.
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let kafka = KafkaConfig::from_env("alertflow-snapshot-builder");
    let topics = Topics::from_env();
    let postgres = PostgresConfig::from_env()?;
    let redis = RedisConfig::from_env();
    let metrics_config = MetricsConfig::from_env();

    info!(
        brokers = %kafka.brokers,
        group_id = %kafka.group_id,
        topic = %topics.rule_changed,
        postgres = %postgres.redacted_host(),
        redis = %redis.addr,
        "snapshot-builder starting"
    );

    let pool = alertflow_store::connect(&postgres).await?;
    let kv = KvStore::connect(&redis).await?;
    let consumer = BusConsumer::connect(&kafka, &[topics.rule_changed.as_str()])?;

    let metrics = Arc::new(MetricsCollector::new("snapshot-builder"));
    let builder = SnapshotBuilder::new(RuleRepo::new(pool), kv.clone(), metrics.clone());

    let cancel = CancellationToken::new();

    let reporter = tokio::spawn(run_metrics_reporter(
        kv.clone(),
        metrics.clone(),
        metrics_config,
        cancel.clone(),
    ));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    run_loop(&consumer, &builder, &metrics, &cancel).await;

    cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(cli.shutdown_timeout), reporter)
        .await
        .is_err()
    {
        warn!("metrics reporter did not stop within the grace period");
    }

    info!("snapshot-builder exited cleanly");
    Ok(())
}

async fn run_loop(
    consumer: &BusConsumer,
    builder: &SnapshotBuilder,
    metrics: &MetricsCollector,
    cancel: &CancellationToken,
) {
    loop {
        let msg = match consumer.recv(cancel).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(e) => {
                metrics.incr("bus_errors");
                error!(error = %e, "bus receive failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        let event: RuleChanged = match decode(msg.payload()) {
            Ok(event) => event,
            Err(e) => {
                // No dead-letter queue: the offset stays uncommitted and
                // the poison event needs operator attention.
                metrics.incr("rule_events_malformed");
                error!(error = %e, "malformed rule.changed event, offset left uncommitted");
                continue;
            }
        };

        match builder.handle_event(&event).await {
            Ok(()) => {
                metrics.incr("rule_events_applied");
                if let Err(e) = consumer.commit(&msg) {
                    error!(error = %e, "offset commit failed");
                }
            }
            Err(e) => {
                metrics.incr("rule_events_failed");
                error!(
                    error = %e,
                    rule_id = %event.rule_id,
                    "rule event failed, offset left uncommitted"
                );
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
