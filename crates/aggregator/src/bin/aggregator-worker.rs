//! aggregator-worker — deduplicates matched alerts into notifications.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use alertflow_aggregator::run_aggregator_loop;
use alertflow_bus::{BusConsumer, BusProducer};
use alertflow_core::config::{KafkaConfig, MetricsConfig, PostgresConfig, RedisConfig, Topics};
use alertflow_core::{load_dotenv, MetricsCollector};
use alertflow_kv::{run_metrics_reporter, KvStore};
use alertflow_store::NotificationRepo;

/// Aggregator worker.
#[derive(Parser, Debug)]
#[command(name = "aggregator-worker", version, about)]
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

    let kafka = KafkaConfig::from_env("alertflow-aggregator");
    let topics = Topics::from_env();
    let postgres = PostgresConfig::from_env()?;
    let redis = RedisConfig::from_env();
    let metrics_config = MetricsConfig::from_env();

    info!(
        brokers = %kafka.brokers,
        group_id = %kafka.group_id,
        topic = %topics.alerts_matched,
        postgres = %postgres.redacted_host(),
        "aggregator-worker starting"
    );

    let pool = alertflow_store::connect(&postgres).await?;
    let kv = KvStore::connect(&redis).await?;
    let consumer = BusConsumer::connect(&kafka, &[topics.alerts_matched.as_str()])?;
    let producer = BusProducer::connect(&kafka.brokers, "1")?;

    let metrics = Arc::new(MetricsCollector::new("aggregator"));
    let cancel = CancellationToken::new();

    let reporter = tokio::spawn(run_metrics_reporter(
        kv,
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

    run_aggregator_loop(
        consumer,
        producer,
        NotificationRepo::new(pool),
        topics.notifications_ready.clone(),
        metrics.clone(),
        cancel.clone(),
    )
    .await;

    cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(cli.shutdown_timeout), reporter)
        .await
        .is_err()
    {
        warn!("metrics reporter did not stop within the grace period");
    }

    info!("aggregator-worker exited cleanly");
    Ok(())
}
