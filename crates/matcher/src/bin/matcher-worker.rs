//! matcher-worker — stateless alert processor, sharded by consumer group
//! on `alerts.new`, hot-reloading the rule snapshot on version changes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use alertflow_bus::{BusConsumer, BusProducer};
use alertflow_core::config::{KafkaConfig, MatcherConfig, MetricsConfig, RedisConfig, Topics};
use alertflow_core::{load_dotenv, MetricsCollector};
use alertflow_kv::{run_metrics_reporter, KvStore};
use alertflow_matcher::{
    load_indexes, run_alert_loop, run_rule_change_listener, run_version_poller, SharedIndexes,
};

/// Matcher worker.
#[derive(Parser, Debug)]
#[command(name = "matcher-worker", version, about)]
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

    let kafka = KafkaConfig::from_env("alertflow-matcher");
    let topics = Topics::from_env();
    let redis = RedisConfig::from_env();
    let matcher_config = MatcherConfig::from_env();
    let metrics_config = MetricsConfig::from_env();

    info!(
        brokers = %kafka.brokers,
        group_id = %kafka.group_id,
        alerts_topic = %topics.alerts_new,
        redis = %redis.addr,
        poll_interval_secs = matcher_config.version_poll_interval_secs,
        "matcher-worker starting"
    );

    let kv = KvStore::connect(&redis).await?;

    // Running without rules is forbidden: bail before touching the bus.
    let indexes = load_indexes(&kv)
        .await
        .context("initial snapshot load failed")?;
    let shared = Arc::new(SharedIndexes::new(indexes));

    let alert_consumer = BusConsumer::connect(&kafka, &[topics.alerts_new.as_str()])?;

    // Every instance must see every rule change, so the side consumer gets
    // an instance-unique group id instead of sharing the alert group.
    let reload_kafka = KafkaConfig {
        brokers: kafka.brokers.clone(),
        group_id: format!("{}-reload-{}", kafka.group_id, Uuid::new_v4().simple()),
    };
    let reload_consumer = BusConsumer::connect(&reload_kafka, &[topics.rule_changed.as_str()])?;

    let producer = BusProducer::connect(&kafka.brokers, "1")?;

    let metrics = Arc::new(MetricsCollector::new("matcher"));
    let cancel = CancellationToken::new();

    let reporter = tokio::spawn(run_metrics_reporter(
        kv.clone(),
        metrics.clone(),
        metrics_config,
        cancel.clone(),
    ));
    let poller = tokio::spawn(run_version_poller(
        kv.clone(),
        shared.clone(),
        Duration::from_secs(matcher_config.version_poll_interval_secs),
        metrics.clone(),
        cancel.clone(),
    ));
    let listener = tokio::spawn(run_rule_change_listener(
        reload_consumer,
        kv.clone(),
        shared.clone(),
        metrics.clone(),
        cancel.clone(),
    ));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    run_alert_loop(
        alert_consumer,
        producer,
        shared,
        topics.alerts_matched.clone(),
        metrics.clone(),
        cancel.clone(),
    )
    .await;

    cancel.cancel();
    let grace = Duration::from_secs(cli.shutdown_timeout);
    for (name, handle) in [
        ("version poller", poller),
        ("rule.changed listener", listener),
        ("metrics reporter", reporter),
    ] {
        if tokio::time::timeout(grace, handle).await.is_err() {
            warn!(task = name, "task did not stop within the grace period");
        }
    }

    info!("matcher-worker exited cleanly");
    Ok(())
}
