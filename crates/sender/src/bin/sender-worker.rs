//! sender-worker — delivers ready notifications over email, Slack, and
//! webhooks, then marks them `SENT`.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use alertflow_bus::BusConsumer;
use alertflow_core::config::{
    EmailConfig, KafkaConfig, MetricsConfig, PostgresConfig, RedisConfig, Topics,
};
use alertflow_core::{load_dotenv, MetricsCollector};
use alertflow_kv::{run_metrics_reporter, KvStore};
use alertflow_notify::{ChannelRegistry, EmailChannel, SlackChannel, WebhookChannel};
use alertflow_sender::{run_sender_loop, Sender};
use alertflow_store::{EndpointRepo, NotificationRepo};

/// Sender worker.
#[derive(Parser, Debug)]
#[command(name = "sender-worker", version, about)]
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

    let kafka = KafkaConfig::from_env("alertflow-sender");
    let topics = Topics::from_env();
    let postgres = PostgresConfig::from_env()?;
    let redis = RedisConfig::from_env();
    let email = EmailConfig::from_env();
    let metrics_config = MetricsConfig::from_env();

    info!(
        brokers = %kafka.brokers,
        group_id = %kafka.group_id,
        topic = %topics.notifications_ready,
        postgres = %postgres.redacted_host(),
        email_provider = email.provider.as_deref().unwrap_or("auto"),
        email_rate_limit = email.rate_limit_per_sec,
        "sender-worker starting"
    );

    let pool = alertflow_store::connect(&postgres).await?;
    let kv = KvStore::connect(&redis).await?;
    let consumer = BusConsumer::connect(&kafka, &[topics.notifications_ready.as_str()])?;

    let mut registry = ChannelRegistry::new();
    registry.register(Box::new(EmailChannel::from_config(&email).await));
    registry.register(Box::new(SlackChannel::new()?));
    registry.register(Box::new(WebhookChannel::new()?));

    let metrics = Arc::new(MetricsCollector::new("sender"));
    let sender = Sender::new(
        NotificationRepo::new(pool.clone()),
        EndpointRepo::new(pool),
        registry,
        metrics.clone(),
    );

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

    run_sender_loop(consumer, sender, metrics.clone(), cancel.clone()).await;

    cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(cli.shutdown_timeout), reporter)
        .await
        .is_err()
    {
        warn!("metrics reporter did not stop within the grace period");
    }

    info!("sender-worker exited cleanly");
    Ok(())
}
