//! Snapshot hot reload.
//!
//! Two triggers funnel into the same reload path: a periodic poll of
//! `rules:version` and a side consumer on `rule.changed`. Reload builds a
//! fresh [`Indexes`] and swaps the shared reference; in-flight matches
//! keep the `Arc` they loaded and the old structure is freed when the
//! last reader drops it. Reload never blocks alert processing.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use alertflow_bus::BusConsumer;
use alertflow_core::MetricsCollector;
use alertflow_kv::KvStore;

use crate::error::MatchError;
use crate::indexes::Indexes;

/// The matcher's single shared mutable object: an atomically swapped
/// pointer to the current compiled indexes.
pub struct SharedIndexes {
    inner: ArcSwap<Indexes>,
}

impl SharedIndexes {
    pub fn new(indexes: Indexes) -> Self {
        Self {
            inner: ArcSwap::from_pointee(indexes),
        }
    }

    /// Take a reference to the current indexes. Callers hold the `Arc`
    /// for the duration of one match and never re-load mid-operation.
    pub fn current(&self) -> Arc<Indexes> {
        self.inner.load_full()
    }

    pub fn replace(&self, indexes: Indexes) {
        self.inner.store(Arc::new(indexes));
    }

    pub fn version(&self) -> u64 {
        self.inner.load().version()
    }
}

/// Load and compile the current snapshot. Errors with
/// [`MatchError::NoSnapshot`] when the KV store has none: used at startup,
/// where running without rules is forbidden.
pub async fn load_indexes(kv: &KvStore) -> Result<Indexes, MatchError> {
    let (snapshot, version) = kv.load_snapshot().await?.ok_or(MatchError::NoSnapshot)?;
    let indexes = Indexes::build(&snapshot, version);
    if indexes.rule_count() == 0 {
        warn!(version, "snapshot contains no rules; nothing will match");
    }
    info!(version, rules = indexes.rule_count(), "rule indexes loaded");
    Ok(indexes)
}

/// Reload when the KV version is ahead of what we hold. Returns whether a
/// swap happened. A snapshot that disappeared mid-run is logged and kept:
/// the matcher continues on its last good indexes.
async fn reload_if_newer(kv: &KvStore, shared: &SharedIndexes) -> Result<bool, MatchError> {
    let current = shared.version();
    let latest = kv.version().await?;
    if latest <= current {
        return Ok(false);
    }

    match load_indexes(kv).await {
        Ok(indexes) => {
            let version = indexes.version();
            shared.replace(indexes);
            info!(from = current, to = version, "rule indexes reloaded");
            Ok(true)
        }
        Err(MatchError::NoSnapshot) => {
            warn!("snapshot vanished from kv store; keeping current indexes");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Periodic `rules:version` poll, the reload backstop.
pub async fn run_version_poller(
    kv: KvStore,
    shared: Arc<SharedIndexes>,
    interval: Duration,
    metrics: Arc<MetricsCollector>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match reload_if_newer(&kv, &shared).await {
                    Ok(true) => metrics.incr("snapshot_reloads"),
                    Ok(false) => {}
                    Err(e) => {
                        metrics.incr("snapshot_reload_failures");
                        error!(error = %e, "version poll reload failed");
                    }
                }
            }
        }
    }
}

/// Side consumer on `rule.changed`: any event triggers an immediate
/// reload attempt, shortening the visibility tail below the poll
/// interval. Offsets commit unconditionally; the poller is the backstop
/// if a reload attempt fails.
pub async fn run_rule_change_listener(
    consumer: BusConsumer,
    kv: KvStore,
    shared: Arc<SharedIndexes>,
    metrics: Arc<MetricsCollector>,
    cancel: CancellationToken,
) {
    loop {
        let msg = match consumer.recv(&cancel).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "rule.changed receive failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        match reload_if_newer(&kv, &shared).await {
            Ok(swapped) => {
                if swapped {
                    metrics.incr("snapshot_reloads");
                }
            }
            Err(e) => {
                metrics.incr("snapshot_reload_failures");
                error!(error = %e, "rule.changed triggered reload failed");
            }
        }

        if let Err(e) = consumer.commit(&msg) {
            error!(error = %e, "rule.changed offset commit failed");
        }
    }
}
