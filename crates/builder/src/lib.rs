//! Snapshot builder: the single writer of the rule snapshot.
//!
//! Consumes `rule.changed`, resolves each event against the rule store,
//! applies an incremental patch to the KV snapshot, and bumps the version
//! atomically with the write. Offsets commit only after a successful
//! store, so failed events are redelivered.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use alertflow_core::events::{RuleChangeAction, RuleChanged};
use alertflow_core::{MetricsCollector, Rule, Snapshot};
use alertflow_kv::{KvError, KvStore};
use alertflow_store::{RuleRepo, StoreError};

/// Bounded retries for the snapshot compare-and-swap. The builder is the
/// single writer, so contention indicates manual writes; give up loudly
/// rather than spin.
const CAS_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Kv(#[from] KvError),

    /// A CREATED/UPDATED event whose rule is gone from the store. The
    /// event stays uncommitted and is redelivered; persistent occurrences
    /// need operator attention.
    #[error("rule {0} referenced by change event does not exist")]
    MissingRule(Uuid),
}

/// The snapshot mutation an event resolves to once the store was consulted.
#[derive(Debug)]
pub enum SnapshotChange {
    Upsert(Rule),
    Remove(Uuid),
}

/// Apply a resolved change to an in-memory snapshot. Disabled rules and
/// removals of unknown rules are handled inside the snapshot ops, so
/// redelivered events are no-ops here.
pub fn apply_change(snapshot: &mut Snapshot, change: &SnapshotChange) {
    match change {
        SnapshotChange::Upsert(rule) => snapshot.apply_upsert(rule),
        SnapshotChange::Remove(rule_id) => {
            snapshot.apply_remove(*rule_id);
        }
    }
}

pub struct SnapshotBuilder {
    rules: RuleRepo,
    kv: KvStore,
    metrics: Arc<MetricsCollector>,
}

impl SnapshotBuilder {
    pub fn new(rules: RuleRepo, kv: KvStore, metrics: Arc<MetricsCollector>) -> Self {
        Self { rules, kv, metrics }
    }

    /// Process one `rule.changed` event end to end: resolve the desired
    /// state, patch the snapshot, and swap it in atomically.
    pub async fn handle_event(&self, event: &RuleChanged) -> Result<(), BuildError> {
        let change = self.resolve(event).await?;

        for attempt in 1..=CAS_ATTEMPTS {
            let (mut snapshot, version) = self
                .kv
                .load_snapshot()
                .await?
                .unwrap_or_else(|| (Snapshot::new(), 0));

            apply_change(&mut snapshot, &change);

            if self
                .kv
                .store_snapshot_if_version(&snapshot, version)
                .await?
            {
                tracing::info!(
                    rule_id = %event.rule_id,
                    action = ?event.action,
                    rules_indexed = snapshot.len(),
                    new_version = version + 1,
                    "snapshot patched"
                );
                return Ok(());
            }

            self.metrics.incr("snapshot_cas_retries");
            tracing::warn!(attempt, "snapshot version moved underneath us, retrying");
        }

        Err(BuildError::Kv(KvError::CasExhausted {
            attempts: CAS_ATTEMPTS,
        }))
    }

    async fn resolve(&self, event: &RuleChanged) -> Result<SnapshotChange, BuildError> {
        match event.action {
            RuleChangeAction::Created | RuleChangeAction::Updated => {
                match self.rules.fetch(event.rule_id).await? {
                    Some(rule) => Ok(SnapshotChange::Upsert(rule)),
                    None => Err(BuildError::MissingRule(event.rule_id)),
                }
            }
            RuleChangeAction::Deleted | RuleChangeAction::Disabled => {
                Ok(SnapshotChange::Remove(event.rule_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(id: Uuid, enabled: bool) -> Rule {
        Rule {
            rule_id: id,
            client_id: "client-1".to_string(),
            severity: "HIGH".to_string(),
            source: "api".to_string(),
            name: "timeout".to_string(),
            enabled,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_then_remove_roundtrips_to_empty() {
        let id = Uuid::new_v4();
        let mut snapshot = Snapshot::new();
        apply_change(&mut snapshot, &SnapshotChange::Upsert(rule(id, true)));
        assert_eq!(snapshot.len(), 1);
        apply_change(&mut snapshot, &SnapshotChange::Remove(id));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn redelivered_remove_is_noop() {
        let id = Uuid::new_v4();
        let mut snapshot = Snapshot::new();
        apply_change(&mut snapshot, &SnapshotChange::Remove(id));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn upsert_of_disabled_rule_removes_it() {
        let id = Uuid::new_v4();
        let mut snapshot = Snapshot::new();
        apply_change(&mut snapshot, &SnapshotChange::Upsert(rule(id, true)));
        // The store now says the rule is disabled: an UPDATED event
        // resolves to an upsert of the disabled state.
        apply_change(&mut snapshot, &SnapshotChange::Upsert(rule(id, false)));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn repeated_upsert_is_idempotent() {
        let id = Uuid::new_v4();
        let mut snapshot = Snapshot::new();
        apply_change(&mut snapshot, &SnapshotChange::Upsert(rule(id, true)));
        let first = snapshot.clone();
        apply_change(&mut snapshot, &SnapshotChange::Upsert(rule(id, true)));
        assert_eq!(snapshot, first);
    }
}
