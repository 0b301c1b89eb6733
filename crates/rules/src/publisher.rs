//! Durable-write-then-emit for rule mutations.

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use alertflow_bus::{BusError, BusProducer};
use alertflow_core::events::{RuleChangeAction, RuleChanged, EVENT_SCHEMA_VERSION};
use alertflow_core::Rule;
use alertflow_store::{RuleRepo, StoreError};

use crate::validate::{validate_criteria, ValidationError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("rule change emission failed: {0}")]
    Bus(#[from] BusError),
}

/// Admin-facing request to create a rule.
#[derive(Debug, Clone)]
pub struct NewRule {
    pub client_id: String,
    pub severity: String,
    pub source: String,
    pub name: String,
    pub enabled: bool,
}

/// Publishes rule mutations: store write first, `rule.changed` emit second,
/// both on the caller's request path.
///
/// When the emit fails after a committed write, the call fails and the
/// admin caller retries; the snapshot builder fetches the rule's current
/// state on every event, so a later emit for the same rule reconciles.
pub struct RulePublisher {
    rules: RuleRepo,
    producer: BusProducer,
    topic: String,
}

impl RulePublisher {
    pub fn new(rules: RuleRepo, producer: BusProducer, topic: String) -> Self {
        Self {
            rules,
            producer,
            topic,
        }
    }

    pub async fn create_rule(&self, req: NewRule) -> Result<Rule, PublishError> {
        validate_criteria(&req.severity, &req.source, &req.name)?;

        let now = Utc::now();
        let rule = Rule {
            rule_id: Uuid::new_v4(),
            client_id: req.client_id,
            severity: req.severity,
            source: req.source,
            name: req.name,
            enabled: req.enabled,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.rules.insert(&rule).await?;
        self.emit(RuleChangeAction::Created, &rule).await?;
        tracing::info!(rule_id = %rule.rule_id, client_id = %rule.client_id, "rule created");
        Ok(rule)
    }

    pub async fn update_rule(
        &self,
        rule_id: Uuid,
        severity: &str,
        source: &str,
        name: &str,
    ) -> Result<Rule, PublishError> {
        validate_criteria(severity, source, name)?;

        let rule = self
            .rules
            .update_criteria(rule_id, severity, source, name)
            .await?;
        self.emit(RuleChangeAction::Updated, &rule).await?;
        tracing::info!(rule_id = %rule.rule_id, version = rule.version, "rule updated");
        Ok(rule)
    }

    /// Enable or disable a rule. Enabling emits `UPDATED` (the builder
    /// fetches and indexes the rule); disabling emits `DISABLED`.
    pub async fn set_enabled(&self, rule_id: Uuid, enabled: bool) -> Result<Rule, PublishError> {
        let rule = self.rules.set_enabled(rule_id, enabled).await?;
        let action = if enabled {
            RuleChangeAction::Updated
        } else {
            RuleChangeAction::Disabled
        };
        self.emit(action, &rule).await?;
        tracing::info!(rule_id = %rule.rule_id, enabled, "rule enabled flag changed");
        Ok(rule)
    }

    pub async fn delete_rule(&self, rule_id: Uuid) -> Result<Rule, PublishError> {
        let rule = self.rules.delete(rule_id).await?;
        self.emit(RuleChangeAction::Deleted, &rule).await?;
        tracing::info!(rule_id = %rule.rule_id, "rule deleted");
        Ok(rule)
    }

    async fn emit(&self, action: RuleChangeAction, rule: &Rule) -> Result<(), BusError> {
        let event = change_event(action, rule);
        self.producer
            .send_json(&self.topic, &event.rule_id.to_string(), &event)
            .await
    }
}

fn change_event(action: RuleChangeAction, rule: &Rule) -> RuleChanged {
    RuleChanged {
        rule_id: rule.rule_id,
        client_id: rule.client_id.clone(),
        action,
        version: rule.version,
        updated_at: rule.updated_at,
        schema_version: EVENT_SCHEMA_VERSION,
    }
}
