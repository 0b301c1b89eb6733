//! Bus event payloads for the four topics.
//!
//! `alerts.new` carries [`crate::Alert`] directly; the other topics carry
//! the types here. All events serialize as JSON.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::{Alert, Severity};

/// Version stamped on control-plane events.
pub const EVENT_SCHEMA_VERSION: u32 = 1;

/// What happened to a rule. `CREATED`/`UPDATED` require a store fetch to
/// learn the new criteria; `DELETED`/`DISABLED` only need the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleChangeAction {
    Created,
    Updated,
    Deleted,
    Disabled,
}

/// Control-plane event on `rule.changed`, keyed by `rule_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleChanged {
    pub rule_id: Uuid,
    pub client_id: String,
    pub action: RuleChangeAction,
    /// The rule's version after the mutation.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u32,
}

/// Data-plane event on `alerts.matched`, keyed by `client_id`: the full
/// alert payload plus the tenant and every rule that matched for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMatched {
    pub alert_id: Uuid,
    pub schema_version: u32,
    pub event_ts: i64,
    pub severity: Severity,
    pub source: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, String>>,
    pub client_id: String,
    pub rule_ids: Vec<Uuid>,
}

impl AlertMatched {
    pub fn from_alert(alert: &Alert, client_id: String, rule_ids: Vec<Uuid>) -> Self {
        Self {
            alert_id: alert.alert_id,
            schema_version: alert.schema_version,
            event_ts: alert.event_ts,
            severity: alert.severity,
            source: alert.source.clone(),
            name: alert.name.clone(),
            context: alert.context.clone(),
            client_id,
            rule_ids,
        }
    }
}

/// Data-plane event on `notifications.ready`, keyed by `client_id`.
/// Alert fields are denormalised so downstream consumers can log and route
/// without a store read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationReady {
    pub notification_id: Uuid,
    pub client_id: String,
    pub alert_id: Uuid,
    pub severity: Severity,
    pub source: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_change_action_serde_uppercase() {
        assert_eq!(
            serde_json::to_string(&RuleChangeAction::Disabled).unwrap(),
            "\"DISABLED\""
        );
        let back: RuleChangeAction = serde_json::from_str("\"CREATED\"").unwrap();
        assert_eq!(back, RuleChangeAction::Created);
    }

    #[test]
    fn alert_matched_copies_alert_fields() {
        let alert = Alert {
            alert_id: Uuid::new_v4(),
            schema_version: 1,
            event_ts: 1_700_000_000,
            severity: Severity::Critical,
            source: "db".to_string(),
            name: "replication-lag".to_string(),
            context: Some(HashMap::from([(
                "shard".to_string(),
                "7".to_string(),
            )])),
        };
        let rule_ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let matched =
            AlertMatched::from_alert(&alert, "client-9".to_string(), rule_ids.clone());
        assert_eq!(matched.alert_id, alert.alert_id);
        assert_eq!(matched.severity, Severity::Critical);
        assert_eq!(matched.client_id, "client-9");
        assert_eq!(matched.rule_ids, rule_ids);
        assert_eq!(matched.context.as_ref().unwrap()["shard"], "7");
    }

    #[test]
    fn rule_changed_json_roundtrip() {
        let event = RuleChanged {
            rule_id: Uuid::new_v4(),
            client_id: "client-1".to_string(),
            action: RuleChangeAction::Updated,
            version: 3,
            updated_at: Utc::now(),
            schema_version: EVENT_SCHEMA_VERSION,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: RuleChanged = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rule_id, event.rule_id);
        assert_eq!(back.action, RuleChangeAction::Updated);
        assert_eq!(back.version, 3);
    }
}
