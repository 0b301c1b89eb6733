//! Durable notification records.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a notification. Transitions only move forward:
/// `RECEIVED` to `SENT`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationStatus {
    Received,
    Sent,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Received => "RECEIVED",
            NotificationStatus::Sent => "SENT",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIVED" => Ok(NotificationStatus::Received),
            "SENT" => Ok(NotificationStatus::Sent),
            other => Err(format!("unknown notification status: {other}")),
        }
    }
}

/// A durable record that a specific alert matched one or more rules for a
/// specific tenant. `(client_id, alert_id)` is unique: redelivered matches
/// collapse onto the existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: Uuid,
    pub client_id: String,
    pub alert_id: Uuid,
    pub severity: String,
    pub source: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, String>>,
    /// All rules that matched for this tenant and alert.
    pub rule_ids: Vec<Uuid>,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        assert_eq!(
            "RECEIVED".parse::<NotificationStatus>().unwrap(),
            NotificationStatus::Received
        );
        assert_eq!(
            "SENT".parse::<NotificationStatus>().unwrap(),
            NotificationStatus::Sent
        );
        assert!("PENDING".parse::<NotificationStatus>().is_err());
    }

    #[test]
    fn status_serde_uppercase() {
        assert_eq!(
            serde_json::to_string(&NotificationStatus::Sent).unwrap(),
            "\"SENT\""
        );
    }
}
