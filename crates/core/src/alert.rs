//! Alert event type and severity levels.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Wire representation (`"LOW"`, `"MEDIUM"`, `"HIGH"`, `"CRITICAL"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// An externally produced alert event, immutable once ingested.
///
/// Alerts are ephemeral: produced onto `alerts.new`, evaluated by the
/// matcher, and forgotten. Durable state starts at the notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Externally assigned unique identifier.
    pub alert_id: Uuid,
    /// Payload schema version.
    pub schema_version: u32,
    /// Event time as epoch seconds.
    pub event_ts: i64,
    pub severity: Severity,
    pub source: String,
    pub name: String,
    /// Free-form string-to-string context attached by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, String>>,
}

impl Alert {
    /// Check required fields. Alerts failing validation are persistent
    /// data errors: they can never match and are not retried into shape.
    pub fn validate(&self) -> Result<(), String> {
        if self.alert_id.is_nil() {
            return Err("alert_id must not be nil".to_string());
        }
        if self.source.is_empty() {
            return Err("source must not be empty".to_string());
        }
        if self.name.is_empty() {
            return Err("name must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_alert() -> Alert {
        Alert {
            alert_id: Uuid::new_v4(),
            schema_version: 1,
            event_ts: 1_700_000_000,
            severity: Severity::High,
            source: "api".to_string(),
            name: "timeout".to_string(),
            context: None,
        }
    }

    #[test]
    fn severity_roundtrip() {
        for s in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            let parsed: Severity = s.as_str().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }

    #[test]
    fn severity_serde_uppercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        let back: Severity = serde_json::from_str("\"LOW\"").unwrap();
        assert_eq!(back, Severity::Low);
    }

    #[test]
    fn severity_rejects_unknown() {
        assert!("URGENT".parse::<Severity>().is_err());
        assert!(serde_json::from_str::<Severity>("\"urgent\"").is_err());
    }

    #[test]
    fn alert_json_roundtrip() {
        let mut alert = sample_alert();
        alert.context = Some(HashMap::from([(
            "region".to_string(),
            "eu-west-1".to_string(),
        )]));
        let json = serde_json::to_string(&alert).unwrap();
        let back: Alert = serde_json::from_str(&json).unwrap();
        assert_eq!(back.alert_id, alert.alert_id);
        assert_eq!(back.severity, Severity::High);
        assert_eq!(back.context.unwrap()["region"], "eu-west-1");
    }

    #[test]
    fn alert_context_defaults_to_none() {
        let json = r#"{
            "alert_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "schema_version": 1,
            "event_ts": 1700000000,
            "severity": "LOW",
            "source": "api",
            "name": "timeout"
        }"#;
        let alert: Alert = serde_json::from_str(json).unwrap();
        assert!(alert.context.is_none());
    }

    #[test]
    fn validate_accepts_complete_alert() {
        assert!(sample_alert().validate().is_ok());
    }

    #[test]
    fn validate_rejects_nil_id_and_empty_fields() {
        let mut a = sample_alert();
        a.alert_id = Uuid::nil();
        assert!(a.validate().is_err());

        let mut a = sample_alert();
        a.source.clear();
        assert!(a.validate().is_err());

        let mut a = sample_alert();
        a.name.clear();
        assert!(a.validate().is_err());
    }
}
