//! Delivery endpoints bound to rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channel discriminator. Dispatch is data-driven on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Email,
    Slack,
    Webhook,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Email => "email",
            EndpointKind::Slack => "slack",
            EndpointKind::Webhook => "webhook",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(EndpointKind::Email),
            "slack" => Ok(EndpointKind::Slack),
            "webhook" => Ok(EndpointKind::Webhook),
            other => Err(format!("unknown endpoint kind: {other}")),
        }
    }
}

/// A delivery destination attached to a rule.
///
/// `value` is channel-specific: comma-separated recipient addresses for
/// email, a webhook URL for slack and webhook endpoints.
/// `(rule_id, kind, value)` is unique in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub endpoint_id: Uuid,
    pub rule_id: Uuid,
    pub kind: EndpointKind,
    pub value: String,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrip() {
        for kind in [EndpointKind::Email, EndpointKind::Slack, EndpointKind::Webhook] {
            assert_eq!(kind.as_str().parse::<EndpointKind>().unwrap(), kind);
        }
    }

    #[test]
    fn kind_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&EndpointKind::Slack).unwrap(),
            "\"slack\""
        );
        let back: EndpointKind = serde_json::from_str("\"email\"").unwrap();
        assert_eq!(back, EndpointKind::Email);
    }

    #[test]
    fn kind_rejects_unknown() {
        assert!("sms".parse::<EndpointKind>().is_err());
    }
}
