//! Channel trait definition and shared error types.

use alertflow_core::{EndpointKind, Notification};

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("email provider error: {0}")]
    Provider(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("delivery timed out after {0}s")]
    Timeout(u64),
}

/// A delivery channel implementation.
///
/// `endpoint_value` is the channel-specific address from the endpoint row:
/// comma-separated recipients for email, a webhook URL otherwise. The
/// notification carries everything the payload needs.
#[async_trait::async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, endpoint_value: &str, notification: &Notification)
        -> Result<(), NotifyError>;

    /// The endpoint kind this channel serves; dispatch is keyed on it.
    fn kind(&self) -> EndpointKind;
}
