//! AWS SES provider.

use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};

use crate::email::EmailProvider;
use crate::traits::NotifyError;

/// Sends through AWS SES v2. Credentials and region come from the
/// standard AWS environment chain; the provider only needs a verified
/// sender address to count as configured.
pub struct SesProvider {
    client: Option<aws_sdk_sesv2::Client>,
    from: Option<String>,
}

impl SesProvider {
    /// Build the SDK client when a sender address is present; otherwise
    /// stay unconfigured without touching the AWS environment.
    pub async fn from_env(from: Option<String>) -> Self {
        let client = if from.is_some() {
            let config = aws_config::load_from_env().await;
            Some(aws_sdk_sesv2::Client::new(&config))
        } else {
            None
        };
        Self { client, from }
    }
}

#[async_trait::async_trait]
impl EmailProvider for SesProvider {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<(), NotifyError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| NotifyError::Config("SES is not configured".to_string()))?;
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| NotifyError::Config("SES_FROM is not set".to_string()))?;

        let destination = Destination::builder()
            .set_to_addresses(Some(to.to_vec()))
            .build();

        let subject_content = Content::builder()
            .data(subject)
            .charset("UTF-8")
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;
        let body_content = Content::builder()
            .data(body)
            .charset("UTF-8")
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;

        let message = Message::builder()
            .subject(subject_content)
            .body(Body::builder().text(body_content).build())
            .build();

        client
            .send_email()
            .from_email_address(from)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| NotifyError::Provider(format!("ses send failed: {e}")))?;

        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.from.is_some()
    }

    fn name(&self) -> &'static str {
        "ses"
    }
}
