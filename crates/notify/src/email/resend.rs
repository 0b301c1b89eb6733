//! Resend API provider.

use std::time::Duration;

use crate::email::EmailProvider;
use crate::traits::NotifyError;

const RESEND_URL: &str = "https://api.resend.com/emails";
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Sends through the Resend HTTP API.
pub struct ResendProvider {
    api_key: Option<String>,
    from: Option<String>,
    client: reqwest::Client,
}

impl ResendProvider {
    pub fn new(api_key: Option<String>, from: Option<String>) -> Self {
        Self {
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl EmailProvider for ResendProvider {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<(), NotifyError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| NotifyError::Config("RESEND_API_KEY is not set".to_string()))?;
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| NotifyError::Config("RESEND_FROM is not set".to_string()))?;

        let payload = serde_json::json!({
            "from": from,
            "to": to,
            "subject": subject,
            "text": body,
        });

        let response = self
            .client
            .post(RESEND_URL)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.from.is_some()
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}
