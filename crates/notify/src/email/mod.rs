//! Email delivery through a pluggable provider registry.
//!
//! Providers (Resend, SES, SMTP) share one trait; the channel picks the
//! explicitly selected provider when it is configured, otherwise falls
//! through the auto-detect order. All sends pass the channel-wide token
//! bucket.

pub mod resend;
pub mod ses;
pub mod smtp;

use alertflow_core::config::EmailConfig;
use alertflow_core::{EndpointKind, Notification};

use crate::ratelimit::TokenBucket;
use crate::traits::{Channel, NotifyError};

pub use resend::ResendProvider;
pub use ses::SesProvider;
pub use smtp::SmtpProvider;

/// Domains whose recipients are silently dropped: fixtures and local
/// setups must never produce outbound mail.
pub const TEST_DOMAINS: &[&str] = &["example.com", "test.com", "localhost"];

/// A concrete email backend.
#[async_trait::async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<(), NotifyError>;

    /// Whether this provider has the configuration it needs to send.
    fn is_configured(&self) -> bool;

    /// Selector name (`"smtp"`, `"resend"`, `"ses"`).
    fn name(&self) -> &'static str;
}

/// Split a comma-separated recipient list, dropping entries without `@`
/// and entries on a test domain.
pub fn parse_recipients(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .filter(|addr| {
            let Some((_, domain)) = addr.rsplit_once('@') else {
                tracing::warn!(addr, "recipient without '@' skipped");
                return false;
            };
            if TEST_DOMAINS.contains(&domain.to_ascii_lowercase().as_str()) {
                tracing::debug!(addr, "test-domain recipient skipped");
                return false;
            }
            true
        })
        .map(ToString::to_string)
        .collect()
}

pub fn render_subject(notification: &Notification) -> String {
    format!(
        "Alert: {} - {}",
        notification.severity, notification.name
    )
}

/// Plain-text body with labelled fields.
pub fn render_body(notification: &Notification) -> String {
    let rule_ids = notification
        .rule_ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let mut body = format!(
        "Severity: {}\nSource: {}\nName: {}\nAlert ID: {}\nClient ID: {}\nNotification ID: {}\nMatched rules: {}\n",
        notification.severity,
        notification.source,
        notification.name,
        notification.alert_id,
        notification.client_id,
        notification.notification_id,
        rule_ids,
    );

    if let Some(context) = &notification.context {
        body.push_str("\nContext:\n");
        let mut pairs: Vec<_> = context.iter().collect();
        pairs.sort();
        for (key, value) in pairs {
            body.push_str(&format!("  {key}: {value}\n"));
        }
    }

    body
}

/// Pick the provider to send with. An explicit selection wins when it is
/// configured; an unconfigured or unknown selection logs a warning and
/// falls back to the first configured provider in registry order.
pub fn select_provider<'a>(
    providers: &'a [Box<dyn EmailProvider>],
    requested: Option<&str>,
) -> Option<&'a dyn EmailProvider> {
    if let Some(name) = requested {
        match providers.iter().find(|p| p.name() == name) {
            Some(p) if p.is_configured() => return Some(p.as_ref()),
            Some(_) => {
                tracing::warn!(provider = name, "selected email provider is not configured, falling back");
            }
            None => {
                tracing::warn!(provider = name, "unknown email provider, falling back");
            }
        }
    }
    providers
        .iter()
        .find(|p| p.is_configured())
        .map(|p| p.as_ref())
}

/// The email channel: recipient filtering, rate limiting, and provider
/// dispatch. An unconfigured registry fails each send without taking the
/// service down.
pub struct EmailChannel {
    providers: Vec<Box<dyn EmailProvider>>,
    requested: Option<String>,
    bucket: TokenBucket,
}

impl EmailChannel {
    pub fn new(
        providers: Vec<Box<dyn EmailProvider>>,
        requested: Option<String>,
        rate_limit_per_sec: u32,
    ) -> Self {
        Self {
            providers,
            requested,
            bucket: TokenBucket::new(rate_limit_per_sec),
        }
    }

    /// Build the channel with the real provider registry in auto-detect
    /// order: resend, ses, smtp.
    pub async fn from_config(config: &EmailConfig) -> Self {
        let providers: Vec<Box<dyn EmailProvider>> = vec![
            Box::new(ResendProvider::new(
                config.resend_api_key.clone(),
                config.resend_from.clone(),
            )),
            Box::new(SesProvider::from_env(config.ses_from.clone()).await),
            Box::new(SmtpProvider::new(config.smtp.clone())),
        ];

        let channel = Self::new(providers, config.provider.clone(), config.rate_limit_per_sec);
        match select_provider(&channel.providers, channel.requested.as_deref()) {
            Some(provider) => {
                tracing::info!(provider = provider.name(), "email provider selected");
            }
            None => {
                tracing::warn!(
                    "no email provider configured; email dispatches will fail per-notification"
                );
            }
        }
        channel
    }
}

#[async_trait::async_trait]
impl Channel for EmailChannel {
    async fn send(
        &self,
        endpoint_value: &str,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let recipients = parse_recipients(endpoint_value);
        if recipients.is_empty() {
            tracing::debug!(
                notification_id = %notification.notification_id,
                "no deliverable recipients, email skipped"
            );
            return Ok(());
        }

        let Some(provider) = select_provider(&self.providers, self.requested.as_deref()) else {
            return Err(NotifyError::Config(
                "no email provider configured".to_string(),
            ));
        };

        self.bucket.acquire().await;
        provider
            .send(
                &recipients,
                &render_subject(notification),
                &render_body(notification),
            )
            .await?;

        tracing::info!(
            notification_id = %notification.notification_id,
            provider = provider.name(),
            recipients = recipients.len(),
            "email notification delivered"
        );
        Ok(())
    }

    fn kind(&self) -> EndpointKind {
        EndpointKind::Email
    }
}
