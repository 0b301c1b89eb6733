//! SMTP provider via `lettre`.

use std::time::Duration;

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::Mutex;

use alertflow_core::config::SmtpConfig;

use crate::email::EmailProvider;
use crate::traits::NotifyError;

const SEND_TIMEOUT_SECS: u64 = 10;

/// SMTP backend with a persistent transport.
///
/// The transport is built lazily and reused across sends behind a mutex;
/// a failed or timed-out send drops it so the next send reconnects. Port
/// 465 uses implicit TLS, everything else STARTTLS.
pub struct SmtpProvider {
    config: SmtpConfig,
    transport: Mutex<Option<AsyncSmtpTransport<Tokio1Executor>>>,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            transport: Mutex::new(None),
        }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let host = self
            .config
            .host
            .as_deref()
            .ok_or_else(|| NotifyError::Config("SMTP_HOST is not set".to_string()))?;

        let mut builder = if self.config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
        }
        .port(self.config.port);

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    fn build_message(&self, to: &[String], subject: &str, body: &str) -> Result<Message, NotifyError> {
        let from: Mailbox = self
            .config
            .from
            .as_deref()
            .ok_or_else(|| NotifyError::Config("SMTP_FROM is not set".to_string()))?
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let mut builder = Message::builder().from(from);
        for recipient in to {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|e: lettre::address::AddressError| NotifyError::Smtp(e.to_string()))?;
            builder = builder.to(mailbox);
        }

        builder
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<(), NotifyError> {
        let email = self.build_message(to, subject, body)?;

        let mut guard = self.transport.lock().await;
        if guard.is_none() {
            *guard = Some(self.build_transport()?);
        }
        let Some(transport) = guard.as_ref() else {
            return Err(NotifyError::Smtp("transport unavailable".to_string()));
        };

        let outcome =
            tokio::time::timeout(Duration::from_secs(SEND_TIMEOUT_SECS), transport.send(email))
                .await;

        match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                // Drop the connection so the next send reconnects.
                *guard = None;
                Err(NotifyError::Smtp(e.to_string()))
            }
            Err(_) => {
                *guard = None;
                Err(NotifyError::Timeout(SEND_TIMEOUT_SECS))
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: Option<&str>, port: u16, from: Option<&str>) -> SmtpConfig {
        SmtpConfig {
            host: host.map(ToString::to_string),
            port,
            username: None,
            password: None,
            from: from.map(ToString::to_string),
        }
    }

    #[test]
    fn configured_needs_host_and_from() {
        assert!(SmtpProvider::new(config(Some("smtp.corp.io"), 587, Some("a@corp.io")))
            .is_configured());
        assert!(!SmtpProvider::new(config(None, 587, Some("a@corp.io"))).is_configured());
        assert!(!SmtpProvider::new(config(Some("smtp.corp.io"), 587, None)).is_configured());
    }

    #[test]
    fn build_transport_on_starttls_port() {
        let provider = SmtpProvider::new(config(Some("smtp.corp.io"), 587, Some("a@corp.io")));
        assert!(provider.build_transport().is_ok());
    }

    #[test]
    fn build_transport_on_implicit_tls_port() {
        let provider = SmtpProvider::new(config(Some("smtp.corp.io"), 465, Some("a@corp.io")));
        assert!(provider.build_transport().is_ok());
    }

    #[test]
    fn build_transport_without_host_fails() {
        let provider = SmtpProvider::new(config(None, 587, Some("a@corp.io")));
        let err = provider.build_transport().unwrap_err();
        assert!(err.to_string().contains("SMTP_HOST"));
    }

    #[test]
    fn build_message_sets_recipients() {
        let provider = SmtpProvider::new(config(Some("smtp.corp.io"), 587, Some("a@corp.io")));
        let message = provider.build_message(
            &["ops@corp.io".to_string(), "sre@corp.io".to_string()],
            "Alert: HIGH - timeout",
            "body",
        );
        assert!(message.is_ok());
    }

    #[test]
    fn build_message_without_from_fails() {
        let provider = SmtpProvider::new(config(Some("smtp.corp.io"), 587, None));
        let err = provider
            .build_message(&["ops@corp.io".to_string()], "s", "b")
            .unwrap_err();
        assert!(err.to_string().contains("SMTP_FROM"));
    }
}
