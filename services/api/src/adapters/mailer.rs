//! services/api/src/adapters/mailer.rs
//!
//! This module contains the SMTP adapter, which is the concrete
//! implementation of the `MailTransport` port from the `core` crate.
//! One delivery attempt per call; the session decides what a failure means.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::{ConfigError, SmtpConfig};
use solaudit_core::ports::{MailTransport, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `MailTransport` over an SMTP relay with
/// STARTTLS on the submission port.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the relay transport from the loaded SMTP settings.
    pub fn new(smtp: &SmtpConfig) -> Result<Self, ConfigError> {
        let from = smtp.from.parse::<Mailbox>().map_err(|e| {
            ConfigError::InvalidValue("SMTP_FROM".to_string(), e.to_string())
        })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| ConfigError::InvalidValue("SMTP_HOST".to_string(), e.to_string()))?
            .port(smtp.port)
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ))
            .timeout(Some(smtp.send_timeout))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    /// Hands the whole report body to the relay as one plain-text
    /// message; there is no partial delivery.
    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> PortResult<()> {
        let to = recipient.parse::<Mailbox>().map_err(|e| {
            PortError::Unexpected(format!("invalid recipient address '{}': {}", recipient, e))
        })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| PortError::Unexpected(format!("could not build message: {}", e)))?;

        self.transport.send(message).await.map_err(|e| {
            if e.is_timeout() {
                PortError::Timeout(e.to_string())
            } else {
                PortError::Unexpected(format!("smtp delivery failed: {}", e))
            }
        })?;

        Ok(())
    }
}

//=========================================================================================
// Disabled Transport
//=========================================================================================

/// Stands in for the mailer when the environment has no SMTP settings.
/// Every delivery fails with an explanation instead of hanging or
/// silently dropping the report.
pub struct DisabledMailer;

#[async_trait]
impl MailTransport for DisabledMailer {
    async fn deliver(&self, _recipient: &str, _subject: &str, _body: &str) -> PortResult<()> {
        Err(PortError::Configuration(
            "SMTP settings missing. Check .env (SMTP_HOST/PORT/USER/PASS).".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn disabled_mailer_reports_missing_settings() {
        let err = DisabledMailer
            .deliver("dev@example.com", "subject", "body")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Configuration(_)));
        assert!(err.to_string().contains("SMTP settings missing"));
    }

    #[tokio::test]
    async fn bad_recipient_addresses_fail_before_any_network_call() {
        let smtp = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "auditor".to_string(),
            password: "secret".to_string(),
            from: "auditor@example.com".to_string(),
            send_timeout: Duration::from_secs(5),
        };
        let mailer = SmtpMailer::new(&smtp).unwrap();

        let err = mailer
            .deliver("not-an-address", "subject", "body")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid recipient address"));
    }

    #[test]
    fn bad_from_address_is_a_configuration_error() {
        let smtp = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "auditor".to_string(),
            password: "secret".to_string(),
            from: "<<broken".to_string(),
            send_timeout: Duration::from_secs(5),
        };
        assert!(SmtpMailer::new(&smtp).is_err());
    }
}
