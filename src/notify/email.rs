//! Outbound email alerts
//!
//! Best-effort SMTP delivery over STARTTLS with a hard timeout. Every
//! failure path returns an error for the caller to downgrade into a
//! notification; nothing here ever propagates into the scan pipeline.

use anyhow::{anyhow, Context, Result};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{EmailSettings, SMTP_TIMEOUT};
use crate::models::Priority;

/// Subject prefix on every alert email
const SUBJECT_PREFIX: &str = "[Central Danone]";

pub struct EmailSender {
    settings: EmailSettings,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailSender {
    /// Build a sender when the configuration is complete; None otherwise.
    pub fn from_settings(settings: &EmailSettings) -> Option<Self> {
        if !settings.is_configured() {
            return None;
        }

        let credentials =
            Credentials::new(settings.username.clone(), settings.password.clone());

        let mailer = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(
            &settings.smtp_server,
        ) {
            Ok(builder) => builder
                .port(settings.smtp_port)
                .credentials(credentials)
                .build(),
            Err(e) => {
                tracing::warn!("SMTP relay setup failed: {}; email alerts disabled", e);
                return None;
            }
        };

        Some(Self {
            settings: settings.clone(),
            mailer,
        })
    }

    /// Send one alert email. Bounded by the SMTP timeout.
    pub async fn send_alert(
        &self,
        subject: &str,
        message: &str,
        priority: Priority,
    ) -> Result<()> {
        let body = format!(
            "{message}\n\nPriority: {priority}\nTime: {timestamp}\n\n--\nLANWATCH supervision core\nGenerated automatically\n",
            message = message,
            priority = priority.as_str().to_uppercase(),
            timestamp = chrono::Local::now().format("%d/%m/%Y %H:%M:%S"),
        );

        let email = Message::builder()
            .from(
                self.settings
                    .from_email
                    .parse()
                    .context("Invalid from address")?,
            )
            .to(self
                .settings
                .to_email
                .parse()
                .context("Invalid to address")?)
            .subject(format!("{} {}", SUBJECT_PREFIX, subject))
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .context("Failed to build email")?;

        let send = self.mailer.send(email);
        match tokio::time::timeout(SMTP_TIMEOUT, send).await {
            Ok(Ok(_)) => {
                tracing::debug!("Alert email sent to {}", self.settings.to_email);
                Ok(())
            }
            Ok(Err(e)) => Err(anyhow!("SMTP send failed: {}", e)),
            Err(_) => Err(anyhow!("SMTP send timed out after {:?}", SMTP_TIMEOUT)),
        }
    }
}
