//! Outgoing email.
//!
//! Handlers talk to a `Mailer` trait object held in `AppState`. The server
//! uses SMTP when `[email]` is configured and otherwise only logs messages;
//! tests plug in the recording `MemoryMailer`.

pub mod email;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::config::EmailConfig;

pub use email::{render_otp_html, render_trip_invite_html, SmtpMailer};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// Mailer used when SMTP is disabled: records the message in the log
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<()> {
        tracing::info!(to = %to, subject = %subject, "Email delivery disabled, not sending");
        Ok(())
    }
}

/// A message captured by `MemoryMailer`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Keeps every message in memory; can be told to fail
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentEmail>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every delivery fails
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        if self.fail {
            anyhow::bail!("SMTP connection refused");
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                html: html.to_string(),
            });
        }
        Ok(())
    }
}

/// Pick the mailer for the configured delivery mode
pub fn build_mailer(config: &EmailConfig) -> Arc<dyn Mailer> {
    if config.is_configured() {
        tracing::info!(
            host = config.smtp_host.as_deref().unwrap_or_default(),
            port = config.smtp_port,
            "SMTP email delivery enabled"
        );
        Arc::new(SmtpMailer::new(config.clone()))
    } else {
        if config.enabled {
            tracing::warn!("Email is enabled but smtp_host or from_address is missing; logging mail instead");
        }
        Arc::new(LogMailer)
    }
}
