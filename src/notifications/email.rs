//! SMTP delivery and the HTML bodies of the emails Tripmate sends.

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::Mailer;
use crate::config::EmailConfig;

/// Sends mail through the SMTP relay from the `[email]` section
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;

        let builder = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            builder
        };

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to_mailbox: Mailbox = to.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;

        self.transport()?.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Invitation to co-plan a trip
pub fn render_trip_invite_html(
    inviter_name: &str,
    trip_name: &str,
    destination: &str,
    invites_url: &str,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Trip Invitation</title>
</head>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f5f5f5; margin: 0; padding: 0;">
    <div style="max-width: 560px; margin: 0 auto; padding: 40px 20px;">
        <div style="background-color: #ffffff; border-radius: 8px; overflow: hidden;">
            <div style="background-color: #0f766e; color: #ffffff; padding: 28px 24px; text-align: center;">
                <h1 style="margin: 0; font-size: 22px;">You're invited on a trip</h1>
            </div>
            <div style="padding: 28px 24px; color: #374151; line-height: 1.6;">
                <p><strong>{inviter_name}</strong> invited you to plan <strong>{trip_name}</strong> together.</p>
                <p>Destination: <strong>{destination}</strong></p>
                <p style="text-align: center; margin: 28px 0;">
                    <a href="{invites_url}" style="background-color: #0f766e; color: #ffffff; text-decoration: none; padding: 12px 28px; border-radius: 6px;">View invitation</a>
                </p>
                <p style="color: #6b7280; font-size: 13px;">If you weren't expecting this, you can ignore this email.</p>
            </div>
        </div>
    </div>
</body>
</html>"#,
        inviter_name = html_escape(inviter_name),
        trip_name = html_escape(trip_name),
        destination = html_escape(destination),
        invites_url = html_escape(invites_url),
    )
}

/// Password reset code
pub fn render_otp_html(code: &str, ttl_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Password Reset</title>
</head>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f5f5f5; margin: 0; padding: 0;">
    <div style="max-width: 560px; margin: 0 auto; padding: 40px 20px;">
        <div style="background-color: #ffffff; border-radius: 8px; padding: 28px 24px; color: #374151;">
            <h1 style="margin-top: 0; font-size: 22px;">Reset your password</h1>
            <p>Use this code to reset your Tripmate password:</p>
            <p style="font-size: 32px; letter-spacing: 8px; font-weight: 600; text-align: center;">{code}</p>
            <p style="color: #6b7280; font-size: 13px;">The code expires in {ttl_minutes} minutes. If you didn't ask for a reset, ignore this email.</p>
        </div>
    </div>
</body>
</html>"#,
        code = html_escape(code),
        ttl_minutes = ttl_minutes,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
