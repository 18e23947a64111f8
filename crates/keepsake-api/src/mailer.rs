//! Best-effort outbound mail over an HTTP mail API.
//!
//! The configuration is an injectable object reconfigured through an
//! explicit method, not module-level mutable state. Every caller treats
//! delivery as fire-and-forget: failures are logged and never fail the
//! triggering operation.

use std::sync::{Arc, RwLock};

use anyhow::{Result, anyhow};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

#[derive(Clone)]
pub struct Mailer {
    config: Arc<RwLock<Option<MailConfig>>>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    html_content: String,
}

impl Mailer {
    pub fn new(config: Option<MailConfig>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            client: reqwest::Client::new(),
        }
    }

    /// A mailer that drops everything; used in tests and unconfigured
    /// deployments.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_configured(&self) -> bool {
        self.config.read().is_ok_and(|c| c.is_some())
    }

    /// Swap the outbound-mail settings at runtime (admin settings).
    pub fn reconfigure(&self, config: Option<MailConfig>) {
        if let Ok(mut slot) = self.config.write() {
            *slot = config;
        }
    }

    pub async fn send(&self, to: &str, to_name: Option<&str>, subject: &str, html: &str) -> Result<()> {
        // Clone the config out so the lock is not held across the await.
        let config = self
            .config
            .read()
            .map_err(|e| anyhow!("mail config lock poisoned: {}", e))?
            .clone();

        let Some(config) = config else {
            debug!("Outbound mail disabled, dropping '{}' to {}", subject, to);
            return Ok(());
        };

        let body = SendEmailBody {
            sender: EmailAddress {
                email: config.from_email,
                name: config.from_name,
            },
            to: vec![EmailAddress {
                email: to.to_string(),
                name: to_name.map(|s| s.to_string()),
            }],
            subject: subject.to_string(),
            html_content: html.to_string(),
        };

        let response = self
            .client
            .post(&config.api_url)
            .header("api-key", &config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("mail API returned {}", response.status()));
        }
        Ok(())
    }

    /// Fire-and-forget variant used by request handlers. The primary
    /// operation never waits on, or fails because of, delivery.
    pub fn send_detached(&self, to: String, to_name: String, subject: String, html: String) {
        let mailer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, Some(&to_name), &subject, &html).await {
                warn!("Failed to send '{}' to {}: {:#}", subject, to, e);
            }
        });
    }
}

// -- Message bodies --

pub fn verification_email(name: &str, link: &str) -> (String, String) {
    (
        "Verify Your Email Address".to_string(),
        format!(
            "<h2>Welcome, {name}!</h2>\
             <p>Thank you for registering. Please verify your email address:</p>\
             <p><a href=\"{link}\">Verify Email</a></p>\
             <p>If you didn't create an account, please ignore this email.</p>"
        ),
    )
}

pub fn magic_link_email(name: &str, link: &str, expires_mins: i64, max_uses: i64) -> (String, String) {
    (
        "Your Login Link".to_string(),
        format!(
            "<h2>Hi {name},</h2>\
             <p>Click the link below to log in to your account:</p>\
             <p><a href=\"{link}\">Log In</a></p>\
             <p>This link expires in {expires_mins} minutes and can be used {max_uses} times.</p>\
             <p>If you didn't request this, please ignore this email.</p>"
        ),
    )
}

pub fn password_reset_email(name: &str, link: &str) -> (String, String) {
    (
        "Password Reset Request".to_string(),
        format!(
            "<h2>Hi {name},</h2>\
             <p>You requested to reset your password:</p>\
             <p><a href=\"{link}\">Reset Password</a></p>\
             <p>This link expires in 1 hour.</p>\
             <p>If you didn't request this, please ignore this email.</p>"
        ),
    )
}

pub fn email_change_email(name: &str, new_email: &str, link: &str) -> (String, String) {
    (
        "Confirm Email Change".to_string(),
        format!(
            "<h2>Hi {name},</h2>\
             <p>You asked to change your account email to <strong>{new_email}</strong>.</p>\
             <p><a href=\"{link}\">Confirm Email Change</a></p>\
             <p>This link expires in 1 hour.</p>"
        ),
    )
}

pub fn tribute_pending_email(name: &str, memorial_name: &str, author: &str) -> (String, String) {
    (
        "New Tribute Pending Approval".to_string(),
        format!(
            "<h2>Hi {name},</h2>\
             <p>A new tribute from {author} has been submitted for \
             <strong>{memorial_name}</strong> and is waiting for review.</p>"
        ),
    )
}

pub fn manager_invitation_email(name: &str, memorial_name: &str) -> (String, String) {
    (
        "Memorial Manager Invitation".to_string(),
        format!(
            "<h2>Hi {name},</h2>\
             <p>You have been invited to help manage the memorial for \
             <strong>{memorial_name}</strong>. Log in to accept the invitation.</p>"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_mailer_drops_silently() {
        let mailer = Mailer::disabled();
        assert!(!mailer.is_configured());
        mailer
            .send("a@x.com", Some("Amy"), "Subject", "<p>body</p>")
            .await
            .unwrap();
    }

    #[test]
    fn reconfigure_swaps_settings() {
        let mailer = Mailer::disabled();
        mailer.reconfigure(Some(MailConfig {
            api_url: "https://mail.example/v3/send".to_string(),
            api_key: "key".to_string(),
            from_email: "noreply@example.com".to_string(),
            from_name: None,
        }));
        assert!(mailer.is_configured());
        mailer.reconfigure(None);
        assert!(!mailer.is_configured());
    }
}
