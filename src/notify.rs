//! Email and share-link delivery.
//!
//! Both collaborators are fire-and-forget from the flow's perspective: their
//! outcomes are surfaced as status lines only and never feed back into the
//! application state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Serialize)]
struct EmailRequest<'a> {
    to: &'a str,
    subject: &'a str,
    report_content: &'a str,
}

#[derive(Serialize)]
struct ShareRequest<'a> {
    report_content: &'a str,
}

#[derive(Deserialize)]
struct ShareResponse {
    id: String,
}

#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    email_endpoint: Option<String>,
    share_endpoint: Option<String>,
}

impl Notifier {
    pub fn new(email_endpoint: Option<String>, share_endpoint: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            email_endpoint,
            share_endpoint,
        }
    }

    pub fn email_configured(&self) -> bool {
        self.email_endpoint.is_some()
    }

    pub fn share_configured(&self) -> bool {
        self.share_endpoint.is_some()
    }

    /// Send the report to a recipient.
    pub async fn send_report_email(&self, to: &str, report: &str) -> Result<()> {
        let endpoint = self
            .email_endpoint
            .as_deref()
            .context("no email endpoint configured")?;
        let req = EmailRequest {
            to,
            subject: "Your Cloud Cost Anomaly Report",
            report_content: report,
        };
        let resp = self
            .http
            .post(endpoint)
            .json(&req)
            .send()
            .await
            .context("contact email service")?;
        if !resp.status().is_success() {
            anyhow::bail!("email service responded with status {}", resp.status());
        }
        Ok(())
    }

    /// Background variant used by the interactive session: failures are
    /// logged, never surfaced as flow errors.
    pub fn send_report_email_detached(&self, to: String, report: String) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_report_email(&to, &report).await {
                warn!(error = %e, "email delivery failed");
            }
        });
    }

    /// Store the report at the share endpoint and return the shareable id.
    pub async fn share_report(&self, report: &str) -> Result<String> {
        let endpoint = self
            .share_endpoint
            .as_deref()
            .context("no share endpoint configured")?;
        let resp = self
            .http
            .post(endpoint)
            .json(&ShareRequest {
                report_content: report,
            })
            .send()
            .await
            .context("contact share service")?;
        if !resp.status().is_success() {
            anyhow::bail!("share service responded with status {}", resp.status());
        }
        let parsed: ShareResponse = resp.json().await.context("parse share response")?;
        Ok(parsed.id)
    }
}

/// Minimal recipient-address sanity check before attempting delivery.
pub fn validate_email(email: &str) -> Result<(), String> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Email must include an '@' symbol.".into());
    };
    if local.is_empty() {
        return Err("Please enter the part before the '@'.".into());
    }
    if domain.contains('@') {
        return Err("Email can only contain one '@' symbol.".into());
    }
    if !domain.contains('.') {
        return Err("The domain is missing a '.' (e.g., example.com).".into());
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err("The domain cannot start or end with a dot, or repeat dots.".into());
    }
    let tld = domain.rsplit('.').next().unwrap_or_default();
    if tld.len() < 2 {
        return Err("The top-level domain (e.g., .com) must be at least two characters.".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.org").is_ok());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "no-at-sign",
            "@example.com",
            "two@@example.com",
            "user@nodot",
            "user@.leading.com",
            "user@double..dot.com",
            "user@tld.x",
        ] {
            assert!(validate_email(bad).is_err(), "expected rejection: {bad}");
        }
    }
}
