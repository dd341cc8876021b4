//! Outbound notifications for the account flows.
//!
//! Delivery is best-effort: callers log a failed send and carry on.

use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification(&self, to: &str, token: &str) -> anyhow::Result<()>;
    async fn send_password_reset(&self, to: &str, token: &str) -> anyhow::Result<()>;
    async fn send_welcome(&self, to: &str, first_name: &str) -> anyhow::Result<()>;
}

/// Writes messages to the log instead of sending them. Used until a mail
/// provider is wired in.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    base_url: String,
}

impl LogNotifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/verify-email?token={}", self.base_url, token)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.base_url, token)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification(&self, to: &str, token: &str) -> anyhow::Result<()> {
        info!(
            to,
            subject = "Verify Your Email Address",
            link = %self.verification_link(token),
            expires_in = "24h",
            "email dispatched"
        );
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, token: &str) -> anyhow::Result<()> {
        info!(
            to,
            subject = "Reset Your Password",
            link = %self.reset_link(token),
            expires_in = "1h",
            "email dispatched"
        );
        Ok(())
    }

    async fn send_welcome(&self, to: &str, first_name: &str) -> anyhow::Result<()> {
        info!(to, first_name, subject = "Welcome to FleetPass!", "email dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_use_base_url() {
        let n = LogNotifier::new("https://app.fleet.io/");
        assert_eq!(
            n.verification_link("abc"),
            "https://app.fleet.io/verify-email?token=abc"
        );
        assert_eq!(n.reset_link("xyz"), "https://app.fleet.io/reset-password?token=xyz");
    }
}
