pub mod twilio;

use async_trait::async_trait;

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Used when Twilio credentials are missing. Every send is logged and
/// reported as failed so the caller sees `success: false`.
pub struct LogOnlyMessaging;

#[async_trait]
impl MessagingProvider for LogOnlyMessaging {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, body = %body, "messaging not configured, SMS not sent");
        anyhow::bail!("messaging not configured")
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Confirmation text sent after a successful booking.
pub fn booking_confirmation(
    purpose: &str,
    agent: &str,
    date: &str,
    time: &str,
    location: &str,
    company: &str,
) -> String {
    format!(
        "Confirmed: {purpose} with {agent} on {date} at {time}. Address: {location}. {agent} will contact you shortly. -{company}"
    )
}
