use async_trait::async_trait;

use crate::services::messaging::twilio::TwilioAccount;
use crate::services::twiml;

/// External control over a live call.
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Redirects the live call to the human agent.
    async fn transfer(&self, call_sid: &str, context: &str) -> anyhow::Result<()>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Updates the in-progress call with `<Dial>` TwiML through the REST API.
pub struct TwilioCallControl {
    account: TwilioAccount,
    agent_name: String,
    agent_phone: String,
}

impl TwilioCallControl {
    pub fn new(account: TwilioAccount, agent_name: String, agent_phone: String) -> Self {
        Self {
            account,
            agent_name,
            agent_phone,
        }
    }
}

#[async_trait]
impl CallControl for TwilioCallControl {
    async fn transfer(&self, call_sid: &str, context: &str) -> anyhow::Result<()> {
        anyhow::ensure!(!self.agent_phone.is_empty(), "agent phone not configured");

        let body = twiml::transfer(&self.agent_name, &self.agent_phone);
        self.account
            .post_form(&format!("Calls/{call_sid}.json"), &[("Twiml", &body)])
            .await?;

        tracing::info!(call_sid = %call_sid, agent_phone = %self.agent_phone, context = %context, "call transferred");
        Ok(())
    }
}

pub struct LogOnlyCallControl;

#[async_trait]
impl CallControl for LogOnlyCallControl {
    async fn transfer(&self, call_sid: &str, context: &str) -> anyhow::Result<()> {
        tracing::info!(call_sid = %call_sid, context = %context, "call control not configured, transfer logged only");
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }
}
