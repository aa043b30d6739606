use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::MessagingProvider;

pub const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Account credentials plus the HTTP client shared by the Twilio REST callers.
#[derive(Clone)]
pub struct TwilioAccount {
    pub account_sid: String,
    pub auth_token: String,
    pub api_base: String,
    pub client: reqwest::Client,
}

impl TwilioAccount {
    pub fn new(account_sid: String, auth_token: String) -> Self {
        Self {
            account_sid,
            auth_token,
            api_base: TWILIO_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn resource_url(&self, resource: &str) -> String {
        format!("{}/Accounts/{}/{resource}", self.api_base, self.account_sid)
    }

    /// POSTs a form to an account resource and returns the response body.
    pub async fn post_form(&self, resource: &str, form: &[(&str, &str)]) -> anyhow::Result<String> {
        let body = self
            .client
            .post(self.resource_url(resource))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await
            .with_context(|| format!("failed to reach Twilio ({resource})"))?
            .error_for_status()
            .context("Twilio API returned error")?
            .text()
            .await
            .context("failed to read Twilio response")?;
        Ok(body)
    }
}

#[derive(Deserialize)]
struct MessageResponse {
    sid: Option<String>,
}

pub struct TwilioSmsProvider {
    account: TwilioAccount,
    from_number: String,
}

impl TwilioSmsProvider {
    pub fn new(account: TwilioAccount, from_number: String) -> Self {
        Self {
            account,
            from_number,
        }
    }
}

#[async_trait]
impl MessagingProvider for TwilioSmsProvider {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        let response = self
            .account
            .post_form(
                "Messages.json",
                &[("To", to), ("From", &self.from_number), ("Body", body)],
            )
            .await
            .context("failed to send Twilio SMS")?;

        let sid = serde_json::from_str::<MessageResponse>(&response)
            .ok()
            .and_then(|r| r.sid)
            .unwrap_or_default();
        tracing::info!(to = %to, message_sid = %sid, "SMS sent");
        Ok(())
    }
}
