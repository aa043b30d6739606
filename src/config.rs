use std::env;
use std::time::Duration;

use crate::models::availability::ConflictRule;

const DEFAULT_REALTIME_URL: &str =
    "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-12-17";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub openai_api_key: String,
    pub realtime_url: String,
    pub realtime_voice: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub agent_name: String,
    pub agent_company: String,
    pub agent_phone: String,
    pub agent_email: String,
    pub timezone: String,
    pub cleanup_delay_secs: u64,
    pub tool_timeout_secs: u64,
    pub availability_rule: ConflictRule,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            database_url: env::var("DATABASE_URL").unwrap_or_default(),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            realtime_url: env::var("OPENAI_REALTIME_URL")
                .unwrap_or_else(|_| DEFAULT_REALTIME_URL.to_string()),
            realtime_voice: env::var("REALTIME_VOICE").unwrap_or_else(|_| "alloy".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            agent_name: env::var("AGENT_NAME").unwrap_or_else(|_| "Mark Esposito".to_string()),
            agent_company: env::var("AGENT_COMPANY")
                .unwrap_or_else(|_| "Berkshire Hathaway HomeServices Québec".to_string()),
            agent_phone: env::var("AGENT_PHONE").unwrap_or_default(),
            agent_email: env::var("AGENT_EMAIL").unwrap_or_default(),
            timezone: env::var("TIMEZONE").unwrap_or_else(|_| "America/Montreal".to_string()),
            cleanup_delay_secs: env::var("CLEANUP_DELAY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            tool_timeout_secs: env::var("TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            availability_rule: env::var("AVAILABILITY_RULE")
                .map(|v| ConflictRule::parse(&v))
                .unwrap_or_default(),
        }
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn twilio_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty() && !self.twilio_auth_token.is_empty()
    }
}
