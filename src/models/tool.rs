use serde::{Deserialize, Deserializer, Serialize};

use super::appointment::Appointment;
use super::availability::DEFAULT_DURATION_MINUTES;
use super::lead::{LeadType, LeadUpdate};

pub const CHECK_AVAILABILITY: &str = "check_calendar_availability";
pub const BOOK_APPOINTMENT: &str = "book_appointment";
pub const LOG_LEAD: &str = "log_lead";
pub const SEND_SMS_CONFIRMATION: &str = "send_sms_confirmation";
pub const WARM_TRANSFER: &str = "warm_transfer";
pub const LOG_VOICEMAIL: &str = "log_voicemail";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AvailabilityArgs {
    pub date: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_MINUTES
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LeadArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub lead_type: Option<LeadType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_interest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
}

impl LeadArgs {
    pub fn to_update(&self) -> LeadUpdate {
        LeadUpdate {
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            lead_type: self.lead_type,
            area_interest: self.area_interest.clone(),
            budget: self.budget.clone(),
            timeline: self.timeline.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SmsArgs {
    pub phone: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TransferArgs {
    pub reason: String,
    pub context_summary: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "Low",
            Urgency::Medium => "Medium",
            Urgency::High => "High",
        }
    }

    /// Case-insensitive; anything unrecognised is `Medium`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Urgency::Low,
            "high" | "urgent" => Urgency::High,
            _ => Urgency::Medium,
        }
    }
}

impl<'de> Deserialize<'de> for Urgency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Urgency::parse(&raw))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VoicemailArgs {
    pub caller_name: String,
    pub caller_phone: String,
    pub message: String,
    #[serde(default)]
    pub urgency: Urgency,
}

/// One tool invocation, validated against its argument schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    CheckAvailability(AvailabilityArgs),
    BookAppointment(Appointment),
    LogLead(LeadArgs),
    SendSmsConfirmation(SmsArgs),
    WarmTransfer(TransferArgs),
    LogVoicemail(VoicemailArgs),
}

#[derive(Debug, thiserror::Error)]
pub enum ToolParseError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        source: serde_json::Error,
    },
}

impl ToolCall {
    /// Parses a tool name plus its string-encoded JSON arguments.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolParseError> {
        let raw = if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        };

        let invalid = |source| ToolParseError::InvalidArguments {
            tool: name.to_string(),
            source,
        };

        let call = match name {
            CHECK_AVAILABILITY => ToolCall::CheckAvailability(serde_json::from_str(raw).map_err(invalid)?),
            BOOK_APPOINTMENT => ToolCall::BookAppointment(serde_json::from_str(raw).map_err(invalid)?),
            LOG_LEAD => ToolCall::LogLead(serde_json::from_str(raw).map_err(invalid)?),
            SEND_SMS_CONFIRMATION => {
                ToolCall::SendSmsConfirmation(serde_json::from_str(raw).map_err(invalid)?)
            }
            WARM_TRANSFER => ToolCall::WarmTransfer(serde_json::from_str(raw).map_err(invalid)?),
            LOG_VOICEMAIL => ToolCall::LogVoicemail(serde_json::from_str(raw).map_err(invalid)?),
            other => return Err(ToolParseError::UnknownTool(other.to_string())),
        };
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::CheckAvailability(_) => CHECK_AVAILABILITY,
            ToolCall::BookAppointment(_) => BOOK_APPOINTMENT,
            ToolCall::LogLead(_) => LOG_LEAD,
            ToolCall::SendSmsConfirmation(_) => SEND_SMS_CONFIRMATION,
            ToolCall::WarmTransfer(_) => WARM_TRANSFER,
            ToolCall::LogVoicemail(_) => LOG_VOICEMAIL,
        }
    }
}

/// Result fed back to the AI transport as a function-call output.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ToolResult {
    Availability {
        available_slots: Vec<String>,
        date: String,
    },
    Booking {
        success: bool,
        booking_details: Appointment,
    },
    Lead {
        success: bool,
        lead_id: String,
    },
    Sms {
        success: bool,
    },
    Transfer {
        status: String,
        message: String,
        context: String,
    },
    Voicemail {
        success: bool,
        callback_within: String,
    },
}

impl ToolResult {
    pub fn to_output(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn is_success(&self) -> bool {
        match self {
            ToolResult::Availability { .. } | ToolResult::Transfer { .. } => true,
            ToolResult::Booking { success, .. }
            | ToolResult::Lead { success, .. }
            | ToolResult::Sms { success }
            | ToolResult::Voicemail { success, .. } => *success,
        }
    }
}
