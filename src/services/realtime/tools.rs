use serde_json::json;

use super::messages::ToolDef;
use crate::models::tool::{
    BOOK_APPOINTMENT, CHECK_AVAILABILITY, LOG_LEAD, LOG_VOICEMAIL, SEND_SMS_CONFIRMATION,
    WARM_TRANSFER,
};

fn function(name: &str, description: String, parameters: serde_json::Value) -> ToolDef {
    ToolDef {
        tool_type: "function".to_string(),
        name: name.to_string(),
        description,
        parameters,
    }
}

/// The six operations the AI may invoke mid-call.
pub fn tool_definitions(agent_name: &str) -> Vec<ToolDef> {
    vec![
        function(
            CHECK_AVAILABILITY,
            format!("Check {agent_name}'s calendar for available appointment slots on a specific date"),
            json!({
                "type": "object",
                "properties": {
                    "date": {"type": "string", "description": "Date in YYYY-MM-DD format"},
                    "duration_minutes": {
                        "type": "integer",
                        "description": "Duration of appointment in minutes",
                        "default": 60
                    }
                },
                "required": ["date"]
            }),
        ),
        function(
            BOOK_APPOINTMENT,
            format!("Book a viewing or consultation appointment with {agent_name}"),
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Client's full name"},
                    "phone": {"type": "string", "description": "Client's phone number"},
                    "email": {"type": "string", "description": "Client's email address"},
                    "date": {"type": "string", "description": "Date in YYYY-MM-DD format"},
                    "time": {"type": "string", "description": "Time in HH:MM AM/PM format"},
                    "purpose": {
                        "type": "string",
                        "enum": ["Property Viewing", "Market Analysis (CMA)", "Buyer Consultation", "Seller Consultation"],
                        "description": "Purpose of the meeting"
                    },
                    "location": {"type": "string", "description": "Property address or meeting location"},
                    "lead_type": {"type": "string", "enum": ["Buyer", "Seller", "Renter", "Investor"]},
                    "notes": {"type": "string", "description": "Additional notes about the client"}
                },
                "required": ["name", "phone", "date", "time", "purpose"]
            }),
        ),
        function(
            LOG_LEAD,
            "Save lead information to the CRM system".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "phone": {"type": "string"},
                    "email": {"type": "string"},
                    "type": {"type": "string", "enum": ["Buyer", "Seller", "Renter", "Investor", "Other"]},
                    "area_interest": {"type": "string"},
                    "budget": {"type": "string"},
                    "timeline": {"type": "string"},
                    "property_address": {"type": "string"},
                    "notes": {"type": "string"},
                    "next_action": {"type": "string"}
                },
                "required": ["name", "phone", "type"]
            }),
        ),
        function(
            SEND_SMS_CONFIRMATION,
            "Send appointment confirmation via SMS".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "phone": {"type": "string", "description": "Phone number to send SMS to"},
                    "message": {"type": "string", "description": "Confirmation message content"}
                },
                "required": ["phone", "message"]
            }),
        ),
        function(
            WARM_TRANSFER,
            format!("Transfer the call to {agent_name} with context summary"),
            json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Why transfer is needed"},
                    "context_summary": {"type": "string", "description": format!("Summary of conversation for {agent_name}")}
                },
                "required": ["reason", "context_summary"]
            }),
        ),
        function(
            LOG_VOICEMAIL,
            format!("Record a voicemail message for {agent_name} to call back"),
            json!({
                "type": "object",
                "properties": {
                    "caller_name": {"type": "string"},
                    "caller_phone": {"type": "string"},
                    "message": {"type": "string"},
                    "urgency": {"type": "string", "enum": ["Low", "Medium", "High"]}
                },
                "required": ["caller_name", "caller_phone", "message"]
            }),
        ),
    ]
}
