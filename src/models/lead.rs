use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum LeadType {
    Buyer,
    Seller,
    Renter,
    Investor,
    Other,
    Voicemail,
    #[serde(rename = "Call Log")]
    CallLog,
}

impl LeadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadType::Buyer => "Buyer",
            LeadType::Seller => "Seller",
            LeadType::Renter => "Renter",
            LeadType::Investor => "Investor",
            LeadType::Other => "Other",
            LeadType::Voicemail => "Voicemail",
            LeadType::CallLog => "Call Log",
        }
    }

    /// Case-insensitive; anything unrecognised is `Other`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "buyer" => LeadType::Buyer,
            "seller" => LeadType::Seller,
            "renter" | "tenant" => LeadType::Renter,
            "investor" => LeadType::Investor,
            "voicemail" => LeadType::Voicemail,
            "call log" | "call_log" => LeadType::CallLog,
            _ => LeadType::Other,
        }
    }
}

impl<'de> Deserialize<'de> for LeadType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(LeadType::parse(&raw))
    }
}

/// Contact and interest data gathered about the caller during one call.
#[derive(Debug, Clone, Serialize)]
pub struct LeadRecord {
    pub call_sid: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub lead_type: Option<LeadType>,
    pub area_interest: Option<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
    pub property_address: Option<String>,
    pub notes: Vec<String>,
    transfer_requested: bool,
    appointment_booked: bool,
}

/// Fields a `log_lead` invocation may merge into the record.
#[derive(Debug, Clone, Default)]
pub struct LeadUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub lead_type: Option<LeadType>,
    pub area_interest: Option<String>,
    pub budget: Option<String>,
    pub timeline: Option<String>,
}

impl LeadRecord {
    pub fn new(call_sid: &str, caller_phone: Option<&str>) -> Self {
        Self {
            call_sid: call_sid.to_string(),
            name: None,
            phone: non_empty(caller_phone),
            email: None,
            lead_type: None,
            area_interest: None,
            budget: None,
            timeline: None,
            property_address: None,
            notes: Vec::new(),
            transfer_requested: false,
            appointment_booked: false,
        }
    }

    /// Overwrites only the fields that carry a non-empty value.
    pub fn merge(&mut self, update: LeadUpdate) {
        merge_field(&mut self.name, update.name);
        merge_field(&mut self.phone, update.phone);
        merge_field(&mut self.email, update.email);
        merge_field(&mut self.area_interest, update.area_interest);
        merge_field(&mut self.budget, update.budget);
        merge_field(&mut self.timeline, update.timeline);
        if update.lead_type.is_some() {
            self.lead_type = update.lead_type;
        }
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !note.trim().is_empty() {
            self.notes.push(note);
        }
    }

    pub fn mark_transfer_requested(&mut self) {
        self.transfer_requested = true;
    }

    pub fn mark_appointment_booked(&mut self) {
        self.appointment_booked = true;
    }

    pub fn transfer_requested(&self) -> bool {
        self.transfer_requested
    }

    pub fn appointment_booked(&self) -> bool {
        self.appointment_booked
    }

    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    /// Phone to persist; falls back to the call identifier when unknown.
    pub fn phone_or_call_sid(&self) -> String {
        match self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(phone) => phone.to_string(),
            None => {
                tracing::warn!(call_sid = %self.call_sid, "caller phone unknown, using call id");
                self.call_sid.clone()
            }
        }
    }
}

pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn merge_field(slot: &mut Option<String>, value: Option<String>) {
    if let Some(v) = non_empty(value.as_deref()) {
        *slot = Some(v);
    }
}
