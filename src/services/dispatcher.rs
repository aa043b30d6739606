use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::models::availability::ConflictRule;
use crate::models::lead::non_empty;
use crate::models::record::LeadRow;
use crate::models::tool::{AvailabilityArgs, LeadArgs, SmsArgs, TransferArgs, VoicemailArgs};
use crate::models::{Appointment, AppointmentRow, CalendarEvent, LeadType, Record, ToolCall, ToolResult};
use crate::services::calendar::CalendarStore;
use crate::services::messaging::{booking_confirmation, MessagingProvider};
use crate::services::records::RecordStore;
use crate::services::scheduling;
use crate::services::session::Session;

pub const CALLBACK_WINDOW: &str = "2 hours";
pub const TRANSFER_STATUS: &str = "transfer_initiated";

#[derive(Clone, Debug)]
pub struct DispatcherSettings {
    pub agent_name: String,
    pub agent_company: String,
    pub agent_email: String,
    pub timezone: String,
    pub availability_rule: ConflictRule,
    pub timeout: Duration,
}

impl DispatcherSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            agent_name: config.agent_name.clone(),
            agent_company: config.agent_company.clone(),
            agent_email: config.agent_email.clone(),
            timezone: config.timezone.clone(),
            availability_rule: config.availability_rule,
            timeout: config.tool_timeout(),
        }
    }
}

/// Executes AI tool invocations against the collaborators.
pub struct ToolDispatcher {
    records: Arc<dyn RecordStore>,
    calendar: Arc<dyn CalendarStore>,
    messaging: Arc<dyn MessagingProvider>,
    settings: DispatcherSettings,
}

impl ToolDispatcher {
    pub fn new(
        records: Arc<dyn RecordStore>,
        calendar: Arc<dyn CalendarStore>,
        messaging: Arc<dyn MessagingProvider>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            records,
            calendar,
            messaging,
            settings,
        }
    }

    /// Runs one invocation. `None` means the invocation was rejected
    /// (unknown tool or malformed arguments) and nothing should be sent back.
    pub async fn dispatch(
        &self,
        session: &Session,
        invocation_id: &str,
        name: &str,
        arguments: &str,
    ) -> Option<ToolResult> {
        let call_sid = session.call_sid();

        if let Some(previous) = session.cached_result(invocation_id) {
            tracing::warn!(call_sid = %call_sid, invocation_id = %invocation_id, tool = %name, "repeated invocation, replaying result");
            return Some(previous);
        }

        let call = match ToolCall::parse(name, arguments) {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(call_sid = %call_sid, invocation_id = %invocation_id, error = %e, "rejected tool invocation");
                return None;
            }
        };

        tracing::info!(call_sid = %call_sid, tool = call.name(), "tool invocation");

        let result = match call {
            ToolCall::CheckAvailability(args) => self.check_availability(args).await,
            ToolCall::BookAppointment(appointment) => self.book_appointment(session, appointment).await,
            ToolCall::LogLead(args) => self.log_lead(session, args).await,
            ToolCall::SendSmsConfirmation(args) => self.send_sms(args).await,
            ToolCall::WarmTransfer(args) => self.warm_transfer(session, args).await,
            ToolCall::LogVoicemail(args) => self.log_voicemail(session, args).await,
        };

        if !result.is_success() {
            tracing::warn!(call_sid = %call_sid, tool = %name, "tool invocation failed");
        }
        session.cache_result(invocation_id, &result);
        Some(result)
    }

    async fn check_availability(&self, args: AvailabilityArgs) -> ToolResult {
        let available_slots = scheduling::plan_availability(
            self.calendar.as_ref(),
            &args.date,
            args.duration_minutes,
            self.settings.availability_rule,
            self.settings.timeout,
        )
        .await;

        ToolResult::Availability {
            available_slots,
            date: args.date,
        }
    }

    async fn book_appointment(&self, session: &Session, appointment: Appointment) -> ToolResult {
        let call_sid = session.call_sid();
        if session.note_booking(&appointment.slot_key()) {
            tracing::warn!(call_sid = %call_sid, slot = %appointment.slot_key(), "repeated booking for the same slot");
        }

        let failed = |appointment: Appointment| ToolResult::Booking {
            success: false,
            booking_details: appointment,
        };

        let event = match CalendarEvent::from_appointment(
            &appointment,
            &self.settings.timezone,
            &self.settings.agent_email,
        ) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(call_sid = %call_sid, error = %e, "unbookable appointment");
                return failed(appointment);
            }
        };

        let event_link = match self.bounded("calendar create", self.calendar.create_event(&event)).await {
            Some(link) => link,
            None => return failed(appointment),
        };

        session.with_lead(|lead| {
            lead.mark_appointment_booked();
            lead.add_note(format!(
                "Booked {} on {} at {}",
                appointment.purpose.as_str(),
                appointment.date,
                appointment.time
            ));
        });

        self.append(Record::Appointment(AppointmentRow::new(&appointment, &event_link)))
            .await;

        if non_empty(Some(appointment.phone.as_str())).is_some() {
            let body = booking_confirmation(
                appointment.purpose.as_str(),
                &self.settings.agent_name,
                &appointment.date,
                &appointment.time,
                appointment.location_or_default(),
                &self.settings.agent_company,
            );
            let messaging = Arc::clone(&self.messaging);
            let to = appointment.phone.clone();
            let timeout = self.settings.timeout;
            let call_sid = call_sid.to_string();
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, messaging.send_message(&to, &body)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(call_sid = %call_sid, error = %e, "booking confirmation SMS failed")
                    }
                    Err(_) => tracing::warn!(call_sid = %call_sid, "booking confirmation SMS timed out"),
                }
            });
        }

        tracing::info!(call_sid = %call_sid, event = %event_link, "appointment booked");
        ToolResult::Booking {
            success: true,
            booking_details: appointment,
        }
    }

    async fn log_lead(&self, session: &Session, args: LeadArgs) -> ToolResult {
        let row = session.with_lead(|lead| {
            lead.merge(args.to_update());
            if let Some(address) = non_empty(args.property_address.as_deref()) {
                lead.property_address = Some(address);
            }
            if let Some(notes) = args.notes.as_deref() {
                lead.add_note(notes);
            }
            LeadRow::from_lead(lead).with_next_action(args.next_action.clone().unwrap_or_default())
        });

        let success = self.append(Record::Lead(row)).await;
        ToolResult::Lead {
            success,
            lead_id: session.call_sid().to_string(),
        }
    }

    async fn send_sms(&self, args: SmsArgs) -> ToolResult {
        let success = self
            .bounded("sms send", self.messaging.send_message(&args.phone, &args.message))
            .await
            .is_some();
        ToolResult::Sms { success }
    }

    async fn warm_transfer(&self, session: &Session, args: TransferArgs) -> ToolResult {
        let row = session.with_lead(|lead| {
            lead.mark_transfer_requested();
            let mut row = LeadRow::from_lead(lead);
            if row.name.is_empty() {
                row.name = "Unknown".to_string();
            }
            if row.lead_type.is_empty() {
                row.lead_type = LeadType::Other.as_str().to_string();
            }
            row.with_notes(format!("WARM TRANSFER REQUESTED: {}", args.reason))
                .with_next_action(format!(
                    "Call back immediately. Context: {}",
                    args.context_summary
                ))
        });
        session.request_transfer();

        tracing::info!(call_sid = %session.call_sid(), reason = %args.reason, "warm transfer requested");
        self.append(Record::Lead(row)).await;

        ToolResult::Transfer {
            status: TRANSFER_STATUS.to_string(),
            message: format!("Connecting you to {} now. Please hold.", self.settings.agent_name),
            context: args.context_summary,
        }
    }

    async fn log_voicemail(&self, session: &Session, args: VoicemailArgs) -> ToolResult {
        let phone = non_empty(Some(args.caller_phone.as_str()))
            .unwrap_or_else(|| session.with_lead(|lead| lead.phone_or_call_sid()));
        let row = LeadRow::new(&args.caller_name, &phone, LeadType::Voicemail.as_str())
            .with_notes(args.message)
            .with_next_action(format!("Callback requested - Urgency: {}", args.urgency.as_str()));

        let success = self.append(Record::Lead(row)).await;
        ToolResult::Voicemail {
            success,
            callback_within: CALLBACK_WINDOW.to_string(),
        }
    }

    /// Appends a record within the collaborator timeout; false on any failure.
    async fn append(&self, record: Record) -> bool {
        let category = record.category().as_str();
        self.bounded(category, self.records.append(&record))
            .await
            .is_some()
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.settings.timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(operation = %what, error = %e, "collaborator call failed");
                None
            }
            Err(_) => {
                tracing::warn!(operation = %what, timeout_secs = self.settings.timeout.as_secs(), "collaborator call timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::{BOOK_APPOINTMENT, CHECK_AVAILABILITY, LOG_LEAD, LOG_VOICEMAIL, SEND_SMS_CONFIRMATION, WARM_TRANSFER};
    use crate::testing::{test_config, MockCalendar, MockMessaging, MockRecords};

    const BOOKING: &str = r#"{"name":"J. Doe","phone":"+15145550000","date":"2025-06-10","time":"10:00 AM","purpose":"Property Viewing","location":"123 Rue X"}"#;

    struct Fixture {
        dispatcher: ToolDispatcher,
        records: MockRecords,
        calendar: MockCalendar,
        messaging: MockMessaging,
        session: Session,
    }

    fn fixture_with(calendar: MockCalendar, messaging: MockMessaging) -> Fixture {
        let records = MockRecords::default();
        let dispatcher = ToolDispatcher::new(
            Arc::new(records.clone()),
            Arc::new(calendar.clone()),
            Arc::new(messaging.clone()),
            DispatcherSettings::from_config(&test_config()),
        );
        let session = Session::new("CA1", Some("+15145550000"));
        session.begin_streaming().unwrap();
        Fixture {
            dispatcher,
            records,
            calendar,
            messaging,
            session,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockCalendar::default(), MockMessaging::default())
    }

    #[tokio::test]
    async fn test_check_availability_empty_day() {
        let f = fixture();
        let result = f
            .dispatcher
            .dispatch(&f.session, "call_1", CHECK_AVAILABILITY, r#"{"date":"2025-06-10"}"#)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&result.to_output()).unwrap();
        assert_eq!(json["date"], "2025-06-10");
        assert_eq!(
            json["available_slots"],
            serde_json::json!(["09:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "01:00 PM"])
        );
    }

    #[tokio::test]
    async fn test_check_availability_failing_calendar() {
        let f = fixture_with(MockCalendar::failing(), MockMessaging::default());
        let result = f
            .dispatcher
            .dispatch(&f.session, "call_1", CHECK_AVAILABILITY, r#"{"date":"2025-06-10","duration_minutes":30}"#)
            .await
            .unwrap();
        assert_eq!(
            result,
            ToolResult::Availability {
                available_slots: vec!["10:00 AM".into(), "2:00 PM".into(), "4:00 PM".into()],
                date: "2025-06-10".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_booking_with_failing_calendar_has_no_side_effects() {
        let f = fixture_with(MockCalendar::failing(), MockMessaging::default());
        let result = f
            .dispatcher
            .dispatch(&f.session, "call_1", BOOK_APPOINTMENT, BOOKING)
            .await
            .unwrap();

        assert!(matches!(result, ToolResult::Booking { success: false, .. }));
        assert!(!f.session.lead().appointment_booked());
        assert!(f.records.appointments().is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.messaging.sent().is_empty());
    }

    #[tokio::test]
    async fn test_booking_success_sends_one_confirmation() {
        let f = fixture();
        let result = f
            .dispatcher
            .dispatch(&f.session, "call_1", BOOK_APPOINTMENT, BOOKING)
            .await
            .unwrap();

        let ToolResult::Booking { success, booking_details } = &result else {
            panic!("expected booking result");
        };
        assert!(success);
        assert_eq!(booking_details.name, "J. Doe");
        assert!(f.session.lead().appointment_booked());

        let appointments = f.records.appointments();
        assert_eq!(appointments.len(), 1);
        assert_eq!(appointments[0].status, "Confirmed");
        assert_eq!(appointments[0].event_link, "/calendar/evt-1.ics");

        let created = f.calendar.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].summary, "Property Viewing - J. Doe (AI Booked)");

        let sent = f.messaging.wait_for(1).await;
        assert_eq!(sent.len(), 1);
        let (to, body) = &sent[0];
        assert_eq!(to, "+15145550000");
        for part in ["Property Viewing", "2025-06-10", "10:00 AM", "123 Rue X"] {
            assert!(body.contains(part), "{body} should contain {part}");
        }
    }

    #[tokio::test]
    async fn test_booking_with_unparseable_time_fails() {
        let f = fixture();
        let args = BOOKING.replace("10:00 AM", "ten-ish");
        let result = f
            .dispatcher
            .dispatch(&f.session, "call_1", BOOK_APPOINTMENT, &args)
            .await
            .unwrap();
        assert!(!result.is_success());
        assert!(f.calendar.created.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_booking_timeout_is_a_failure() {
        let f = fixture_with(MockCalendar::slow(Duration::from_secs(30)), MockMessaging::default());
        let result = f
            .dispatcher
            .dispatch(&f.session, "call_1", BOOK_APPOINTMENT, BOOKING)
            .await
            .unwrap();
        assert!(!result.is_success());
        assert!(!f.session.lead().appointment_booked());
    }

    #[tokio::test]
    async fn test_replayed_invocation_does_not_rebook() {
        let f = fixture();
        let first = f.dispatcher.dispatch(&f.session, "call_1", BOOK_APPOINTMENT, BOOKING).await;
        let again = f.dispatcher.dispatch(&f.session, "call_1", BOOK_APPOINTMENT, BOOKING).await;
        assert_eq!(first, again);
        assert_eq!(f.calendar.created.lock().unwrap().len(), 1);

        // A new invocation id executes again.
        f.dispatcher.dispatch(&f.session, "call_2", BOOK_APPOINTMENT, BOOKING).await;
        assert_eq!(f.calendar.created.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_log_lead_merges_and_records() {
        let f = fixture();
        let result = f
            .dispatcher
            .dispatch(
                &f.session,
                "call_1",
                LOG_LEAD,
                r#"{"name":"Jane","phone":"","type":"Buyer","area_interest":"Westmount","budget":"1.2M","notes":"needs 3br","next_action":"send listings"}"#,
            )
            .await
            .unwrap();

        assert_eq!(
            result,
            ToolResult::Lead {
                success: true,
                lead_id: "CA1".to_string()
            }
        );
        let lead = f.session.lead();
        assert_eq!(lead.name.as_deref(), Some("Jane"));
        assert_eq!(lead.phone.as_deref(), Some("+15145550000"));
        assert_eq!(lead.lead_type, Some(LeadType::Buyer));
        assert_eq!(lead.area_interest.as_deref(), Some("Westmount"));

        let rows = f.records.leads();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].budget, "1.2M");
        assert_eq!(rows[0].notes, "needs 3br");
        assert_eq!(rows[0].next_action, "send listings");
    }

    #[tokio::test]
    async fn test_send_sms_reports_failure() {
        let f = fixture_with(MockCalendar::default(), MockMessaging::failing());
        let result = f
            .dispatcher
            .dispatch(&f.session, "call_1", SEND_SMS_CONFIRMATION, r#"{"phone":"+15145550000","message":"see you"}"#)
            .await
            .unwrap();
        assert_eq!(result, ToolResult::Sms { success: false });

        let f = fixture();
        let result = f
            .dispatcher
            .dispatch(&f.session, "call_1", SEND_SMS_CONFIRMATION, r#"{"phone":"+15145550000","message":"see you"}"#)
            .await
            .unwrap();
        assert_eq!(result, ToolResult::Sms { success: true });
        assert_eq!(f.messaging.sent(), vec![("+15145550000".to_string(), "see you".to_string())]);
    }

    #[tokio::test]
    async fn test_warm_transfer_is_idempotent_on_flag() {
        let f = fixture();
        for (i, summary) in ["wants an offer", "still wants an offer"].iter().enumerate() {
            let args = format!(r#"{{"reason":"negotiation","context_summary":"{summary}"}}"#);
            let result = f
                .dispatcher
                .dispatch(&f.session, &format!("call_{i}"), WARM_TRANSFER, &args)
                .await
                .unwrap();
            assert_eq!(
                result,
                ToolResult::Transfer {
                    status: "transfer_initiated".to_string(),
                    message: "Connecting you to Mark Esposito now. Please hold.".to_string(),
                    context: summary.to_string(),
                }
            );
        }

        assert!(f.session.lead().transfer_requested());
        assert!(f.session.transfer_pending());

        let rows = f.records.leads();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Unknown");
        assert_eq!(rows[0].notes, "WARM TRANSFER REQUESTED: negotiation");
        assert_eq!(rows[1].next_action, "Call back immediately. Context: still wants an offer");
    }

    #[tokio::test]
    async fn test_log_voicemail_defaults_urgency() {
        let f = fixture();
        let result = f
            .dispatcher
            .dispatch(
                &f.session,
                "call_1",
                LOG_VOICEMAIL,
                r#"{"caller_name":"Bob","caller_phone":"","message":"call me back"}"#,
            )
            .await
            .unwrap();
        assert_eq!(
            result,
            ToolResult::Voicemail {
                success: true,
                callback_within: "2 hours".to_string()
            }
        );

        let rows = f.records.leads();
        assert_eq!(rows[0].lead_type, "Voicemail");
        assert_eq!(rows[0].phone, "+15145550000");
        assert_eq!(rows[0].next_action, "Callback requested - Urgency: Medium");
    }

    #[tokio::test]
    async fn test_log_voicemail_reports_store_failure() {
        let dispatcher = ToolDispatcher::new(
            Arc::new(MockRecords::failing()),
            Arc::new(MockCalendar::default()),
            Arc::new(MockMessaging::default()),
            DispatcherSettings::from_config(&test_config()),
        );
        let session = Session::new("CA1", Some("+15145550000"));
        session.begin_streaming().unwrap();

        let result = dispatcher
            .dispatch(
                &session,
                "call_1",
                LOG_VOICEMAIL,
                r#"{"caller_name":"Bob","caller_phone":"+15145551111","message":"call me back"}"#,
            )
            .await
            .unwrap();
        assert_eq!(
            result,
            ToolResult::Voicemail {
                success: false,
                callback_within: "2 hours".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_are_no_ops() {
        let f = fixture();
        assert!(f.dispatcher.dispatch(&f.session, "call_1", "order_pizza", "{}").await.is_none());
        assert!(f
            .dispatcher
            .dispatch(&f.session, "call_2", WARM_TRANSFER, r#"{"reason":1}"#)
            .await
            .is_none());
        assert!(f.records.rows.lock().unwrap().is_empty());
        assert!(!f.session.transfer_pending());
    }
}
