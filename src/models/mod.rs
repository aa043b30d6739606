pub mod appointment;
pub mod availability;
pub mod lead;
pub mod record;
pub mod session;
pub mod tool;

pub use appointment::{Appointment, CalendarEvent, Purpose};
pub use availability::ConflictRule;
pub use lead::{LeadRecord, LeadType, LeadUpdate};
pub use record::{AppointmentRow, LeadRow, Record, RecordCategory};
pub use session::SessionStatus;
pub use tool::{ToolCall, ToolResult};
