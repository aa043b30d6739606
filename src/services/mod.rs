pub mod calendar;
pub mod call_control;
pub mod dispatcher;
pub mod messaging;
pub mod realtime;
pub mod records;
pub mod registry;
pub mod relay;
pub mod scheduling;
pub mod session;
pub mod telephony;
pub mod twiml;
