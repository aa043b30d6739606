use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::calendar::CalendarStore;
use crate::services::call_control::CallControl;
use crate::services::dispatcher::{DispatcherSettings, ToolDispatcher};
use crate::services::messaging::MessagingProvider;
use crate::services::realtime::{self, RealtimeConnector};
use crate::services::records::RecordStore;
use crate::services::registry::SessionRegistry;
use crate::services::relay::Relay;

pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<SessionRegistry>,
    pub relay: Relay,
    pub records: Arc<dyn RecordStore>,
    pub calendar: Arc<dyn CalendarStore>,
    pub messaging: Arc<dyn MessagingProvider>,
    pub realtime: Arc<dyn RealtimeConnector>,
    pub call_control: Arc<dyn CallControl>,
}

impl AppState {
    /// Wires the registry, dispatcher and relay around the chosen collaborators.
    pub fn new(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        calendar: Arc<dyn CalendarStore>,
        messaging: Arc<dyn MessagingProvider>,
        realtime: Arc<dyn RealtimeConnector>,
        call_control: Arc<dyn CallControl>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(
            records.clone(),
            config.cleanup_delay(),
            config.tool_timeout(),
        ));
        let dispatcher = Arc::new(ToolDispatcher::new(
            records.clone(),
            calendar.clone(),
            messaging.clone(),
            DispatcherSettings::from_config(&config),
        ));
        let relay = Relay::new(
            dispatcher,
            call_control.clone(),
            realtime.clone(),
            registry.clone(),
            realtime::session_config(&config),
        );

        Self {
            config,
            registry,
            relay,
            records,
            calendar,
            messaging,
            realtime,
            call_control,
        }
    }
}
