use std::sync::{Arc, Mutex};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use receptionist::config::AppConfig;
use receptionist::db;
use receptionist::handlers;
use receptionist::services::calendar::{CalendarStore, SqliteCalendar, UnconfiguredCalendar};
use receptionist::services::call_control::{CallControl, LogOnlyCallControl, TwilioCallControl};
use receptionist::services::messaging::twilio::{TwilioAccount, TwilioSmsProvider};
use receptionist::services::messaging::{LogOnlyMessaging, MessagingProvider};
use receptionist::services::realtime::openai::OpenAiRealtimeConnector;
use receptionist::services::records::{ConsoleRecordStore, RecordStore, SqliteRecordStore};
use receptionist::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    if config.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY not set, media streams will be refused until it is configured");
    }

    let (records, calendar): (Arc<dyn RecordStore>, Arc<dyn CalendarStore>) =
        if config.database_url.is_empty() {
            tracing::warn!("DATABASE_URL not set, records go to the log and bookings are not stored");
            (Arc::new(ConsoleRecordStore), Arc::new(UnconfiguredCalendar))
        } else {
            tracing::info!("using database at {}", config.database_url);
            let conn = Arc::new(Mutex::new(db::init_db(&config.database_url)?));
            (
                Arc::new(SqliteRecordStore::new(conn.clone())),
                Arc::new(SqliteCalendar::new(conn, &config.agent_company)),
            )
        };

    let (messaging, call_control): (Arc<dyn MessagingProvider>, Arc<dyn CallControl>) =
        if config.twilio_configured() {
            let account = TwilioAccount::new(
                config.twilio_account_sid.clone(),
                config.twilio_auth_token.clone(),
            );
            (
                Arc::new(TwilioSmsProvider::new(
                    account.clone(),
                    config.twilio_phone_number.clone(),
                )),
                Arc::new(TwilioCallControl::new(
                    account,
                    config.agent_name.clone(),
                    config.agent_phone.clone(),
                )),
            )
        } else {
            tracing::warn!("Twilio credentials not set, SMS and transfers are log-only");
            (Arc::new(LogOnlyMessaging), Arc::new(LogOnlyCallControl))
        };

    let realtime = Arc::new(OpenAiRealtimeConnector::new(
        config.openai_api_key.clone(),
        config.realtime_url.clone(),
    ));

    let state = Arc::new(AppState::new(
        config.clone(),
        records,
        calendar,
        messaging,
        realtime,
        call_control,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = handlers::router(state.clone())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(agent = %config.agent_name, "starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let flushed = state.registry.flush_all().await;
    tracing::info!(flushed, "shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
