pub mod calendar;
pub mod media_stream;
pub mod status;
pub mod voice;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(status::index))
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/api/sessions", get(status::list_sessions))
        .route("/incoming-call", post(voice::incoming_call))
        .route("/call-status", post(voice::call_status))
        .route("/voicemail", post(voice::voicemail))
        .route("/media-stream", get(media_stream::media_stream))
        .route("/calendar/:event_id", get(calendar::download_ics))
        .with_state(state)
}
