use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::errors::AppError;
use crate::state::AppState;

// GET /calendar/:event_id
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let ics = state
        .calendar
        .event_ics(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("event {event_id}")))?;

    let filename = format!("appointment-{event_id}.ics");
    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                &format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}
