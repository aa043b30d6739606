use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Html;
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::services::session::SessionSummary;
use crate::services::twiml::escape;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[derive(Serialize)]
pub struct Integrations {
    records: bool,
    calendar: bool,
    messaging: bool,
    realtime: bool,
    call_control: bool,
}

#[derive(Serialize)]
pub struct StatusResponse {
    status: &'static str,
    agent: String,
    company: String,
    active_calls: usize,
    integrations: Integrations,
}

// GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "operational",
        agent: state.config.agent_name.clone(),
        company: state.config.agent_company.clone(),
        active_calls: state.registry.len(),
        integrations: Integrations {
            records: state.records.is_configured(),
            calendar: state.calendar.is_configured(),
            messaging: state.messaging.is_configured(),
            realtime: state.realtime.is_configured(),
            call_control: state.call_control.is_configured(),
        },
    })
}

// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

// GET /
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let agent = escape(&state.config.agent_name);
    let company = escape(&state.config.agent_company);
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{agent} AI Receptionist</title></head>
<body style="font-family: Arial, sans-serif; padding: 40px;">
  <h1>{agent} AI Receptionist</h1>
  <p><strong>Status:</strong> Online</p>
  <p><strong>Agent:</strong> {agent} - {company}</p>
  <p><strong>Active calls:</strong> {active}</p>
  <h2>Endpoints</h2>
  <ul>
    <li><code>/incoming-call</code> - Twilio voice webhook</li>
    <li><code>/media-stream</code> - media stream WebSocket</li>
    <li><code>/call-status</code> - call status callback</li>
    <li><code>/voicemail</code> - recording callback</li>
    <li><code>/status</code> - health and integrations</li>
  </ul>
</body>
</html>"#,
        active = state.registry.len(),
    ))
}

// GET /api/sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let sessions = state.registry.list().iter().map(|s| s.summary()).collect();
    Ok(Json(sessions))
}
