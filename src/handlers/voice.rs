use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::errors::AppError;
use crate::models::record::LeadRow;
use crate::models::{LeadType, Record, SessionStatus};
use crate::services::twiml;
use crate::state::AppState;

type FormParams = Vec<(String, String)>;

const TERMINAL_CALL_STATUSES: [&str; 5] = ["completed", "busy", "failed", "no-answer", "canceled"];

pub fn validate_twilio_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &[(String, String)],
) -> bool {
    let mut data = url.to_string();
    let mut sorted_params = params.to_vec();
    sorted_params.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in &sorted_params {
        data.push_str(key);
        data.push_str(value);
    }

    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());
    let result = mac.finalize().into_bytes();
    let expected = base64::engine::general_purpose::STANDARD.encode(result);

    expected == signature
}

fn request_host(headers: &HeaderMap) -> &str {
    headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
}

/// Checks `X-Twilio-Signature` when an auth token is configured.
fn verify_twilio_request(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    params: &[(String, String)],
) -> Result<(), AppError> {
    if state.config.twilio_auth_token.is_empty() {
        return Ok(());
    }

    let signature = headers
        .get("x-twilio-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if signature.is_empty() {
        tracing::warn!(path = %path, "missing X-Twilio-Signature header");
        return Err(AppError::Forbidden("missing signature".to_string()));
    }

    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    let url = format!("{proto}://{}{path}", request_host(headers));

    if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, params) {
        tracing::warn!(path = %path, "invalid Twilio signature");
        return Err(AppError::Forbidden("invalid signature".to_string()));
    }
    Ok(())
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

async fn append_record(state: &AppState, record: Record) {
    if let Err(e) = state.records.append(&record).await {
        tracing::error!(error = %e, category = record.category().as_str(), "failed to append record");
    }
}

// POST /incoming-call
pub async fn incoming_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<FormParams>,
) -> Result<Response, AppError> {
    verify_twilio_request(&state, &headers, "/incoming-call", &params)?;

    let call_sid = param(&params, "CallSid")
        .ok_or_else(|| AppError::BadRequest("CallSid is required".to_string()))?;
    let from = param(&params, "From");

    tracing::info!(call_sid = %call_sid, from = from.unwrap_or(""), "incoming call");
    state.registry.get_or_create(call_sid, from);

    let body = twiml::connect_stream(request_host(&headers), call_sid, from.unwrap_or(""));
    Ok(([(header::CONTENT_TYPE, "application/xml")], body).into_response())
}

// POST /call-status
pub async fn call_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<FormParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    verify_twilio_request(&state, &headers, "/call-status", &params)?;

    let call_sid = param(&params, "CallSid").unwrap_or("unknown");
    let status = param(&params, "CallStatus").unwrap_or("unknown");
    let duration = param(&params, "CallDuration").unwrap_or("0");

    tracing::info!(call_sid = %call_sid, status = %status, duration = %duration, "call status");

    let row = LeadRow::new("SYSTEM", call_sid, LeadType::CallLog.as_str())
        .with_notes(format!("Call ended. Status: {status}, Duration: {duration}s"));
    append_record(&state, Record::Lead(row)).await;

    // A call that hung up before its media stream started never reaches the relay.
    if TERMINAL_CALL_STATUSES.contains(&status) {
        if let Some(session) = state.registry.get(call_sid) {
            if session.status() == SessionStatus::Created && session.begin_finalizing() {
                tracing::info!(call_sid = %call_sid, "call ended before streaming");
                state.registry.schedule_cleanup(&session);
            }
        }
    }

    Ok(Json(serde_json::json!({"status": "logged"})))
}

// POST /voicemail
pub async fn voicemail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<FormParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    verify_twilio_request(&state, &headers, "/voicemail", &params)?;

    let call_sid = param(&params, "CallSid").unwrap_or("unknown");
    let recording_url = param(&params, "RecordingUrl").unwrap_or("");
    let from = param(&params, "From").unwrap_or(call_sid);

    tracing::info!(call_sid = %call_sid, from = %from, recording_url = %recording_url, "voicemail recorded");

    let row = LeadRow::new("Voicemail", from, LeadType::Voicemail.as_str())
        .with_notes(format!("Recording: {recording_url}. Transcription pending."))
        .with_next_action("Listen and call back within 2 hours");
    append_record(&state, Record::Lead(row)).await;

    Ok(Json(serde_json::json!({"status": "voicemail_logged"})))
}
