use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::StreamExt;

use crate::services::telephony::wait_for_start;
use crate::state::AppState;

// GET /media-stream
pub async fn media_stream(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: Arc<AppState>, socket: WebSocket) {
    let (sink, mut source) = socket.split();

    let Some(start) = wait_for_start(&mut source).await else {
        tracing::info!("media stream closed before start");
        return;
    };

    let call_sid = match start.call_sid() {
        Some(call_sid) => call_sid,
        None => {
            tracing::warn!(stream_sid = %start.stream_sid, "stream start without call id, keying session by stream id");
            start.stream_sid.clone()
        }
    };
    let from_number = start.from_number();
    tracing::info!(call_sid = %call_sid, stream_sid = %start.stream_sid, "media stream started");

    let session = state
        .registry
        .get_or_create(&call_sid, from_number.as_deref());

    if let Err(e) = state.relay.run(session, start.stream_sid, source, sink).await {
        tracing::warn!(call_sid = %call_sid, error = %e, "media stream not relayed");
    }
}
