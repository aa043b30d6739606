use std::collections::HashMap;
use std::sync::Arc;

use base64::prelude::*;
use tokio::sync::mpsc;

use crate::models::SessionStatus;
use crate::services::call_control::CallControl;
use crate::services::dispatcher::ToolDispatcher;
use crate::services::realtime::messages::{ServerEvent, SessionConfig};
use crate::services::realtime::{RealtimeClient, RealtimeConnection, RealtimeConnector};
use crate::services::registry::SessionRegistry;
use crate::services::session::Session;
use crate::services::telephony::{MediaSink, MediaSource, OutboundFrame, StreamFrame};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("session {call_sid} is {status}, refusing stream")]
    NotAttachable { call_sid: String, status: String },

    #[error("AI transport unavailable: {0}")]
    Connect(#[source] anyhow::Error),
}

/// Duplex forwarding between one call's telephony stream and its AI transport.
pub struct Relay {
    dispatcher: Arc<ToolDispatcher>,
    call_control: Arc<dyn CallControl>,
    connector: Arc<dyn RealtimeConnector>,
    registry: Arc<SessionRegistry>,
    session_config: SessionConfig,
}

impl Relay {
    pub fn new(
        dispatcher: Arc<ToolDispatcher>,
        call_control: Arc<dyn CallControl>,
        connector: Arc<dyn RealtimeConnector>,
        registry: Arc<SessionRegistry>,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            dispatcher,
            call_control,
            connector,
            registry,
            session_config,
        }
    }

    /// Runs both loops until the call ends, then finalizes the session and
    /// arms its deferred cleanup.
    pub async fn run<Src, Snk>(
        &self,
        session: Arc<Session>,
        stream_sid: String,
        source: Src,
        sink: Snk,
    ) -> Result<(), RelayError>
    where
        Src: MediaSource + 'static,
        Snk: MediaSink + 'static,
    {
        let call_sid = session.call_sid().to_string();
        let status = session.status();
        if status != SessionStatus::Created {
            tracing::warn!(call_sid = %call_sid, status = %status, "stream refused");
            return Err(RelayError::NotAttachable {
                call_sid,
                status: status.to_string(),
            });
        }

        let connection = match self.connector.connect(&self.session_config).await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::error!(call_sid = %call_sid, error = %e, "failed to open AI transport");
                session.begin_finalizing();
                self.registry.schedule_cleanup(&session);
                return Err(RelayError::Connect(e));
            }
        };
        let RealtimeConnection {
            client,
            events,
            handle,
        } = connection;
        session.attach_transport(handle);

        if let Err(e) = session.begin_streaming() {
            tracing::warn!(call_sid = %call_sid, error = %e, "session changed state during connect");
            session.close_transport();
            return Err(RelayError::NotAttachable {
                call_sid,
                status: session.status().to_string(),
            });
        }
        tracing::info!(call_sid = %call_sid, stream_sid = %stream_sid, "relay started");

        let mut inbound = tokio::spawn(telephony_to_ai(source, client.clone(), call_sid.clone()));
        let mut outbound = tokio::spawn(ai_to_telephony(AiLoop {
            events,
            sink,
            client,
            session: Arc::clone(&session),
            dispatcher: Arc::clone(&self.dispatcher),
            call_control: Arc::clone(&self.call_control),
            stream_sid,
        }));

        let survivor = tokio::select! {
            _ = &mut inbound => {
                tracing::debug!(call_sid = %call_sid, "telephony loop ended first");
                outbound
            }
            _ = &mut outbound => {
                tracing::debug!(call_sid = %call_sid, "AI loop ended first");
                inbound
            }
        };

        session.begin_finalizing();
        session.close_transport();

        // The survivor is never cancelled: an in-flight tool call finishes
        // within its own timeout and the loop then sees the closed transport.
        if let Err(e) = survivor.await {
            tracing::warn!(call_sid = %call_sid, error = %e, "relay loop panicked");
        }

        self.registry.schedule_cleanup(&session);
        tracing::info!(call_sid = %call_sid, "relay stopped");
        Ok(())
    }
}

async fn telephony_to_ai<Src: MediaSource>(mut source: Src, client: RealtimeClient, call_sid: String) {
    while let Some(frame) = source.next_frame().await {
        match frame {
            Ok(StreamFrame::Media { media }) => {
                let audio = match BASE64_STANDARD.decode(media.payload.as_bytes()) {
                    Ok(audio) => audio,
                    Err(e) => {
                        tracing::debug!(call_sid = %call_sid, error = %e, "dropping undecodable media payload");
                        continue;
                    }
                };
                if let Err(e) = client.append_audio(&audio).await {
                    tracing::info!(call_sid = %call_sid, error = %e, "AI transport gone, stopping telephony loop");
                    break;
                }
            }
            Ok(StreamFrame::Stop) => {
                tracing::info!(call_sid = %call_sid, "media stream stopped");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(call_sid = %call_sid, error = %e, "telephony transport error");
                break;
            }
        }
    }
}

struct AiLoop<Snk> {
    events: mpsc::UnboundedReceiver<ServerEvent>,
    sink: Snk,
    client: RealtimeClient,
    session: Arc<Session>,
    dispatcher: Arc<ToolDispatcher>,
    call_control: Arc<dyn CallControl>,
    stream_sid: String,
}

/// Processes AI events strictly in order; a tool result is sent before the
/// next event is read.
async fn ai_to_telephony<Snk: MediaSink>(mut ai: AiLoop<Snk>) {
    let call_sid = ai.session.call_sid().to_string();
    let mut pending_names: HashMap<String, String> = HashMap::new();

    while let Some(event) = ai.events.recv().await {
        match event {
            ServerEvent::AudioDelta { delta } => {
                if delta.is_empty() {
                    continue;
                }
                if let Err(e) = ai.sink.send_frame(OutboundFrame::media(&ai.stream_sid, delta)).await {
                    tracing::info!(call_sid = %call_sid, error = %e, "telephony transport gone, stopping AI loop");
                    break;
                }
            }
            ServerEvent::OutputItemAdded { item } => {
                if let (Some(call_id), Some(name)) = (item.call_id, item.name) {
                    pending_names.insert(call_id, name);
                }
            }
            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            } => {
                let recovered = pending_names.remove(&call_id);
                let Some(name) = name.filter(|n| !n.is_empty()).or(recovered) else {
                    tracing::warn!(call_sid = %call_sid, call_id = %call_id, "function call without a name");
                    continue;
                };

                let Some(result) = ai.dispatcher.dispatch(&ai.session, &call_id, &name, &arguments).await
                else {
                    continue;
                };

                if let Err(e) = ai.client.function_output(&call_id, result.to_output()).await {
                    tracing::info!(call_sid = %call_sid, error = %e, "AI transport gone before tool result");
                    break;
                }
                if let Err(e) = ai.client.create_response().await {
                    tracing::info!(call_sid = %call_sid, error = %e, "AI transport gone before response.create");
                    break;
                }
            }
            ServerEvent::ResponseDone => {
                if ai.session.take_transfer_signal() {
                    signal_transfer(&ai.session, Arc::clone(&ai.call_control));
                }
            }
            ServerEvent::SpeechStarted => {}
            ServerEvent::Error { error } => {
                tracing::error!(call_sid = %call_sid, error_type = ?error.error_type, code = ?error.code, message = %error.message, "AI transport error event");
            }
            ServerEvent::SessionCreated | ServerEvent::SessionUpdated | ServerEvent::Other => {}
        }
    }
}

fn signal_transfer(session: &Session, call_control: Arc<dyn CallControl>) {
    let call_sid = session.call_sid().to_string();
    let context = session.lead().notes.join("; ");
    tracing::info!(call_sid = %call_sid, "transfer requested, signaling call control");

    tokio::spawn(async move {
        if let Err(e) = call_control.transfer(&call_sid, &context).await {
            tracing::error!(call_sid = %call_sid, error = %e, "call transfer failed");
        }
    });
}
