pub mod messages;
pub mod openai;
pub mod prompt;
pub mod tools;

use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::config::AppConfig;
use messages::{ClientEvent, ServerEvent, SessionConfig, TurnDetection};

const OUTBOUND_BUFFER: usize = 256;

pub const AUDIO_FORMAT: &str = "g711_ulaw";

pub fn session_config(config: &AppConfig) -> SessionConfig {
    SessionConfig {
        modalities: vec!["text".to_string(), "audio".to_string()],
        instructions: prompt::instructions(&config.agent_name, &config.agent_company),
        voice: config.realtime_voice.clone(),
        input_audio_format: AUDIO_FORMAT.to_string(),
        output_audio_format: AUDIO_FORMAT.to_string(),
        turn_detection: TurnDetection::ServerVad {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 600,
        },
        tools: tools::tool_definitions(&config.agent_name),
        tool_choice: "auto".to_string(),
        temperature: 0.7,
    }
}

/// Enqueues client events for the task that owns the AI socket.
#[derive(Clone)]
pub struct RealtimeClient {
    tx: mpsc::Sender<ClientEvent>,
}

impl RealtimeClient {
    pub async fn send(&self, event: ClientEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("realtime transport closed"))
    }

    pub async fn append_audio(&self, audio: &[u8]) -> anyhow::Result<()> {
        self.send(ClientEvent::audio_append(audio)).await
    }

    pub async fn function_output(&self, call_id: &str, output: String) -> anyhow::Result<()> {
        self.send(ClientEvent::function_output(call_id, output))
            .await
            .with_context(|| format!("failed to send output for {call_id}"))
    }

    pub async fn create_response(&self) -> anyhow::Result<()> {
        self.send(ClientEvent::ResponseCreate).await
    }
}

/// Shutdown switch for one AI connection. Closing is idempotent.
pub struct TransportHandle {
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl TransportHandle {
    fn new(shutdown: oneshot::Sender<()>) -> Self {
        Self {
            shutdown: Mutex::new(Some(shutdown)),
        }
    }

    /// Returns true only for the call that actually closed the connection.
    pub fn close(&self) -> bool {
        match self.shutdown.lock().unwrap().take() {
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.lock().unwrap().is_none()
    }
}

/// Bridge-side end of an AI connection.
pub struct RealtimeConnection {
    pub client: RealtimeClient,
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
    pub handle: TransportHandle,
}

/// Socket-side end of an AI connection, driven by the connector's task.
pub struct RealtimePeer {
    pub outbound: mpsc::Receiver<ClientEvent>,
    pub inbound: mpsc::UnboundedSender<ServerEvent>,
    pub shutdown: oneshot::Receiver<()>,
}

impl RealtimeConnection {
    /// Server events are unbounded so a slow tool call never stalls the
    /// socket task and, through it, outbound audio.
    pub fn channel() -> (RealtimeConnection, RealtimePeer) {
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let connection = RealtimeConnection {
            client: RealtimeClient { tx: out_tx },
            events: in_rx,
            handle: TransportHandle::new(shutdown_tx),
        };
        let peer = RealtimePeer {
            outbound: out_rx,
            inbound: in_tx,
            shutdown: shutdown_rx,
        };
        (connection, peer)
    }
}

#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self, session: &SessionConfig) -> anyhow::Result<RealtimeConnection>;

    fn is_configured(&self) -> bool {
        true
    }
}
