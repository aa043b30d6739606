use anyhow::Context;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::messages::{ClientEvent, ServerEvent, SessionConfig};
use super::{RealtimeConnection, RealtimeConnector, RealtimePeer};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct OpenAiRealtimeConnector {
    api_key: String,
    url: String,
}

impl OpenAiRealtimeConnector {
    pub fn new(api_key: String, url: String) -> Self {
        Self { api_key, url }
    }
}

#[async_trait]
impl RealtimeConnector for OpenAiRealtimeConnector {
    async fn connect(&self, session: &SessionConfig) -> anyhow::Result<RealtimeConnection> {
        anyhow::ensure!(!self.api_key.is_empty(), "OPENAI_API_KEY not configured");

        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .context("invalid realtime URL")?;
        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .context("invalid API key header")?,
        );
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .context("failed to connect to realtime API")?;
        let (mut sink, stream) = socket.split();

        let update = serde_json::to_string(&ClientEvent::SessionUpdate {
            session: Box::new(session.clone()),
        })?;
        sink.send(Message::Text(update))
            .await
            .context("failed to send session.update")?;

        tracing::info!(url = %self.url, "realtime session opened");

        let (connection, peer) = RealtimeConnection::channel();
        tokio::spawn(run_socket(sink, stream, peer));
        Ok(connection)
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Sole owner of the socket: writes queued client events, forwards server
/// events, and exits on shutdown or when either side goes away.
async fn run_socket(
    mut sink: SplitSink<Socket, Message>,
    mut stream: SplitStream<Socket>,
    mut peer: RealtimePeer,
) {
    loop {
        tokio::select! {
            biased;

            _ = &mut peer.shutdown => {
                tracing::debug!("realtime connection shutdown requested");
                break;
            }

            outbound = peer.outbound.recv() => {
                let Some(event) = outbound else {
                    break;
                };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode realtime event");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json)).await {
                    tracing::warn!(error = %e, "realtime send failed");
                    break;
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let event = ServerEvent::parse(&text);
                        if matches!(event, ServerEvent::SessionCreated | ServerEvent::SessionUpdated) {
                            tracing::debug!("realtime session acknowledged");
                        }
                        if peer.inbound.send(event).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            tracing::warn!(error = %e, "realtime pong failed");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(frame = ?frame, "realtime socket closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "realtime socket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = sink.close().await;
}
