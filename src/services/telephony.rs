//! Twilio media stream frames and the transport seams the relay runs over.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StartInfo {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    #[serde(default, rename = "callSid")]
    pub call_sid: Option<String>,
    #[serde(default, rename = "customParameters")]
    pub custom_parameters: HashMap<String, String>,
}

impl StartInfo {
    /// Call id echoed back from the TwiML parameters, else Twilio's own.
    pub fn call_sid(&self) -> Option<String> {
        self.custom_parameters
            .get("callSid")
            .filter(|s| !s.is_empty())
            .cloned()
            .or_else(|| self.call_sid.clone().filter(|s| !s.is_empty()))
    }

    pub fn from_number(&self) -> Option<String> {
        self.custom_parameters
            .get("fromNumber")
            .filter(|s| !s.is_empty())
            .cloned()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MediaPayload {
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamFrame {
    Connected,
    Start { start: StartInfo },
    Media { media: MediaPayload },
    Stop,
    Mark,
    #[serde(other)]
    Other,
}

impl StreamFrame {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutboundMedia {
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundFrame {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
}

impl OutboundFrame {
    pub fn media(stream_sid: &str, payload: String) -> Self {
        OutboundFrame::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia { payload },
        }
    }
}

#[async_trait]
pub trait MediaSource: Send {
    /// `None` once the transport has ended.
    async fn next_frame(&mut self) -> Option<anyhow::Result<StreamFrame>>;
}

#[async_trait]
pub trait MediaSink: Send {
    async fn send_frame(&mut self, frame: OutboundFrame) -> anyhow::Result<()>;
}

/// Reads frames until the stream starts. Returns `None` if the transport
/// ends or stops first.
pub async fn wait_for_start<S: MediaSource + ?Sized>(source: &mut S) -> Option<StartInfo> {
    while let Some(frame) = source.next_frame().await {
        match frame {
            Ok(StreamFrame::Start { start }) => return Some(start),
            Ok(StreamFrame::Stop) => return None,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "media stream failed before start");
                return None;
            }
        }
    }
    None
}

// ── WebSocket ──

#[async_trait]
impl MediaSource for SplitStream<WebSocket> {
    async fn next_frame(&mut self) -> Option<anyhow::Result<StreamFrame>> {
        loop {
            match self.next().await? {
                Ok(Message::Text(text)) => match StreamFrame::parse(&text) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping malformed media frame");
                        continue;
                    }
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

#[async_trait]
impl MediaSink for SplitSink<WebSocket, Message> {
    async fn send_frame(&mut self, frame: OutboundFrame) -> anyhow::Result<()> {
        let json = serde_json::to_string(&frame)?;
        self.send(Message::Text(json)).await?;
        Ok(())
    }
}

// ── Channels ──

#[async_trait]
impl MediaSource for mpsc::Receiver<StreamFrame> {
    async fn next_frame(&mut self) -> Option<anyhow::Result<StreamFrame>> {
        self.recv().await.map(Ok)
    }
}

#[async_trait]
impl MediaSink for mpsc::Sender<OutboundFrame> {
    async fn send_frame(&mut self, frame: OutboundFrame) -> anyhow::Result<()> {
        self.send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("telephony transport closed"))
    }
}
