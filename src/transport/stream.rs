//! Streaming client for the socket adapter
//!
//! The adapter relays Lark events over a long-lived WebSocket. After every
//! (re)connect the client identifies itself with a registration frame; a
//! keep-alive ping goes out on a fixed interval and inbound pings are answered
//! with the same payload.

use super::backoff::BackoffPolicy;
use super::{classify_payload, Inbound};
use crate::error::{Result, SyncError};
use crate::events::EventQueues;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Keep-alive ping interval
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// First frame sent on every connection
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationFrame {
    pub app_id: String,
    pub verification_token: String,
    pub encrypt_key: String,
}

pub struct StreamClient {
    endpoint: String,
    registration: String,
    queues: EventQueues,
    backoff: BackoffPolicy,
    keepalive: Duration,
}

impl StreamClient {
    pub fn new(
        endpoint: impl Into<String>,
        frame: &RegistrationFrame,
        queues: EventQueues,
    ) -> Result<Self> {
        let registration = serde_json::to_string(frame)
            .map_err(|e| SyncError::Transport(format!("cannot encode registration: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            registration,
            queues,
            backoff: BackoffPolicy::default(),
            keepalive: KEEPALIVE_INTERVAL,
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Stay connected forever. Returns only when reconnecting gives up.
    pub async fn run(&self) -> Result<()> {
        let mut socket = self.connect().await?;
        loop {
            self.session(&mut socket).await;
            warn!(endpoint = %self.endpoint, "Stream connection lost, reconnecting");
            socket = self.connect().await?;
        }
    }

    /// Connect and register, retrying with exponential backoff.
    async fn connect(&self) -> Result<Socket> {
        let mut backoff = self.backoff.start();
        loop {
            match self.try_connect().await {
                Ok(socket) => {
                    info!(endpoint = %self.endpoint, "Connected and registered with stream adapter");
                    return Ok(socket);
                }
                Err(e) => {
                    let Some(delay) = backoff.next_delay() else {
                        return Err(SyncError::Transport(format!(
                            "giving up on {}: {e}",
                            self.endpoint
                        )));
                    };
                    warn!(endpoint = %self.endpoint, "Stream connect failed, retrying in {:?}: {}", delay, e);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_connect(&self) -> Result<Socket> {
        let (mut socket, _) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        socket
            .send(Message::Text(self.registration.clone().into()))
            .await
            .map_err(|e| SyncError::Transport(format!("registration failed: {e}")))?;
        Ok(socket)
    }

    /// Serve one connection until it drops.
    async fn session(&self, socket: &mut Socket) {
        let mut keepalive = interval(self.keepalive);
        // Skip the first immediate tick
        keepalive.tick().await;

        loop {
            tokio::select! {
                frame = socket.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.forward(text.as_str().as_bytes()).await,
                    Some(Ok(Message::Binary(bytes))) => self.forward(&bytes).await,
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        debug!("Keep-alive acknowledged");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "Stream adapter closed the connection");
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        warn!("Stream read failed: {}", e);
                        return;
                    }
                    None => return,
                },
                _ = keepalive.tick() => {
                    if socket.send(Message::Ping(vec![].into())).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// Classify one frame and queue it. Bad frames are logged and skipped.
    async fn forward(&self, raw: &[u8]) {
        match classify_payload(raw) {
            Ok(Inbound::Event(message)) => {
                debug!(event_id = %message.event_id(), event_type = %message.event_type(), "Received stream event");
                if let Err(e) = self.queues.push(message).await {
                    warn!("Dropping stream event: {}", e);
                }
            }
            Ok(Inbound::Ignored(event_type)) => {
                debug!(event_type = %event_type, "Ignoring stream event");
            }
            Ok(Inbound::Challenge(_)) => {
                debug!("Ignoring url verification on stream");
            }
            Err(e) => warn!("Skipping undecodable stream frame: {}", e),
        }
    }
}
