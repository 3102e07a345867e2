//! Twitch adapter (tokio-tungstenite).
//!
//! This crate implements the `gbc-core` transport ports over a WebSocket
//! connection to the Twitch IRC gateway.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

pub mod bridge;

use gbc_core::{
    errors::Error,
    ports::{Connector, Duplex, FrameSink, FrameSource},
    session::{SessionClient, SessionConfig},
    Result,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections (plain or TLS, depending on the URL scheme).
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }

    fn map_err(e: tokio_tungstenite::tungstenite::Error) -> Error {
        Error::Transport(format!("websocket error: {e}"))
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Duplex> {
        let (stream, response) = connect_async(url).await.map_err(Self::map_err)?;
        debug!("websocket handshake with {url} answered {}", response.status());

        let (sink, source) = stream.split();
        Ok(Duplex {
            sink: Box::new(WsSink { sink }),
            source: Box::new(WsSource { source }),
        })
    }
}

struct WsSink {
    sink: SplitSink<WsStream, WsMessage>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(WsMessage::Text(text.to_string()))
            .await
            .map_err(WsConnector::map_err)
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await.map_err(WsConnector::map_err)
    }
}

struct WsSource {
    source: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            let msg = match self.source.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(WsConnector::map_err(e))),
            };
            match msg {
                WsMessage::Text(text) => return Some(Ok(text)),
                WsMessage::Binary(bytes) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                WsMessage::Close(frame) => {
                    debug!("server closed the connection: {frame:?}");
                    return None;
                }
                // Control frames are answered by tungstenite itself.
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            }
        }
    }
}

/// Session client connected through [`WsConnector`].
pub fn client(cfg: SessionConfig) -> Result<SessionClient> {
    SessionClient::new(cfg, Arc::new(WsConnector::new()))
}
