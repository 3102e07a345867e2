use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{domain::Message, Result};

/// Write half of a duplex text-frame stream.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, text: &str) -> Result<()>;

    /// Close the stream. The read half observes the end on its next read.
    async fn close(&mut self) -> Result<()>;
}

/// Read half of a duplex text-frame stream.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame; `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<String>>;
}

/// Both halves of an opened stream.
pub struct Duplex {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Hexagonal port for the transport: opens a duplex message stream to a URL.
///
/// The WebSocket/TLS implementation lives in the `gbc-twitch` adapter crate.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Duplex>;
}

/// Application-facing chat connection.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Start a session. Messages sent on `outbound` are rate limited and
    /// written to the platform; the returned channel yields received lines
    /// and closes when the session ends.
    async fn connect(&self, outbound: mpsc::Receiver<Message>) -> Result<mpsc::Receiver<Message>>;

    /// Tear down the active session. Calling it again is a no-op.
    async fn disconnect(&self) -> Result<()>;
}
