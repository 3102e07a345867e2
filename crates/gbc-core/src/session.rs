//! Protocol session: handshake, receive loop and rate-limited send loop.
//!
//! State machine:
//! `Idle -> Connecting -> Authenticating -> Streaming -> Closed`.
//! `Closed` is terminal; reconnecting requires a fresh client. The session
//! ends either through `disconnect()` or a failed write. Both close the
//! transport, which stops the receive loop and closes the inbound channel.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    domain::{Message, Platform},
    errors::Error,
    limiter::StreamStage,
    modes::RateMode,
    pipeline::RateLimitPipeline,
    ports::{ChatClient, Connector, Duplex, FrameSink, FrameSource},
    protocol::{self, Capabilities},
    Result,
};

/// Login name and OAuth token of the bot account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub name: String,
    pub token: String,
}

impl Credentials {
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Everything a session needs to log in and pace its output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub server_url: String,
    pub credentials: Credentials,
    /// Channels joined after login, in order.
    pub channels: Vec<String>,
    pub capabilities: Capabilities,
    pub mode: RateMode,
}

impl SessionConfig {
    /// Defaults: public Twitch endpoint, the account's own channel, no
    /// capabilities, standard limits.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            server_url: protocol::DEFAULT_SERVER_URL.to_string(),
            channels: vec![credentials.name.clone()],
            credentials,
            capabilities: Capabilities::default(),
            mode: RateMode::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(Error::Config("server url must not be empty".to_string()));
        }
        let name = &self.credentials.name;
        if name.trim().is_empty() || name.contains(char::is_whitespace) {
            return Err(Error::Config(format!("invalid login name: {name:?}")));
        }
        if self.credentials.token.trim().is_empty() {
            return Err(Error::Config("token must not be empty".to_string()));
        }
        if let Some(bad) = self
            .channels
            .iter()
            .find(|c| c.trim_start_matches('#').trim().is_empty() || c.contains(' '))
        {
            return Err(Error::Config(format!("invalid channel name: {bad:?}")));
        }
        Ok(())
    }

    /// Login sequence: credential, identity, capability requests, joins.
    pub fn handshake_lines(&self) -> Vec<String> {
        let mut lines = vec![
            protocol::credential_line(&self.credentials.token),
            protocol::identity_line(&self.credentials.name),
        ];
        lines.extend(self.capabilities.request_lines());
        lines.extend(self.channels.iter().map(|c| protocol::join_line(c)));
        lines
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticating,
    Streaming,
    Closed,
}

/// State shared by the client handle and both loops.
struct Shared {
    state: std::sync::Mutex<SessionState>,
    sink: Mutex<Option<Box<dyn FrameSink>>>,
    closed: CancellationToken,
}

impl Shared {
    fn state(&self) -> SessionState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Move `from -> to`; false if the session is no longer in `from`.
    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard != from {
            return false;
        }
        *guard = to;
        true
    }

    async fn write(&self, line: &str) -> Result<()> {
        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Err(Error::Transport("session is closed".to_string()));
        };
        debug!("< {line}");
        // A stalled write must not keep teardown from reaching the sink.
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => {
                Err(Error::Transport("session is closed".to_string()))
            }
            res = sink.send(line) => res,
        }
    }

    /// Close the transport. Safe to call any number of times.
    async fn teardown(&self) {
        {
            let mut guard = match self.state.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = SessionState::Closed;
        }
        self.closed.cancel();

        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                warn!("failed to close connection: {e}");
            }
        }
    }
}

/// Chat session over one duplex stream.
pub struct SessionClient {
    cfg: Arc<SessionConfig>,
    connector: Arc<dyn Connector>,
    pipeline: RateLimitPipeline,
    shared: Arc<Shared>,
}

impl SessionClient {
    pub fn new(cfg: SessionConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let pipeline = RateLimitPipeline::new(cfg.mode)?;
        Self::with_pipeline(cfg, connector, pipeline)
    }

    /// Use a custom outbound pipeline (e.g. with an injected clock).
    pub fn with_pipeline(
        cfg: SessionConfig,
        connector: Arc<dyn Connector>,
        pipeline: RateLimitPipeline,
    ) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg: Arc::new(cfg),
            connector,
            pipeline,
            shared: Arc::new(Shared {
                state: std::sync::Mutex::new(SessionState::Idle),
                sink: Mutex::new(None),
                closed: CancellationToken::new(),
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.cfg
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    async fn open(&self) -> Result<Box<dyn FrameSource>> {
        let url = &self.cfg.server_url;
        let Duplex { sink, source } = match self.connector.connect(url).await {
            Ok(duplex) => duplex,
            Err(e) => {
                // No session was established, so the client may be reused.
                self.shared
                    .transition(SessionState::Connecting, SessionState::Idle);
                return Err(Error::Connection(format!("failed to connect to {url}: {e}")));
            }
        };
        *self.shared.sink.lock().await = Some(sink);

        if !self
            .shared
            .transition(SessionState::Connecting, SessionState::Authenticating)
        {
            self.shared.teardown().await;
            return Err(Error::Connection(
                "session closed while connecting".to_string(),
            ));
        }

        info!("logging in as '{}'", self.cfg.credentials.name);
        for line in self.cfg.handshake_lines() {
            if let Err(e) = self.shared.write(&line).await {
                self.shared.teardown().await;
                return Err(Error::Handshake(Box::new(e)));
            }
        }

        if !self
            .shared
            .transition(SessionState::Authenticating, SessionState::Streaming)
        {
            self.shared.teardown().await;
            return Err(Error::Connection(
                "session closed during handshake".to_string(),
            ));
        }

        Ok(source)
    }
}

#[async_trait]
impl ChatClient for SessionClient {
    async fn connect(&self, outbound: mpsc::Receiver<Message>) -> Result<mpsc::Receiver<Message>> {
        if !self
            .shared
            .transition(SessionState::Idle, SessionState::Connecting)
        {
            return Err(Error::Connection(format!(
                "already connected (state: {:?})",
                self.shared.state()
            )));
        }

        let source = self.open().await?;

        let (inbound_tx, inbound_rx) = mpsc::channel(1);
        tokio::spawn(receive_loop(self.shared.clone(), source, inbound_tx));
        tokio::spawn(send_loop(
            self.shared.clone(),
            self.pipeline.apply(outbound),
        ));

        Ok(inbound_rx)
    }

    async fn disconnect(&self) -> Result<()> {
        match self.shared.state() {
            SessionState::Idle | SessionState::Closed => {
                debug!("disconnect requested without an active session");
            }
            _ => {
                self.shared.teardown().await;
                info!("disconnected");
            }
        }
        Ok(())
    }
}

const PLATFORM: Platform = Platform::Twitch;

async fn receive_loop(
    shared: Arc<Shared>,
    mut source: Box<dyn FrameSource>,
    inbound: mpsc::Sender<Message>,
) {
    'frames: loop {
        let frame = tokio::select! {
            biased;
            _ = shared.closed.cancelled() => break,
            frame = source.next_frame() => frame,
        };

        let text = match frame {
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                // Also the normal path when the connection is closed locally.
                debug!("read failed: {e}; closing listener");
                break;
            }
            None => {
                debug!("stream ended; closing listener");
                break;
            }
        };

        for line in protocol::split_frame(&text) {
            debug!("> {line}");

            if protocol::is_heartbeat_probe(line) {
                if let Err(e) = shared.write(protocol::HEARTBEAT_REPLY).await {
                    error!("failed to answer heartbeat: {e}");
                    shared.teardown().await;
                    break 'frames;
                }
            }

            tokio::select! {
                biased;
                _ = shared.closed.cancelled() => break 'frames,
                // A dropped consumer is not fatal: heartbeats must keep flowing.
                _ = inbound.send(Message::new(PLATFORM, line)) => {}
            }
        }
    }
    info!("listener stopped");
}

async fn send_loop(shared: Arc<Shared>, mut limited: mpsc::Receiver<Message>) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = shared.closed.cancelled() => break,
            msg = limited.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        if msg.platform != PLATFORM {
            debug!("skipping message for {}", msg.platform);
            continue;
        }
        if let Err(e) = shared.write(&msg.raw).await {
            error!("failed to send message: {e}");
            break;
        }
    }

    // Closing the transport also stops the listener.
    shared.teardown().await;
}
