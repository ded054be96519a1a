//! Protocol connection with a supervised read loop

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use chatview_protocol::{ClientCommand, Inbound, LineCodec};
use chatview_utils::{ChatviewError, Result};

use super::handler::MessageHandler;

/// Plain-text chat endpoint
pub const DEFAULT_ADDR: &str = "irc.chat.twitch.tv:6667";

/// Connection lifecycle
///
/// `Idle -> Connecting -> CapNegotiating -> Authenticating -> Ready`, then
/// back to `Idle` on failure or through `Disconnecting` on request.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    CapNegotiating,
    Authenticating,
    Ready,
    Disconnecting,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::CapNegotiating => "cap-negotiating",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Disconnecting => "disconnecting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// When to try again after a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed pause between attempts
    pub delay: Duration,
    /// Consecutive failures tolerated; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt follows `failures` consecutive failures
    pub fn allows(&self, failures: u32) -> bool {
        self.max_attempts.map_or(true, |max| failures < max)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// `host:port` of the chat server
    pub addr: String,
    /// Bound on establishing the TCP connection
    pub connect_timeout: Duration,
    /// Bound on waiting for the network task to stop
    pub disconnect_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            connect_timeout: Duration::from_secs(2),
            disconnect_timeout: Duration::from_secs(2),
            retry: RetryPolicy::default(),
        }
    }
}

/// Who to authenticate as and where to go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    /// Token including its `oauth:` prefix
    pub token: String,
    pub username: String,
    /// Channel including its leading `#`
    pub channel: String,
}

/// Validate a user supplied channel name and add the leading `#`
pub fn normalize_channel(name: &str) -> Result<String> {
    let trimmed = name.trim();
    let bare = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if bare.is_empty() || bare.contains(char::is_whitespace) || bare.contains('#') {
        return Err(ChatviewError::InvalidChannel(name.to_string()));
    }
    Ok(format!("#{}", bare))
}

/// State published to the handle and the handler
struct Shared {
    state: watch::Sender<ConnectionState>,
    handler: Arc<dyn MessageHandler>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState, channel: &str) {
        let previous = self.state.send_replace(state);
        if previous != state {
            self.announce(previous, state, channel);
        }
    }

    /// Transition made by the network task
    ///
    /// Never moves the state out of `Disconnecting` or `Closed`, so a
    /// session torn down mid-handshake cannot report itself as ready.
    fn advance(&self, state: ConnectionState, channel: &str) {
        let mut previous = state;
        let changed = self.state.send_if_modified(|current| {
            if *current == state
                || matches!(
                    *current,
                    ConnectionState::Disconnecting | ConnectionState::Closed
                )
            {
                return false;
            }
            previous = std::mem::replace(current, state);
            true
        });
        if changed {
            self.announce(previous, state, channel);
        }
    }

    fn announce(&self, previous: ConnectionState, state: ConnectionState, channel: &str) {
        tracing::debug!(from = %previous, to = %state, channel, "Connection state changed");
        self.handler.on_state(state, channel);
    }

    fn get(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

/// Client connection to the chat server
///
/// All network I/O happens on a spawned supervisor task that owns the
/// socket, runs the handshake and read loop, and reconnects after
/// transport failures. This handle only talks to it through channels.
pub struct Connection {
    settings: ConnectionSettings,
    login: Login,
    shared: Arc<Shared>,
    outgoing: Option<mpsc::UnboundedSender<ClientCommand>>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl Connection {
    pub fn new(settings: ConnectionSettings, login: Login, handler: Arc<dyn MessageHandler>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            settings,
            login,
            shared: Arc::new(Shared { state, handler }),
            outgoing: None,
            cancel: None,
            task: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.get()
    }

    pub fn channel(&self) -> &str {
        &self.login.channel
    }

    pub fn login(&self) -> &Login {
        &self.login
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start the network task and wait for its first attempt
    ///
    /// Returns once the session is `Ready`, with the first attempt's error,
    /// or with a timeout after `connect_timeout`, whichever comes first.
    /// A failed TCP connect keeps being retried in the background according
    /// to the retry policy. Calling this while a session is already running
    /// does nothing.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state() == ConnectionState::Closed {
            return Err(ChatviewError::ConnectionClosed);
        }
        if self.is_running() {
            tracing::debug!("Connect requested while already running");
            return Ok(());
        }

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            settings: self.settings.clone(),
            login: self.login.clone(),
            shared: Arc::clone(&self.shared),
            outgoing: outgoing_rx,
            cancel: cancel.clone(),
            ready: Some(ready_tx),
        };

        self.task = Some(tokio::spawn(supervisor.run()));
        self.outgoing = Some(outgoing_tx);
        self.cancel = Some(cancel);

        let deadline = self.settings.connect_timeout;
        match timeout(deadline, ready_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ChatviewError::ConnectionClosed),
            Err(_) => Err(ChatviewError::ConnectionTimeout {
                millis: deadline.as_millis() as u64,
            }),
        }
    }

    /// Stop the network task and wait for it to finish
    ///
    /// The wait is bounded by the disconnect timeout; a task that does not
    /// stop in time is aborted.
    pub async fn disconnect(&mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };

        self.shared
            .set_state(ConnectionState::Disconnecting, &self.login.channel);
        self.outgoing = None;
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        if timeout(self.settings.disconnect_timeout, &mut task).await.is_err() {
            tracing::warn!("Connection task did not stop in time, aborting");
            task.abort();
        }
        self.shared.set_state(ConnectionState::Idle, &self.login.channel);
    }

    /// Switch to another channel
    ///
    /// Tears down the current session and starts a new one for the
    /// normalized channel, which is returned. Failing to reach the server
    /// is logged rather than returned; reconnects continue in the
    /// background.
    pub async fn join_channel(&mut self, name: &str) -> Result<String> {
        let channel = normalize_channel(name)?;
        self.disconnect().await;
        self.login.channel = channel.clone();

        if let Err(e) = self.connect().await {
            tracing::warn!(channel = %channel, "Failed to join channel: {}", e);
        }
        Ok(channel)
    }

    /// Send a chat message to the current channel
    pub fn send_message(&self, text: &str) -> Result<()> {
        if self.state() != ConnectionState::Ready {
            return Err(ChatviewError::NotConnected);
        }
        let outgoing = self.outgoing.as_ref().ok_or(ChatviewError::NotConnected)?;
        outgoing
            .send(ClientCommand::privmsg(self.login.channel.as_str(), text))
            .map_err(|_| ChatviewError::ConnectionClosed)
    }

    /// Disconnect for good
    pub async fn shutdown(&mut self) {
        self.disconnect().await;
        self.shared.set_state(ConnectionState::Closed, &self.login.channel);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

/// How one session ended
enum SessionEnd {
    Cancelled,
    /// TCP connect failed or timed out
    Unreachable(ChatviewError),
    /// Handshake write failed; not retried
    HandshakeFailed(ChatviewError),
    /// An established session dropped
    Lost(ChatviewError),
}

/// Owns the socket for the lifetime of a `connect()`
struct Supervisor {
    settings: ConnectionSettings,
    login: Login,
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedReceiver<ClientCommand>,
    cancel: CancellationToken,
    /// Reports the outcome of the first attempt to `connect()`
    ready: Option<oneshot::Sender<Result<()>>>,
}

type Transport = Framed<TcpStream, LineCodec>;

impl Supervisor {
    async fn run(mut self) {
        let mut failures = 0u32;

        loop {
            let error = match self.session(&mut failures).await {
                SessionEnd::Cancelled => return,
                SessionEnd::HandshakeFailed(e) => {
                    tracing::error!("Handshake failed: {}", e);
                    self.set_state(ConnectionState::Idle);
                    self.report(Err(e));
                    return;
                }
                SessionEnd::Unreachable(e) => {
                    tracing::warn!(addr = %self.settings.addr, "Connect failed: {}", e);
                    e
                }
                SessionEnd::Lost(e) => {
                    tracing::warn!("Connection lost: {}", e);
                    self.shared.handler.on_connection_lost(&e);
                    e
                }
            };

            failures += 1;
            self.set_state(ConnectionState::Idle);
            let retryable = error.is_retryable();
            self.report(Err(ChatviewError::connection(error.to_string())));

            if !retryable {
                tracing::error!("Not retrying after: {}", error);
                return;
            }
            if !self.settings.retry.allows(failures) {
                tracing::error!(failures, "Giving up after repeated connection failures");
                return;
            }

            tracing::info!(
                delay_ms = self.settings.retry.delay.as_millis() as u64,
                attempt = failures + 1,
                "Reconnecting"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = sleep(self.settings.retry.delay) => {}
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.shared.advance(state, &self.login.channel);
    }

    fn report(&mut self, result: Result<()>) {
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(result);
        }
    }

    async fn session(&mut self, failures: &mut u32) -> SessionEnd {
        self.set_state(ConnectionState::Connecting);

        let addr = self.settings.addr.clone();
        let connect_timeout = self.settings.connect_timeout;
        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
            result = timeout(connect_timeout, TcpStream::connect(&addr)) => match result {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    return SessionEnd::Unreachable(ChatviewError::connection(format!(
                        "Failed to connect to {}: {}",
                        addr, e
                    )))
                }
                Err(_) => {
                    return SessionEnd::Unreachable(ChatviewError::ConnectionTimeout {
                        millis: connect_timeout.as_millis() as u64,
                    })
                }
            },
        };
        tracing::info!(addr = %addr, "Connected");

        let mut framed = Framed::new(stream, LineCodec::new());
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            result = self.handshake(&mut framed) => {
                if let Err(e) = result {
                    return SessionEnd::HandshakeFailed(e);
                }
            }
        }

        *failures = 0;
        self.set_state(ConnectionState::Ready);
        self.report(Ok(()));

        self.read_loop(framed).await
    }

    /// Request capabilities, authenticate and join, in that order
    async fn handshake(&self, framed: &mut Transport) -> Result<()> {
        self.set_state(ConnectionState::CapNegotiating);
        send(framed, ClientCommand::capability_request()).await?;

        self.set_state(ConnectionState::Authenticating);
        send(framed, ClientCommand::Pass(self.login.token.clone())).await?;
        send(framed, ClientCommand::Nick(self.login.username.clone())).await?;
        send(framed, ClientCommand::Join(self.login.channel.clone())).await?;
        Ok(())
    }

    async fn read_loop(&mut self, mut framed: Transport) -> SessionEnd {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return SessionEnd::Cancelled,

                Some(command) = self.outgoing.recv() => {
                    if let Err(e) = send(&mut framed, command).await {
                        tracing::warn!("Failed to send message: {}", e);
                    }
                }

                frame = framed.next() => match frame {
                    Some(Ok(line)) => self.dispatch(&mut framed, &line).await,
                    Some(Err(e)) => {
                        return SessionEnd::Lost(ChatviewError::connection(format!("Read failed: {}", e)));
                    }
                    None => return SessionEnd::Lost(ChatviewError::ConnectionClosed),
                },
            }
        }
    }

    async fn dispatch(&self, framed: &mut Transport, line: &str) {
        if line.is_empty() {
            return;
        }

        let inbound = Inbound::classify(line);
        match &inbound {
            Inbound::Ping { token } => {
                tracing::trace!(token = %token, "Answering keep-alive");
                let probe = ClientCommand::privmsg(self.login.channel.as_str(), " ");
                for reply in [ClientCommand::Pong(token.clone()), probe] {
                    if let Err(e) = send(framed, reply).await {
                        tracing::warn!("Failed to answer keep-alive: {}", e);
                    }
                }
            }
            Inbound::Malformed(line) => {
                tracing::debug!(line = %line, "Dropping malformed chat line");
            }
            _ => {}
        }

        self.shared.handler.handle(line, &inbound);
    }
}

async fn send(framed: &mut Transport, command: ClientCommand) -> Result<()> {
    framed
        .send(command)
        .await
        .map_err(|e| ChatviewError::connection(format!("Write failed: {}", e)))
}
