//! Connection lifecycle management.
//!
//! A [`ConnectionManager`] is a cheap handle onto a driver task that owns
//! the socket. The driver serializes everything that can touch connection
//! state (caller requests and transport events alike), so at most one
//! socket is ever live per manager and no locking is needed.

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;
use futures::{SinkExt as _, StreamExt as _};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::{Error as TungsteniteError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::close;
use crate::config::Config;
use crate::envelope::{self, Dispatch, Envelope, Payload};
use crate::error::{Error, TransportError};
use crate::event::Event;
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Broadcast channel capacity for notifications.
const BROADCAST_CAPACITY: usize = 1024;

/// Native state of the owned socket.
///
/// [`SocketStatus::Closed`] also covers the case where no socket has been
/// opened yet.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketStatus {
    /// The opening handshake is in flight
    Connecting,
    /// The socket is open for traffic
    Open,
    /// The closing handshake is in flight
    Closing,
    /// No socket is owned
    Closed,
}

impl SocketStatus {
    /// Check if traffic can currently flow.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Caller requests, applied by the driver in arrival order.
#[derive(Debug)]
enum Command {
    Connect { force: bool },
    Disconnect { stop_reconnecting: bool },
    Send(Payload),
    Shutdown,
}

/// Why an established session ended.
enum SessionEnd {
    /// The transport closed; run disconnection handling.
    Closed,
    /// A forced reconnect discards the socket without a close notification.
    Replace,
    /// Every handle is gone; the driver should stop.
    Halt,
}

/// Outcome of a paced wait between reopen attempts.
enum Pause {
    Retry,
    Cancel,
    Halt,
}

/// Manages the lifecycle of one persistent WebSocket connection.
///
/// Handles are cheap to clone and all observe the same connection. See
/// [`crate::Client`] for the configuration-aware entry point.
#[derive(Clone)]
pub struct ConnectionManager {
    /// Request channel into the driver task
    cmd_tx: mpsc::UnboundedSender<Command>,
    /// Watch channel mirroring the socket state
    status_rx: watch::Receiver<SocketStatus>,
    /// Watch channel mirroring the server-assigned session identifier
    client_id_rx: watch::Receiver<Option<Value>>,
    /// Broadcast sender for notifications
    events: broadcast::Sender<Event>,
}

impl ConnectionManager {
    /// Spawn the driver task for `address` and return a handle to it.
    ///
    /// The driver opens nothing until [`connect`](Self::connect) is called.
    pub(crate) fn new(address: String, config: Config) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (status_tx, status_rx) = watch::channel(SocketStatus::Closed);
        let (client_id_tx, client_id_rx) = watch::channel(None);

        let driver = Driver {
            reconnect: config.reconnect,
            config,
            address,
            status: SocketStatus::Closed,
            reconnecting: false,
            shutdown_hook_set: false,
            cmd_rx,
            cmd_weak: cmd_tx.downgrade(),
            status_tx,
            client_id_tx,
            events: events.clone(),
        };
        tokio::spawn(driver.run());

        Self {
            cmd_tx,
            status_rx,
            client_id_rx,
            events,
        }
    }

    /// Open the transport if none is owned.
    ///
    /// When a socket already exists this is a no-op apart from a warning;
    /// use [`reconnect`](Self::reconnect) to replace a live socket.
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect { force: false })
    }

    /// Discard any existing socket and open a fresh one.
    ///
    /// The discarded socket closes without a disconnect notification: its
    /// subscriptions are dropped along with it.
    pub fn reconnect(&self) -> Result<()> {
        self.command(Command::Connect { force: true })
    }

    /// Close the transport with a normal-closure reason.
    ///
    /// With `stop_reconnecting` the automatic-reopen flag is cleared first,
    /// so the closure will not trigger a new connection. The disconnect
    /// notification fires asynchronously once the closing handshake
    /// completes.
    ///
    /// # Errors
    ///
    /// Fails with a validation error when no transport is owned; check
    /// [`status`](Self::status) first.
    pub fn disconnect(&self, stop_reconnecting: bool) -> Result<()> {
        if self.status() == SocketStatus::Closed {
            return Err(Error::validation(
                "no transport to disconnect; check status() first",
            ));
        }
        self.command(Command::Disconnect { stop_reconnecting })
    }

    /// Send a payload, fire-and-forget.
    ///
    /// Text payloads are JSON-encoded, binary payloads pass through. When
    /// the transport is not open the payload is dropped silently; the
    /// [`Event::Sent`] telemetry notification fires either way.
    pub fn send<P: Into<Payload>>(&self, payload: P) -> Result<()> {
        self.command(Command::Send(payload.into()))
    }

    /// Tear the connection down for good: close with a going-away reason,
    /// clear the session identifier, and stop reconnecting.
    ///
    /// This is the same path the SIGINT hook takes on process teardown.
    pub fn shutdown(&self) -> Result<()> {
        self.command(Command::Shutdown)
    }

    /// Current state of the owned socket.
    #[must_use]
    pub fn status(&self) -> SocketStatus {
        *self.status_rx.borrow()
    }

    /// The identifier the server assigned to this session, if any yet.
    #[must_use]
    pub fn client_id(&self) -> Option<Value> {
        self.client_id_rx.borrow().clone()
    }

    /// Subscribe to notifications.
    ///
    /// Each call returns an independent receiver; slow receivers lag and
    /// miss events rather than applying backpressure.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Subscribe to socket state changes.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<SocketStatus> {
        self.status_rx.clone()
    }

    fn command(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .map_err(|_command| TransportError::ManagerGone.into())
    }
}

/// The task-side half of a [`ConnectionManager`]: exclusive owner of the
/// socket and all connection state.
struct Driver {
    config: Config,
    address: String,
    /// Live copy of `config.reconnect`; cleared by an explicit disconnect
    reconnect: bool,
    /// An automatic reopen sequence is in flight
    reconnecting: bool,
    /// Guards one-shot registration of the process-teardown hook
    shutdown_hook_set: bool,
    status: SocketStatus,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    cmd_weak: mpsc::WeakUnboundedSender<Command>,
    status_tx: watch::Sender<SocketStatus>,
    client_id_tx: watch::Sender<Option<Value>>,
    events: broadcast::Sender<Event>,
}

impl Driver {
    /// Idle loop: no socket owned, wait for requests.
    async fn run(mut self) {
        while let Some(command) = self.cmd_rx.recv().await {
            match command {
                Command::Connect { .. } => {
                    self.register_shutdown_hook();
                    if !self.session().await {
                        return;
                    }
                }
                Command::Send(_payload) => {
                    // No transport; the payload is dropped but the
                    // telemetry notification still fires.
                    self.emit(Event::Sent);
                }
                Command::Disconnect { .. } => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("disconnect requested but no transport is owned");
                }
                Command::Shutdown => {
                    // Nothing open, nothing to tear down.
                }
            }
        }
    }

    /// Connection phase: keep a socket alive, reopening per the reconnect
    /// policy, until the connection ends for good. Returns `false` when
    /// the driver should halt entirely.
    async fn session(&mut self) -> bool {
        let mut backoff: ExponentialBackoff = self.config.reconnect_backoff.clone().into();

        loop {
            self.set_status(SocketStatus::Connecting);

            let failed_open = match connect_async(self.address.as_str()).await {
                Ok((socket, _response)) => {
                    backoff.reset();
                    self.set_status(SocketStatus::Open);
                    self.emit(Event::Connected);
                    if self.reconnecting {
                        self.reconnecting = false;
                        self.emit(Event::Reconnected);
                    }
                    #[cfg(feature = "tracing")]
                    if self.config.debug {
                        tracing::debug!(address = %self.address, "transport open");
                    }

                    match self.drive(socket).await {
                        SessionEnd::Replace => continue,
                        SessionEnd::Halt => return false,
                        SessionEnd::Closed => false,
                    }
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(address = %self.address, "unable to connect: {e}");
                    self.emit(Event::Error(e.to_string()));
                    true
                }
            };

            // Disconnection handling: the socket is gone (or never came
            // up). Reopen while the reconnect flag holds.
            self.emit(Event::Disconnected);
            self.set_status(SocketStatus::Closed);
            #[cfg(feature = "tracing")]
            if self.config.debug {
                tracing::debug!("transport closed");
            }

            if !self.reconnect {
                self.reconnecting = false;
                return true;
            }
            self.reconnecting = true;

            // The first reopen after a working connection is immediate;
            // only consecutive failed attempts are paced.
            if failed_open && let Some(delay) = backoff.next_backoff() {
                match self.pause(delay).await {
                    Pause::Retry => {}
                    Pause::Cancel => return true,
                    Pause::Halt => return false,
                }
            }
        }
    }

    /// Pump one open socket until the session ends, applying caller
    /// requests as they arrive.
    async fn drive(&mut self, mut socket: WsStream) -> SessionEnd {
        loop {
            tokio::select! {
                frame = socket.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch_text(&mut socket, text.as_str()).await,
                    Some(Ok(Message::Binary(bytes))) => {
                        self.emit(Event::Message(Payload::Binary(bytes.clone())));
                        self.emit(Event::BinaryMessage(bytes));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        #[cfg(feature = "tracing")]
                        if self.config.debug {
                            tracing::debug!(?frame, "server closed the transport");
                        }
                        #[cfg(not(feature = "tracing"))]
                        let _ = &frame;
                        return SessionEnd::Closed;
                    }
                    Some(Ok(_)) => {
                        // Protocol-level ping/pong frames are answered by
                        // the transport itself.
                    }
                    Some(Err(e)) => {
                        if !matches!(
                            e,
                            TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed
                        ) {
                            #[cfg(feature = "tracing")]
                            tracing::warn!("transport error: {e}");
                            self.emit(Event::Error(e.to_string()));
                        }
                        return SessionEnd::Closed;
                    }
                    None => return SessionEnd::Closed,
                },
                command = self.cmd_rx.recv() => match command {
                    Some(command) => {
                        if let Some(end) = self.apply(&mut socket, command).await {
                            return end;
                        }
                    }
                    None => {
                        // Last handle dropped; leave cleanly.
                        let _closed = socket
                            .close(Some(close::frame(close::GOING_AWAY, "client terminated")))
                            .await;
                        return SessionEnd::Halt;
                    }
                },
            }
        }
    }

    /// Apply one caller request against the live socket.
    async fn apply(&mut self, socket: &mut WsStream, command: Command) -> Option<SessionEnd> {
        match command {
            Command::Connect { force: false } => {
                // Connect is idempotent while a socket exists.
                #[cfg(feature = "tracing")]
                tracing::warn!("already connected; ignoring connect request");
                None
            }
            Command::Connect { force: true } => Some(SessionEnd::Replace),
            Command::Disconnect { stop_reconnecting } => {
                if stop_reconnecting {
                    self.reconnect = false;
                }
                self.set_status(SocketStatus::Closing);
                if let Err(e) = socket
                    .close(Some(close::frame(close::NORMAL, "client disconnecting")))
                    .await
                {
                    if !matches!(
                        e,
                        TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed
                    ) {
                        self.emit(Event::Error(e.to_string()));
                    }
                    return Some(SessionEnd::Closed);
                }
                // Keep pumping until the closing handshake completes.
                None
            }
            Command::Send(payload) => {
                self.transmit(socket, payload).await;
                None
            }
            Command::Shutdown => {
                self.client_id_tx.send_replace(None);
                self.reconnect = false;
                if self.status.is_open() {
                    self.set_status(SocketStatus::Closing);
                    let _closed = socket
                        .close(Some(close::frame(close::GOING_AWAY, "client terminated")))
                        .await;
                }
                None
            }
        }
    }

    /// Route one inbound text frame.
    async fn dispatch_text(&mut self, socket: &mut WsStream, text: &str) {
        match envelope::classify(text) {
            Ok(Dispatch::ClientId(id)) => {
                self.client_id_tx.send_replace(Some(id.clone()));
                #[cfg(feature = "tracing")]
                tracing::debug!(client_id = %id, "session identifier assigned");
                self.emit(Event::ClientId(id));
            }
            Ok(Dispatch::Ping(body)) => {
                self.emit(Event::Ping(body.clone()));
                self.transmit(socket, Payload::from(Envelope::pong(body))).await;
                #[cfg(feature = "tracing")]
                if self.config.debug {
                    tracing::debug!("liveness probe answered");
                }
            }
            Ok(Dispatch::Application(body)) => {
                self.emit(Event::Message(Payload::Text(body.clone())));
                self.emit(Event::StringMessage(body));
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("dropping undecodable text frame: {e}");
                self.emit(Event::Error(e.to_string()));
            }
        }
    }

    /// Write one payload out if the socket is open; drop it otherwise.
    /// The telemetry notification fires in both cases.
    async fn transmit(&mut self, socket: &mut WsStream, payload: Payload) {
        if self.status.is_open() {
            match payload.into_frame() {
                Ok(frame) => {
                    if let Err(e) = socket.send(frame).await {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("send failed: {e}");
                        self.emit(Event::Error(e.to_string()));
                    }
                }
                Err(e) => self.emit(Event::Error(e.to_string())),
            }
        } else {
            #[cfg(feature = "tracing")]
            if self.config.debug {
                tracing::debug!("transport not open; payload dropped");
            }
        }
        self.emit(Event::Sent);
    }

    /// Paced wait before the next reopen attempt, still applying caller
    /// requests so a disconnect can cancel the retry.
    async fn pause(&mut self, delay: Duration) -> Pause {
        let timer = sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                () = &mut timer => return Pause::Retry,
                command = self.cmd_rx.recv() => match command {
                    None => return Pause::Halt,
                    Some(Command::Connect { .. }) => return Pause::Retry,
                    Some(Command::Send(_payload)) => self.emit(Event::Sent),
                    Some(Command::Disconnect { stop_reconnecting }) => {
                        if stop_reconnecting {
                            self.reconnect = false;
                            self.reconnecting = false;
                            return Pause::Cancel;
                        }
                    }
                    Some(Command::Shutdown) => {
                        self.client_id_tx.send_replace(None);
                        self.reconnect = false;
                        self.reconnecting = false;
                        return Pause::Cancel;
                    }
                },
            }
        }
    }

    /// Register the process-teardown hook, once per manager: on SIGINT,
    /// close an open transport with a going-away reason and clear the
    /// session identifier.
    fn register_shutdown_hook(&mut self) {
        if self.shutdown_hook_set {
            return;
        }
        self.shutdown_hook_set = true;

        // A weak handle so the hook alone cannot keep the driver alive.
        let handle = self.cmd_weak.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok()
                && let Some(tx) = handle.upgrade()
            {
                _ = tx.send(Command::Shutdown);
            }
        });
    }

    fn set_status(&mut self, status: SocketStatus) {
        self.status = status;
        _ = self.status_tx.send(status);
    }

    fn emit(&self, event: Event) {
        _ = self.events.send(event);
    }
}
