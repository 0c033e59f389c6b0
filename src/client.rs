//! The public client: configuration, autoconnect, and delegation to the
//! connection manager.

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use url::Url;

use crate::Result;
use crate::address::socket_address;
use crate::config::Config;
use crate::connection::{ConnectionManager, SocketStatus};
use crate::envelope::Payload;
use crate::event::Event;

/// A persistent WebSocket client.
///
/// The client keeps one long-lived connection to a single server endpoint,
/// reopens it after unexpected closures, answers server liveness probes,
/// and fans inbound traffic out to subscribers as [`Event`]s.
///
/// Handles are cheap to clone and all observe the same connection.
///
/// # Examples
///
/// ```rust, no_run
/// use socket_client_sdk::{Client, Config, Event};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new(Config::builder().host("example.com").secure(true).build())?;
///     let mut events = client.subscribe();
///
///     while let Ok(event) = events.recv().await {
///         if let Event::StringMessage(body) = event {
///             println!("got: {body}");
///         }
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    config: Config,
    manager: ConnectionManager,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(Config::default()).expect("default configuration must build a valid address")
    }
}

impl Client {
    /// Create a client for the configured endpoint.
    ///
    /// With `autoconnect` set (the default) the connection starts opening
    /// immediately; the call still returns without waiting for it.
    ///
    /// # Errors
    ///
    /// Fails with a validation error when the configured host does not
    /// form a valid connection address.
    pub fn new(config: Config) -> Result<Self> {
        let address = socket_address(&config);
        Url::parse(&address)?;

        let manager = ConnectionManager::new(address, config.clone());
        if config.autoconnect {
            manager.connect()?;
        }

        Ok(Self { config, manager })
    }

    /// The configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the transport if none is owned. No-op while one exists.
    pub fn connect(&self) -> Result<()> {
        self.manager.connect()
    }

    /// Discard any existing transport and open a fresh one.
    pub fn reconnect(&self) -> Result<()> {
        self.manager.reconnect()
    }

    /// Close the transport with a normal-closure reason.
    ///
    /// See [`ConnectionManager::disconnect`].
    pub fn disconnect(&self, stop_reconnecting: bool) -> Result<()> {
        self.manager.disconnect(stop_reconnecting)
    }

    /// Send a payload, fire-and-forget. See [`ConnectionManager::send`].
    pub fn send<P: Into<Payload>>(&self, payload: P) -> Result<()> {
        self.manager.send(payload)
    }

    /// Tear the connection down for good. See
    /// [`ConnectionManager::shutdown`].
    pub fn shutdown(&self) -> Result<()> {
        self.manager.shutdown()
    }

    /// Current state of the owned socket.
    #[must_use]
    pub fn status(&self) -> SocketStatus {
        self.manager.status()
    }

    /// The identifier the server assigned to this session, if any yet.
    #[must_use]
    pub fn client_id(&self) -> Option<Value> {
        self.manager.client_id()
    }

    /// Subscribe to lifecycle and message notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.manager.subscribe()
    }

    /// Subscribe to socket state changes.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<SocketStatus> {
        self.manager.status_receiver()
    }
}
