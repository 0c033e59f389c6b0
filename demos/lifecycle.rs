//! Observe the full connection lifecycle against a local server.
//!
//! Point it at any WebSocket server (default `ws://localhost:3000`) and
//! watch connect/disconnect/reconnect notifications as you restart the
//! server.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=debug cargo run --example lifecycle --features tracing
//! ```

use socket_client_sdk::{Client, Config, Event};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let host = std::env::var("SOCKET_HOST").unwrap_or_else(|_| "localhost".to_owned());
    let port = std::env::var("SOCKET_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let client = Client::new(Config::builder().host(host).port(port).build())?;
    let mut events = client.subscribe();

    info!(status = ?client.status(), "client started");

    while let Ok(event) = events.recv().await {
        match event {
            Event::Connected => info!("connected"),
            Event::Reconnected => info!("reconnected after a lost connection"),
            Event::Disconnected => info!("disconnected"),
            Event::ClientId(id) => info!(%id, "session identifier assigned"),
            Event::Ping(body) => info!(%body, "liveness probe answered"),
            Event::Error(reason) => info!(%reason, "transport error"),
            _ => {}
        }
    }

    Ok(())
}
