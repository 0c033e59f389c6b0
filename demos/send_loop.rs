//! Send a message every second and print whatever comes back.
//!
//! ```sh
//! RUST_LOG=info cargo run --example send_loop --features tracing
//! ```

use std::time::Duration;

use serde_json::json;
use socket_client_sdk::{Client, Event};
use tokio::time::interval;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let client = Client::default();
    let mut events = client.subscribe();
    let mut tick = interval(Duration::from_secs(1));
    let mut sequence = 0_u64;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if client.status().is_open() {
                    sequence += 1;
                    client.send(json!({"type": "echo", "message": {"seq": sequence}}))?;
                }
            }
            event = events.recv() => match event {
                Ok(Event::StringMessage(body)) => info!(%body, "text message"),
                Ok(Event::BinaryMessage(bytes)) => info!(len = bytes.len(), "binary message"),
                Ok(_) => {}
                Err(_) => break,
            },
        }
    }

    Ok(())
}
