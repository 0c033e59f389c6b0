#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod address;
pub mod client;
pub mod close;
pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod event;

pub use client::Client;
pub use config::{Config, ReconnectConfig};
pub use connection::{ConnectionManager, SocketStatus};
pub use envelope::{Envelope, Payload};
pub use event::Event;
/// Raw byte buffer type used for binary payloads, re-exported from the
/// transport layer.
pub use tokio_tungstenite::tungstenite::Bytes;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;
