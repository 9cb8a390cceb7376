// climsync-api: Async Rust client for the Home Assistant REST and WebSocket APIs

pub mod client;
pub mod climate;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::HassClient;
pub use error::Error;
pub use models::{ClimateAttributes, EntityState, TemperatureTarget};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ReconnectConfig, StateChangedEvent, WebSocketHandle};
