//! # bitmex-ws
//!
//! A Rust client for the BitMEX realtime WebSocket feed.
//!
//! The crate keeps one subscription alive across network failures:
//! - Signed connection handshakes for private channels
//! - Batched subscription requests with per-channel acknowledgment tracking
//! - Lenient classification of every inbound frame
//! - Heartbeat pings and liveness detection
//! - Automatic reconnects with a configurable backoff
//!
//! ## Example
//!
//! ```no_run
//! use bitmex_ws::{ChannelKind, FeedConfig, Instrument, MessageKind, ReconnectSupervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FeedConfig::default();
//!     let instrument = Instrument::new("XBTUSD", [ChannelKind::Quote], config.should_auth)?;
//!
//!     let mut feed = ReconnectSupervisor::new(config, instrument.into_channels())?;
//!     feed.on(MessageKind::Action, |msg| println!("{:?}", msg));
//!     feed.start().await?;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod config;
pub mod error;
pub mod signing;
pub mod types;
pub mod websocket;

// Re-export commonly used types
pub use config::{FeedConfig, ReconnectConfig};
pub use error::{Error, Result};
pub use types::{
    Action, ActionMessage, Channel, ChannelKind, ErrorMessage, InboundMessage, Instrument,
    MessageKind, SubscribeAck,
};

// Re-export the feed
pub use websocket::{LifecycleEvent, MessageDispatcher, ReconnectSupervisor, ShutdownHandle};
