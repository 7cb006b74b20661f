//! Realtime feed plumbing.
//!
//! A [`ReconnectSupervisor`] owns the feed. Each connection attempt is one
//! [`ConnectionSession`] (an "epoch"): handshake, subscribe, receive until
//! something fails. Inbound frames are classified and fanned out by the
//! [`MessageDispatcher`].
//!
//! # Connection Management
//!
//! BitMEX drops connections that go quiet. With `heartbeat` enabled the
//! session sends a ping every `ping_interval`, regardless of traffic, and
//! treats a missing pong within `ping_timeout` as a dead link. A handshake
//! that does not complete within `connect_timeout` fails the same way. Any
//! failure ends the epoch; the supervisor waits out the backoff delay and
//! starts a fresh one.

mod dispatcher;
#[cfg(test)]
mod mock;
mod session;
mod subscription;
mod supervisor;
mod transport;

pub use dispatcher::{classify, LifecycleEvent, MessageDispatcher};
pub use session::{ConnectionSession, ConnectionState};
pub use subscription::{Subscription, SubscriptionController, SubscriptionStatus};
pub use supervisor::{ReconnectSupervisor, ShutdownHandle};
pub use transport::{Connector, Frame, Transport, TungsteniteConnector, WsTransport};

// Re-export commonly used types for convenience
pub use crate::types::{Channel, ChannelKind, InboundMessage, MessageKind};
