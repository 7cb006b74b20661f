use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};

use crate::config::{FeedConfig, ReconnectConfig};
use crate::error::{Error, Result};
use crate::types::{Channel, InboundMessage, MessageKind};
use crate::websocket::dispatcher::{LifecycleEvent, MessageDispatcher};
use crate::websocket::session::{cancelled, ConnectionSession};
use crate::websocket::subscription::SubscriptionController;
use crate::websocket::transport::{Connector, TungsteniteConnector};

/// Backoff calculator; a multiplier of 1.0 gives a fixed delay
#[derive(Debug, Clone)]
struct Backoff {
    initial_delay: Duration,
    current_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl Backoff {
    fn new(config: &ReconnectConfig) -> Self {
        Self {
            initial_delay: config.delay,
            current_delay: config.delay,
            max_delay: config.max_delay.max(config.delay),
            multiplier: config.multiplier,
        }
    }

    /// Get the next delay duration
    fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay;
        self.current_delay = std::cmp::min(
            Duration::from_secs_f64(delay.as_secs_f64() * self.multiplier),
            self.max_delay,
        );
        delay
    }

    /// Reset the backoff to initial delay
    fn reset(&mut self) {
        self.current_delay = self.initial_delay;
    }
}

/// Cooperative cancellation for a running feed
///
/// Cloneable and usable from any task. The running epoch notices the
/// signal at its next suspension point and unwinds.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Keeps a feed connected: one [`ConnectionSession`] at a time, a backoff
/// delay after each failure, forever
///
/// Handlers registered on the dispatcher survive reconnects; subscriptions
/// do not, every epoch subscribes afresh.
///
/// # Example
///
/// ```no_run
/// use bitmex_ws::{Channel, ChannelKind, FeedConfig, InboundMessage, MessageKind, ReconnectSupervisor};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let channels = vec![Channel::new(ChannelKind::Trade, "XBTUSD")];
///     let mut feed = ReconnectSupervisor::new(FeedConfig::default(), channels)?;
///
///     feed.on(MessageKind::Action, |msg| {
///         if let InboundMessage::Action(action) = msg {
///             println!("{} {} rows", action.action, action.data.len());
///         }
///     });
///
///     feed.start().await?;
///     Ok(())
/// }
/// ```
pub struct ReconnectSupervisor<C: Connector = TungsteniteConnector> {
    config: FeedConfig,
    connector: C,
    channels: Vec<Channel>,
    dispatcher: MessageDispatcher,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    epochs: u64,
}

impl ReconnectSupervisor<TungsteniteConnector> {
    /// Create a supervisor using the tokio-tungstenite transport
    ///
    /// Fails synchronously on caller-input errors: an empty channel set,
    /// secure channels without authentication, or missing credentials.
    pub fn new(config: FeedConfig, channels: Vec<Channel>) -> Result<Self> {
        Self::with_connector(config, channels, TungsteniteConnector)
    }
}

impl<C: Connector> ReconnectSupervisor<C> {
    pub fn with_connector(config: FeedConfig, channels: Vec<Channel>, connector: C) -> Result<Self> {
        config.validate()?;
        SubscriptionController::validate(&channels, config.should_auth)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config,
            connector,
            channels,
            dispatcher: MessageDispatcher::new(),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            epochs: 0,
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Number of epochs started so far
    pub fn epochs(&self) -> u64 {
        self.epochs
    }

    pub fn dispatcher_mut(&mut self) -> &mut MessageDispatcher {
        &mut self.dispatcher
    }

    /// Register a message handler; see [`MessageDispatcher::on`]
    pub fn on<F>(&mut self, kind: MessageKind, handler: F) -> &mut Self
    where
        F: FnMut(&InboundMessage) + Send + 'static,
    {
        self.dispatcher.on(kind, handler);
        self
    }

    /// Register a lifecycle handler; see [`MessageDispatcher::on_lifecycle`]
    pub fn on_lifecycle<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&LifecycleEvent) + Send + 'static,
    {
        self.dispatcher.on_lifecycle(handler);
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Run epochs until shut down
    ///
    /// Connection failures never end the loop. Returns `Ok(())` after a
    /// shutdown, or [`Error::ReconnectFailed`] when `max_attempts`
    /// consecutive epochs failed.
    pub async fn start(&mut self) -> Result<()> {
        let mut backoff = Backoff::new(&self.config.reconnect);
        let mut failures: u32 = 0;

        loop {
            if *self.shutdown_rx.borrow() {
                info!(epochs = self.epochs, "feed shut down");
                return Ok(());
            }

            self.epochs += 1;
            let epoch = self.epochs;
            let mut session = ConnectionSession::new(
                epoch,
                &self.config,
                &self.connector,
                &self.channels,
                &mut self.dispatcher,
                self.shutdown_rx.clone(),
            );
            let error = session.run().await;
            let reached_open = session.reached_open();

            if matches!(error, Error::Cancelled) {
                info!(epochs = self.epochs, "feed shut down");
                return Ok(());
            }
            error!(epoch, error = %error, "connection error");

            if reached_open {
                backoff.reset();
                failures = 0;
            }
            failures += 1;

            if let Some(max) = self.config.reconnect.max_attempts {
                if failures >= max {
                    return Err(Error::ReconnectFailed {
                        attempts: failures,
                        last_error: error.to_string(),
                    });
                }
            }

            let delay = backoff.next_delay();
            info!(attempt = failures, delay = ?delay, "reconnecting");
            self.dispatcher.emit_lifecycle(&LifecycleEvent::Reconnecting {
                attempt: failures,
                delay,
            });

            tokio::select! {
                biased;
                _ = cancelled(&mut self.shutdown_rx) => {
                    info!(epochs = self.epochs, "feed shut down");
                    return Ok(());
                }
                _ = sleep(delay) => {}
            }
        }
    }
}

impl<C: Connector> std::fmt::Debug for ReconnectSupervisor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectSupervisor")
            .field("channels", &self.channels)
            .field("epochs", &self.epochs)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
