use std::fmt;

use tokio::sync::watch;
use tokio::time::{interval_at, sleep_until, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::signing::AuthToken;
use crate::types::{Channel, InboundMessage};
use crate::websocket::dispatcher::{classify, LifecycleEvent, MessageDispatcher};
use crate::websocket::subscription::SubscriptionController;
use crate::websocket::transport::{Connector, Frame, Transport};

/// Connection state of one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Transport handshake in progress
    Connecting,
    /// Connected, no acknowledgments outstanding
    Open,
    /// Connected, acknowledgments still outstanding; frames are dispatched
    Subscribing,
    /// Releasing the transport
    Closing,
    /// The epoch failed
    Faulted,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Subscribing => write!(f, "Subscribing"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Resolves once the shutdown flag is set; never resolves if the sender is gone
pub(crate) async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn next_ping(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// One connection epoch: handshake, subscribe, receive until failure
///
/// [`run`](Self::run) never succeeds. It returns the error that ended the
/// epoch, after the transport has been released and the subscription set
/// discarded.
pub struct ConnectionSession<'a, C: Connector> {
    epoch: u64,
    config: &'a FeedConfig,
    connector: &'a C,
    channels: &'a [Channel],
    dispatcher: &'a mut MessageDispatcher,
    shutdown: watch::Receiver<bool>,
    state: ConnectionState,
    transitions: Vec<ConnectionState>,
    subscriptions: SubscriptionController,
}

impl<'a, C: Connector> ConnectionSession<'a, C> {
    pub fn new(
        epoch: u64,
        config: &'a FeedConfig,
        connector: &'a C,
        channels: &'a [Channel],
        dispatcher: &'a mut MessageDispatcher,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            epoch,
            config,
            connector,
            channels,
            dispatcher,
            shutdown,
            state: ConnectionState::Disconnected,
            transitions: Vec::new(),
            subscriptions: SubscriptionController::new(config.should_auth),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Every state entered so far, in order
    pub fn transitions(&self) -> &[ConnectionState] {
        &self.transitions
    }

    /// Whether the transport handshake succeeded during this epoch
    pub fn reached_open(&self) -> bool {
        self.transitions.contains(&ConnectionState::Open)
    }

    pub fn subscriptions(&self) -> &SubscriptionController {
        &self.subscriptions
    }

    fn transition(&mut self, next: ConnectionState) {
        trace!(epoch = self.epoch, from = %self.state, to = %next, "state change");
        self.state = next;
        self.transitions.push(next);
    }

    /// Drive the epoch to completion and return why it ended
    pub async fn run(&mut self) -> Error {
        self.transition(ConnectionState::Connecting);
        self.dispatcher
            .emit_lifecycle(&LifecycleEvent::Connecting { epoch: self.epoch });

        let error = match self.handshake().await {
            Ok(mut transport) => {
                self.transition(ConnectionState::Open);
                info!(epoch = self.epoch, "websocket opened");
                self.dispatcher
                    .emit_lifecycle(&LifecycleEvent::Opened { epoch: self.epoch });

                let error = self.receive_loop(&mut transport).await;
                self.unwind(&error);
                if let Err(e) = transport.close().await {
                    debug!(epoch = self.epoch, error = %e, "transport close failed");
                }
                error
            }
            Err(error) => {
                self.unwind(&error);
                error
            }
        };

        self.subscriptions = SubscriptionController::new(self.config.should_auth);
        self.transition(ConnectionState::Disconnected);
        match &error {
            Error::Cancelled => info!(epoch = self.epoch, "websocket closed on shutdown"),
            other => info!(epoch = self.epoch, error = %other, "websocket closed"),
        }
        self.dispatcher.emit_lifecycle(&LifecycleEvent::Closed {
            epoch: self.epoch,
            error: error.to_string(),
        });

        error
    }

    fn unwind(&mut self, error: &Error) {
        if !matches!(error, Error::Cancelled) {
            self.transition(ConnectionState::Faulted);
        }
        self.transition(ConnectionState::Closing);
    }

    async fn handshake(&mut self) -> Result<C::Transport> {
        self.config.validate()?;
        let url = self.config.ws_url()?;
        let headers = if self.config.should_auth {
            let (api_key, api_secret) = self.config.credentials()?;
            AuthToken::for_handshake(api_key, api_secret).headers()
        } else {
            Vec::new()
        };

        info!(epoch = self.epoch, %url, auth = self.config.should_auth, "connecting");

        let connect_timeout = self.config.connect_timeout;
        tokio::select! {
            biased;
            _ = cancelled(&mut self.shutdown) => Err(Error::Cancelled),
            result = timeout(connect_timeout, self.connector.connect(&url, &headers)) => {
                result.unwrap_or_else(|_| {
                    warn!(epoch = self.epoch, timeout = ?connect_timeout, "handshake timed out");
                    Err(Error::WebSocket("handshake timed out".to_string()))
                })
            }
        }
    }

    async fn receive_loop(&mut self, transport: &mut C::Transport) -> Error {
        let request = match self.subscriptions.request_channels(self.channels) {
            Ok(request) => request,
            Err(e) => return e,
        };
        let payload = match serde_json::to_string(&request) {
            Ok(payload) => payload,
            Err(e) => return e.into(),
        };
        self.transition(ConnectionState::Subscribing);
        if let Err(e) = transport.send(Frame::Text(payload)).await {
            return e;
        }
        info!(epoch = self.epoch, channels = ?request.args, "subscribe request sent");

        let ping_interval = self.config.ping_interval;
        let ping_timeout = self.config.ping_timeout;
        let mut ping_timer = self.config.heartbeat.then(|| {
            let mut timer = interval_at(Instant::now() + ping_interval, ping_interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });
        let mut pong_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut self.shutdown) => return Error::Cancelled,
                _ = sleep_until(pong_deadline.unwrap_or_else(Instant::now)), if pong_deadline.is_some() => {
                    warn!(epoch = self.epoch, timeout = ?ping_timeout, "keepalive timed out");
                    return Error::LivenessTimeout(ping_timeout);
                }
                _ = next_ping(&mut ping_timer), if pong_deadline.is_none() => {
                    trace!(epoch = self.epoch, "keepalive ping");
                    if let Err(e) = transport.send(Frame::Ping(Vec::new())).await {
                        return e;
                    }
                    pong_deadline = Some(Instant::now() + ping_timeout);
                }
                frame = transport.receive() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => return e,
                        None => return Error::ConnectionClosed,
                    };
                    if let Err(e) = self.handle_frame(frame, &mut pong_deadline) {
                        return e;
                    }
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame, pong_deadline: &mut Option<Instant>) -> Result<()> {
        match frame {
            Frame::Text(text) => self.handle_payload(text.as_bytes(), pong_deadline),
            Frame::Binary(data) => self.handle_payload(&data, pong_deadline),
            // The transport answers pings itself
            Frame::Ping(_) => {
                trace!(epoch = self.epoch, "server ping");
                Ok(())
            }
            Frame::Pong(_) => {
                *pong_deadline = None;
                Ok(())
            }
            Frame::Close(reason) => {
                info!(epoch = self.epoch, reason = ?reason, "server closed connection");
                Err(Error::ConnectionClosed)
            }
        }
    }

    fn handle_payload(&mut self, raw: &[u8], pong_deadline: &mut Option<Instant>) -> Result<()> {
        // Heartbeat protocol answers with a bare text "pong"
        if raw.trim_ascii().eq_ignore_ascii_case(b"pong") {
            *pong_deadline = None;
            return Ok(());
        }

        let message = match classify(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(epoch = self.epoch, error = %e, "skipping malformed frame");
                return Ok(());
            }
        };

        match &message {
            InboundMessage::Error(server_error) => {
                self.dispatcher.dispatch(&message);
                error!(
                    epoch = self.epoch,
                    status = ?server_error.status,
                    error = %server_error.error,
                    "server error"
                );
                Err(Error::Protocol(server_error.error.clone()))
            }
            InboundMessage::SubscribeAck(ack) => {
                let outcome = self
                    .subscriptions
                    .on_acknowledgment(&ack.subscribe, ack.success);
                self.dispatcher.dispatch(&message);

                if let Err(rejected) = outcome {
                    warn!(epoch = self.epoch, error = %rejected, "subscription rejected");
                    if self.config.fail_on_rejected_subscription {
                        return Err(rejected);
                    }
                }

                if self.state == ConnectionState::Subscribing
                    && self.subscriptions.all_acknowledged()
                {
                    self.transition(ConnectionState::Open);
                    info!(
                        epoch = self.epoch,
                        channels = self.subscriptions.len(),
                        "all subscriptions answered"
                    );
                }
                Ok(())
            }
            _ => {
                self.dispatcher.dispatch(&message);
                Ok(())
            }
        }
    }
}

impl<C: Connector> fmt::Debug for ConnectionSession<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("epoch", &self.epoch)
            .field("state", &self.state)
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}
