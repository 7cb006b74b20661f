use std::fmt;
use std::time::Duration;

/// Result type for bitmex-ws operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bitmex-ws
#[derive(Debug)]
pub enum Error {
    /// JSON serialization/deserialization failed
    Json(serde_json::Error),

    /// Invalid configuration
    Config(String),

    /// Authentication required but credentials were not provided
    AuthRequired(String),

    /// A subscription was requested with no channels
    EmptyChannelSet,

    /// Secure channels were requested on a session without authentication
    UnauthorizedChannelRequest { channels: Vec<String> },

    /// The server refused a subscription
    SubscriptionRejected { channel: String, reason: String },

    /// A single inbound frame could not be decoded
    MalformedFrame(String),

    /// The server sent an `error` envelope
    Protocol(String),

    /// WebSocket transport failure (handshake, TLS, I/O)
    WebSocket(String),

    /// WebSocket connection closed
    ConnectionClosed,

    /// No keepalive response arrived within the timeout
    LivenessTimeout(Duration),

    /// The feed was shut down through its shutdown handle
    Cancelled,

    /// Reconnection failed after multiple attempts
    ReconnectFailed {
        attempts: u32,
        last_error: String,
    },
}

impl Error {
    /// Whether this error ends the current connection epoch
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_)
                | Error::WebSocket(_)
                | Error::ConnectionClosed
                | Error::LivenessTimeout(_)
                | Error::Cancelled
        )
    }

    /// Whether this error was caused by caller input and is raised synchronously
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyChannelSet
                | Error::UnauthorizedChannelRequest { .. }
                | Error::AuthRequired(_)
                | Error::Config(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::AuthRequired(msg) => write!(f, "Authentication required: {}", msg),
            Error::EmptyChannelSet => write!(f, "At least one channel must be requested"),
            Error::UnauthorizedChannelRequest { channels } => write!(
                f,
                "Channels require authentication: {}",
                channels.join(", ")
            ),
            Error::SubscriptionRejected { channel, reason } => {
                write!(f, "Subscription to {} rejected: {}", channel, reason)
            }
            Error::MalformedFrame(msg) => write!(f, "Malformed frame: {}", msg),
            Error::Protocol(msg) => write!(f, "Server error: {}", msg),
            Error::WebSocket(msg) => write!(f, "WebSocket error: {}", msg),
            Error::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Error::LivenessTimeout(timeout) => {
                write!(f, "No keepalive response within {:?}", timeout)
            }
            Error::Cancelled => write!(f, "Feed cancelled"),
            Error::ReconnectFailed {
                attempts,
                last_error,
            } => write!(
                f,
                "Reconnection failed after {} attempts: {}",
                attempts, last_error
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("invalid base URL: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Error::ConnectionClosed,
            other => Error::WebSocket(other.to_string()),
        }
    }
}
