use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Default REST base URL; the realtime endpoint is derived from its host
pub const DEFAULT_BASE_URL: &str = "https://www.bitmex.com/api/v1/";

/// Configuration for reconnection behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt
    pub delay: Duration,
    /// Multiplier applied to the delay after each failed epoch (1.0 = fixed delay)
    pub multiplier: f64,
    /// Maximum delay between reconnection attempts
    pub max_delay: Duration,
    /// Maximum number of consecutive failed epochs (None = infinite)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            multiplier: 1.0,
            max_delay: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

/// Connection options for a realtime feed
///
/// The record is supplied by the caller; nothing here is read from the
/// process environment.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// REST base URL, only its host is used
    pub base_url: String,
    /// Request server heartbeats and run the keepalive probe
    pub heartbeat: bool,
    /// Interval between keepalive pings
    pub ping_interval: Duration,
    /// How long to wait for a pong before faulting the connection
    pub ping_timeout: Duration,
    /// Deadline for the transport handshake
    pub connect_timeout: Duration,
    /// Sign the handshake and allow secure channels
    pub should_auth: bool,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Treat a rejected subscription as fatal to the epoch
    pub fail_on_rejected_subscription: bool,
    pub reconnect: ReconnectConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            heartbeat: true,
            ping_interval: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(9),
            connect_timeout: Duration::from_secs(10),
            should_auth: false,
            api_key: None,
            api_secret: None,
            fail_on_rejected_subscription: false,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl FeedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: bool) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_ping(mut self, interval: Duration, timeout: Duration) -> Self {
        self.ping_interval = interval;
        self.ping_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable authentication with the given API key pair
    pub fn with_credentials(
        mut self,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        self.should_auth = true;
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_fail_on_rejected_subscription(mut self, fail: bool) -> Self {
        self.fail_on_rejected_subscription = fail;
        self
    }

    /// Realtime endpoint: `wss://{host}/realtime`, plus `?heartbeat=true` when enabled
    pub fn ws_url(&self) -> Result<String> {
        let base = Url::parse(&self.base_url)?;
        let host = base
            .host_str()
            .ok_or_else(|| Error::Config(format!("base URL has no host: {}", self.base_url)))?;
        let authority = match base.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let query = if self.heartbeat { "?heartbeat=true" } else { "" };
        Ok(format!("wss://{}/realtime{}", authority, query))
    }

    /// API key and secret, required when `should_auth` is set
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Ok((key, secret))
            }
            _ => Err(Error::AuthRequired(
                "api_key and api_secret must be set when should_auth is enabled".to_string(),
            )),
        }
    }

    /// Check the record before any connection is attempted
    pub fn validate(&self) -> Result<()> {
        if self.should_auth {
            self.credentials()?;
        }
        if self.heartbeat && (self.ping_interval.is_zero() || self.ping_timeout.is_zero()) {
            return Err(Error::Config(
                "ping interval and timeout must be non-zero when heartbeat is enabled"
                    .to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::Config("connect timeout must be non-zero".to_string()));
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(Error::Config(
                "reconnect multiplier must be at least 1.0".to_string(),
            ));
        }
        self.ws_url()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_ws_url_with_heartbeat() {
        let config = FeedConfig::default();
        assert_eq!(
            config.ws_url().unwrap(),
            "wss://www.bitmex.com/realtime?heartbeat=true"
        );
    }

    #[test]
    fn test_ws_url_without_heartbeat() {
        let config = FeedConfig::default()
            .with_base_url("https://testnet.bitmex.com/api/v1/")
            .with_heartbeat(false);
        assert_eq!(config.ws_url().unwrap(), "wss://testnet.bitmex.com/realtime");
    }

    #[test]
    fn test_ws_url_rejects_garbage() {
        let config = FeedConfig::default().with_base_url("not a url");
        assert!(matches!(config.ws_url(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_requires_credentials() {
        let mut config = FeedConfig::default();
        config.should_auth = true;
        assert!(matches!(config.validate(), Err(Error::AuthRequired(_))));

        let config = FeedConfig::default().with_credentials("key", "secret");
        assert_ok!(config.validate());
    }

    #[test]
    fn test_validate_rejects_zero_ping() {
        let config = FeedConfig::default().with_ping(Duration::ZERO, Duration::from_secs(1));
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = config.with_heartbeat(false);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_connect_timeout() {
        assert_eq!(FeedConfig::default().connect_timeout, Duration::from_secs(10));

        let config = FeedConfig::default().with_connect_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_reconnect_is_fixed_five_seconds() {
        let reconnect = ReconnectConfig::default();
        assert_eq!(reconnect.delay, Duration::from_secs(5));
        assert_eq!(reconnect.multiplier, 1.0);
        assert!(reconnect.max_attempts.is_none());
    }
}
