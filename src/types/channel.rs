use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Realtime topics published by the feed.
///
/// Secure channels carry account data and need an authenticated handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelKind {
    Announcement,
    Chat,
    Connected,
    Funding,
    Instrument,
    Insurance,
    Liquidation,
    #[serde(rename = "orderBookL2")]
    OrderBookL2,
    #[serde(rename = "orderBookL2_25")]
    OrderBookL2_25,
    #[serde(rename = "orderBook10")]
    OrderBook10,
    PublicNotifications,
    Quote,
    #[serde(rename = "quoteBin1m")]
    QuoteBin1m,
    #[serde(rename = "quoteBin5m")]
    QuoteBin5m,
    #[serde(rename = "quoteBin1h")]
    QuoteBin1h,
    #[serde(rename = "quoteBin1d")]
    QuoteBin1d,
    Settlement,
    Trade,
    #[serde(rename = "tradeBin1m")]
    TradeBin1m,
    #[serde(rename = "tradeBin5m")]
    TradeBin5m,
    #[serde(rename = "tradeBin1h")]
    TradeBin1h,
    #[serde(rename = "tradeBin1d")]
    TradeBin1d,
    // Secure
    Affiliate,
    Execution,
    Order,
    Margin,
    Position,
    PrivateNotifications,
    Transact,
    Wallet,
}

impl ChannelKind {
    /// Every channel the feed publishes
    pub const CATALOG: [ChannelKind; 30] = [
        ChannelKind::Announcement,
        ChannelKind::Chat,
        ChannelKind::Connected,
        ChannelKind::Funding,
        ChannelKind::Instrument,
        ChannelKind::Insurance,
        ChannelKind::Liquidation,
        ChannelKind::OrderBookL2,
        ChannelKind::OrderBookL2_25,
        ChannelKind::OrderBook10,
        ChannelKind::PublicNotifications,
        ChannelKind::Quote,
        ChannelKind::QuoteBin1m,
        ChannelKind::QuoteBin5m,
        ChannelKind::QuoteBin1h,
        ChannelKind::QuoteBin1d,
        ChannelKind::Settlement,
        ChannelKind::Trade,
        ChannelKind::TradeBin1m,
        ChannelKind::TradeBin5m,
        ChannelKind::TradeBin1h,
        ChannelKind::TradeBin1d,
        ChannelKind::Affiliate,
        ChannelKind::Execution,
        ChannelKind::Order,
        ChannelKind::Margin,
        ChannelKind::Position,
        ChannelKind::PrivateNotifications,
        ChannelKind::Transact,
        ChannelKind::Wallet,
    ];

    /// Wire name used in channel keys
    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::Announcement => "announcement",
            ChannelKind::Chat => "chat",
            ChannelKind::Connected => "connected",
            ChannelKind::Funding => "funding",
            ChannelKind::Instrument => "instrument",
            ChannelKind::Insurance => "insurance",
            ChannelKind::Liquidation => "liquidation",
            ChannelKind::OrderBookL2 => "orderBookL2",
            ChannelKind::OrderBookL2_25 => "orderBookL2_25",
            ChannelKind::OrderBook10 => "orderBook10",
            ChannelKind::PublicNotifications => "publicNotifications",
            ChannelKind::Quote => "quote",
            ChannelKind::QuoteBin1m => "quoteBin1m",
            ChannelKind::QuoteBin5m => "quoteBin5m",
            ChannelKind::QuoteBin1h => "quoteBin1h",
            ChannelKind::QuoteBin1d => "quoteBin1d",
            ChannelKind::Settlement => "settlement",
            ChannelKind::Trade => "trade",
            ChannelKind::TradeBin1m => "tradeBin1m",
            ChannelKind::TradeBin5m => "tradeBin5m",
            ChannelKind::TradeBin1h => "tradeBin1h",
            ChannelKind::TradeBin1d => "tradeBin1d",
            ChannelKind::Affiliate => "affiliate",
            ChannelKind::Execution => "execution",
            ChannelKind::Order => "order",
            ChannelKind::Margin => "margin",
            ChannelKind::Position => "position",
            ChannelKind::PrivateNotifications => "privateNotifications",
            ChannelKind::Transact => "transact",
            ChannelKind::Wallet => "wallet",
        }
    }

    /// Whether subscribing needs an authenticated handshake
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            ChannelKind::Affiliate
                | ChannelKind::Execution
                | ChannelKind::Order
                | ChannelKind::Margin
                | ChannelKind::Position
                | ChannelKind::PrivateNotifications
                | ChannelKind::Transact
                | ChannelKind::Wallet
        )
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelKind::CATALOG
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::Config(format!("unknown channel: {}", s)))
    }
}

/// A channel, optionally scoped to one instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel {
    kind: ChannelKind,
    symbol: Option<String>,
}

impl Channel {
    /// Channel scoped to one instrument, e.g. `trade:XBTUSD`
    pub fn new(kind: ChannelKind, symbol: impl Into<String>) -> Self {
        Self {
            kind,
            symbol: Some(symbol.into()),
        }
    }

    /// Channel covering all instruments or the whole account, e.g. `wallet`
    pub fn global(kind: ChannelKind) -> Self {
        Self { kind, symbol: None }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn requires_auth(&self) -> bool {
        self.kind.requires_auth()
    }

    /// Wire key: `{name}:{symbol}`, or the bare name for global channels
    pub fn key(&self) -> String {
        match &self.symbol {
            Some(symbol) => format!("{}:{}", self.kind.name(), symbol),
            None => self.kind.name().to_string(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((name, symbol)) if !symbol.is_empty() => {
                Ok(Channel::new(name.parse()?, symbol))
            }
            Some(_) => Err(Error::Config(format!("channel key has empty symbol: {}", s))),
            None => Ok(Channel::global(s.parse()?)),
        }
    }
}
