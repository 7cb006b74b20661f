use crate::error::Result;
use crate::types::{Channel, ChannelKind};
use crate::websocket::SubscriptionController;

/// Default instrument symbol
pub const DEFAULT_SYMBOL: &str = "XBTUSD";

/// A set of channels scoped to one instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    symbol: String,
    channels: Vec<Channel>,
}

impl Instrument {
    /// Build the channel set for `symbol`
    ///
    /// Fails with [`Error::EmptyChannelSet`](crate::Error::EmptyChannelSet) when `kinds`
    /// is empty and with [`Error::UnauthorizedChannelRequest`](crate::Error::UnauthorizedChannelRequest)
    /// when a secure channel is requested without authentication.
    pub fn new(
        symbol: impl Into<String>,
        kinds: impl IntoIterator<Item = ChannelKind>,
        should_auth: bool,
    ) -> Result<Self> {
        let symbol = symbol.into();
        let mut channels: Vec<Channel> = kinds
            .into_iter()
            .map(|kind| Channel::new(kind, symbol.clone()))
            .collect();
        channels.sort();
        channels.dedup();

        SubscriptionController::validate(&channels, should_auth)?;

        Ok(Self { symbol, channels })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Channel> {
        self.channels
    }
}
