use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{Channel, SubscribeRequest};

/// Lifecycle of one channel subscription; only moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Requested,
    Acknowledged,
    Rejected,
}

impl SubscriptionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SubscriptionStatus::Requested)
    }
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub channel: Channel,
    pub status: SubscriptionStatus,
}

/// Tracks requested and acknowledged channels for one connection epoch
///
/// The server keeps no memory of subscriptions across connections, so a
/// fresh controller is built for every epoch.
#[derive(Debug)]
pub struct SubscriptionController {
    should_auth: bool,
    subscriptions: BTreeMap<String, Subscription>,
}

impl SubscriptionController {
    pub fn new(should_auth: bool) -> Self {
        Self {
            should_auth,
            subscriptions: BTreeMap::new(),
        }
    }

    /// Check a channel set without recording anything
    pub fn validate(channels: &[Channel], should_auth: bool) -> Result<()> {
        if channels.is_empty() {
            return Err(Error::EmptyChannelSet);
        }

        if !should_auth {
            let secure: Vec<String> = channels
                .iter()
                .filter(|channel| channel.requires_auth())
                .map(Channel::key)
                .collect();
            if !secure.is_empty() {
                return Err(Error::UnauthorizedChannelRequest { channels: secure });
            }
        }

        Ok(())
    }

    /// Mark every channel Requested and build one batched subscribe request
    ///
    /// Channels already tracked keep their current status and are not
    /// requested again.
    pub fn request_channels(&mut self, channels: &[Channel]) -> Result<SubscribeRequest> {
        Self::validate(channels, self.should_auth)?;

        let mut args = Vec::with_capacity(channels.len());
        for channel in channels {
            let key = channel.key();
            if self.subscriptions.contains_key(&key) || args.contains(&key) {
                continue;
            }
            self.subscriptions.insert(
                key.clone(),
                Subscription {
                    channel: channel.clone(),
                    status: SubscriptionStatus::Requested,
                },
            );
            args.push(key);
        }

        debug!(channels = ?args, "subscriptions requested");
        Ok(SubscribeRequest::new(args))
    }

    /// Record the server's answer for `channel_key`
    ///
    /// Returns the resulting status, or `None` if the key was never
    /// requested. A rejection is returned as
    /// [`Error::SubscriptionRejected`] so the caller can decide whether to
    /// abort; the status is updated either way.
    pub fn on_acknowledgment(
        &mut self,
        channel_key: &str,
        success: bool,
    ) -> Result<Option<SubscriptionStatus>> {
        let Some(subscription) = self.subscriptions.get_mut(channel_key) else {
            warn!(channel = channel_key, success, "ack for unrequested channel");
            return Ok(None);
        };

        if subscription.status.is_terminal() {
            debug!(
                channel = channel_key,
                status = ?subscription.status,
                "duplicate ack ignored"
            );
            return Ok(Some(subscription.status));
        }

        if success {
            subscription.status = SubscriptionStatus::Acknowledged;
            debug!(channel = channel_key, "subscribed");
            Ok(Some(SubscriptionStatus::Acknowledged))
        } else {
            subscription.status = SubscriptionStatus::Rejected;
            Err(Error::SubscriptionRejected {
                channel: channel_key.to_string(),
                reason: "server refused subscription".to_string(),
            })
        }
    }

    /// True once every requested subscription has reached a terminal status
    pub fn all_acknowledged(&self) -> bool {
        self.subscriptions
            .values()
            .all(|subscription| subscription.status.is_terminal())
    }

    pub fn status(&self, channel_key: &str) -> Option<SubscriptionStatus> {
        self.subscriptions
            .get(channel_key)
            .map(|subscription| subscription.status)
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelKind;

    fn trade() -> Channel {
        Channel::new(ChannelKind::Trade, "XBTUSD")
    }

    #[test]
    fn test_request_channels_marks_requested() {
        let mut controller = SubscriptionController::new(false);
        let channels = vec![trade(), Channel::new(ChannelKind::Quote, "ETHUSD")];

        let request = controller.request_channels(&channels).unwrap();

        assert_eq!(request.op, "subscribe");
        assert_eq!(request.args, vec!["trade:XBTUSD", "quote:ETHUSD"]);
        assert_eq!(controller.len(), 2);
        assert!(controller
            .subscriptions()
            .all(|s| s.status == SubscriptionStatus::Requested));
        assert!(!controller.all_acknowledged());
    }

    #[test]
    fn test_request_empty_set_fails() {
        let mut controller = SubscriptionController::new(true);
        assert!(matches!(
            controller.request_channels(&[]),
            Err(Error::EmptyChannelSet)
        ));
        assert!(controller.is_empty());
    }

    #[test]
    fn test_request_secure_channel_without_auth_fails() {
        let mut controller = SubscriptionController::new(false);
        let channels = vec![trade(), Channel::new(ChannelKind::Position, "XBTUSD")];

        let err = controller.request_channels(&channels).unwrap_err();
        assert!(matches!(err, Error::UnauthorizedChannelRequest { .. }));
        assert!(controller.is_empty());
    }

    #[test]
    fn test_secure_channel_with_auth() {
        let mut controller = SubscriptionController::new(true);
        let request = controller
            .request_channels(&[Channel::global(ChannelKind::Wallet)])
            .unwrap();
        assert_eq!(request.args, vec!["wallet"]);
    }

    #[test]
    fn test_duplicates_requested_once() {
        let mut controller = SubscriptionController::new(false);
        let request = controller.request_channels(&[trade(), trade()]).unwrap();
        assert_eq!(request.args, vec!["trade:XBTUSD"]);

        let again = controller.request_channels(&[trade()]).unwrap();
        assert!(again.args.is_empty());
    }

    #[test]
    fn test_ack_transitions_once() {
        let mut controller = SubscriptionController::new(false);
        controller.request_channels(&[trade()]).unwrap();

        let status = controller.on_acknowledgment("trade:XBTUSD", true).unwrap();
        assert_eq!(status, Some(SubscriptionStatus::Acknowledged));
        assert!(controller.all_acknowledged());

        // A later rejection cannot move it backwards
        let status = controller.on_acknowledgment("trade:XBTUSD", false).unwrap();
        assert_eq!(status, Some(SubscriptionStatus::Acknowledged));
    }

    #[test]
    fn test_rejection_is_reported() {
        let mut controller = SubscriptionController::new(false);
        controller
            .request_channels(&[trade(), Channel::new(ChannelKind::Quote, "XBTUSD")])
            .unwrap();

        let err = controller.on_acknowledgment("quote:XBTUSD", false).unwrap_err();
        match err {
            Error::SubscriptionRejected { channel, .. } => assert_eq!(channel, "quote:XBTUSD"),
            other => panic!("Expected SubscriptionRejected, got {:?}", other),
        }
        assert_eq!(
            controller.status("quote:XBTUSD"),
            Some(SubscriptionStatus::Rejected)
        );
        assert!(!controller.all_acknowledged());

        controller.on_acknowledgment("trade:XBTUSD", true).unwrap();
        assert!(controller.all_acknowledged());
    }

    #[test]
    fn test_ack_for_unknown_channel() {
        let mut controller = SubscriptionController::new(false);
        controller.request_channels(&[trade()]).unwrap();
        assert_eq!(controller.on_acknowledgment("quote:XBTUSD", true).unwrap(), None);
        assert!(!controller.all_acknowledged());
    }
}
