use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outbound subscribe request
///
/// `{"op": "subscribe", "args": ["trade:XBTUSD", ...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub op: String,
    pub args: Vec<String>,
}

impl SubscribeRequest {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            op: "subscribe".to_string(),
            args,
        }
    }
}

/// Table mutation verb carried by an action message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Full snapshot of the table
    Partial,
    Insert,
    Update,
    Delete,
    /// Verb not known to this client, kept verbatim
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Partial => "partial",
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Other(verb) => verb,
        }
    }
}

impl From<&str> for Action {
    fn from(verb: &str) -> Self {
        match verb {
            "partial" => Action::Partial,
            "insert" => Action::Insert,
            "update" => Action::Update,
            "delete" => Action::Delete,
            other => Action::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data update for one table
#[derive(Debug, Clone, PartialEq)]
pub struct ActionMessage {
    /// Table name, e.g. `trade` or `orderBookL2`
    pub table: Option<String>,
    pub action: Action,
    /// Rows affected by the action
    pub data: Vec<Value>,
    /// Primary key columns, sent with `partial`
    pub keys: Vec<String>,
    /// Filter the snapshot was taken with, sent with `partial`
    pub filter: Option<Value>,
}

/// Server response to a subscribe request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeAck {
    /// Channel key the response refers to
    pub subscribe: String,
    pub success: bool,
}

/// Server-side error envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub error: String,
    pub status: Option<u16>,
    /// Request the error refers to, if echoed back
    pub request: Option<Value>,
}

/// Message kinds handlers can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Action,
    SubscribeAck,
    Status,
    Error,
    Unknown,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::Action,
        MessageKind::SubscribeAck,
        MessageKind::Status,
        MessageKind::Error,
        MessageKind::Unknown,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            MessageKind::Action => 0,
            MessageKind::SubscribeAck => 1,
            MessageKind::Status => 2,
            MessageKind::Error => 3,
            MessageKind::Unknown => 4,
        }
    }
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Action(ActionMessage),
    SubscribeAck(SubscribeAck),
    /// Informational envelope, kept whole
    Status(Map<String, Value>),
    Error(ErrorMessage),
    /// Anything else, e.g. the welcome banner
    Unknown(Map<String, Value>),
}

impl InboundMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            InboundMessage::Action(_) => MessageKind::Action,
            InboundMessage::SubscribeAck(_) => MessageKind::SubscribeAck,
            InboundMessage::Status(_) => MessageKind::Status,
            InboundMessage::Error(_) => MessageKind::Error,
            InboundMessage::Unknown(_) => MessageKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_request_wire_format() {
        let request = SubscribeRequest::new(vec![
            "trade:XBTUSD".to_string(),
            "quote:XBTUSD".to_string(),
        ]);
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"op":"subscribe","args":["trade:XBTUSD","quote:XBTUSD"]}"#
        );
    }

    #[test]
    fn test_action_verbs() {
        assert_eq!(Action::from("partial"), Action::Partial);
        assert_eq!(Action::from("delete"), Action::Delete);
        assert_eq!(Action::from("upsert"), Action::Other("upsert".to_string()));
        assert_eq!(Action::Other("upsert".to_string()).to_string(), "upsert");
    }

    #[test]
    fn test_kind_indices_are_distinct() {
        let mut indices: Vec<_> = MessageKind::ALL.iter().map(|k| k.index()).collect();
        indices.dedup();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }
}
