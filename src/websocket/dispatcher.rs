use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{Error, Result};
use crate::types::{
    Action, ActionMessage, ErrorMessage, InboundMessage, MessageKind, SubscribeAck,
};

const PREVIEW_CHARS: usize = 200;

/// Connection lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// A new epoch is connecting
    Connecting { epoch: u64 },
    /// Transport handshake succeeded
    Opened { epoch: u64 },
    /// The epoch ended; `error` is why
    Closed { epoch: u64, error: String },
    /// The supervisor is waiting before the next epoch
    Reconnecting { attempt: u32, delay: Duration },
}

type MessageHandler = Box<dyn FnMut(&InboundMessage) + Send>;
type LifecycleHandler = Box<dyn FnMut(&LifecycleEvent) + Send>;

/// Decode one frame into an [`InboundMessage`]
///
/// Key precedence is `error` > `action` > `subscribe` > `status`; an object
/// carrying none of them is [`InboundMessage::Unknown`]. Only a frame that is
/// not a JSON object fails, with [`Error::MalformedFrame`].
pub fn classify(raw: &[u8]) -> Result<InboundMessage> {
    let envelope: Map<String, Value> = serde_json::from_slice(raw).map_err(|e| {
        let text = String::from_utf8_lossy(raw);
        Error::MalformedFrame(format!(
            "{} (first {} chars: {})",
            e,
            PREVIEW_CHARS,
            text.chars().take(PREVIEW_CHARS).collect::<String>()
        ))
    })?;

    let message = if envelope.contains_key("error") {
        InboundMessage::Error(error_message(&envelope))
    } else if envelope.contains_key("action") {
        InboundMessage::Action(action_message(envelope))
    } else if envelope.contains_key("subscribe") {
        InboundMessage::SubscribeAck(SubscribeAck {
            subscribe: string_field(&envelope, "subscribe"),
            success: envelope
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    } else if envelope.contains_key("status") {
        InboundMessage::Status(envelope)
    } else {
        InboundMessage::Unknown(envelope)
    };

    Ok(message)
}

fn string_field(envelope: &Map<String, Value>, key: &str) -> String {
    match envelope.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn error_message(envelope: &Map<String, Value>) -> ErrorMessage {
    ErrorMessage {
        error: string_field(envelope, "error"),
        status: envelope
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|status| u16::try_from(status).ok()),
        request: envelope.get("request").cloned(),
    }
}

fn action_message(mut envelope: Map<String, Value>) -> ActionMessage {
    let action = Action::from(string_field(&envelope, "action").as_str());
    let data = match envelope.remove("data") {
        Some(Value::Array(rows)) => rows,
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single],
    };
    let keys = match envelope.remove("keys") {
        Some(Value::Array(keys)) => keys
            .into_iter()
            .filter_map(|key| key.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    ActionMessage {
        table: envelope
            .get("table")
            .and_then(Value::as_str)
            .map(str::to_string),
        action,
        data,
        keys,
        filter: envelope.remove("filter"),
    }
}

/// Routes classified messages to handlers registered per [`MessageKind`]
///
/// Handlers run synchronously, in registration order, on the receive loop:
/// the next frame is not read until every handler for the current one has
/// returned.
#[derive(Default)]
pub struct MessageDispatcher {
    handlers: [Vec<MessageHandler>; 5],
    lifecycle: Vec<LifecycleHandler>,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one message kind
    pub fn on<F>(&mut self, kind: MessageKind, handler: F) -> &mut Self
    where
        F: FnMut(&InboundMessage) + Send + 'static,
    {
        self.handlers[kind.index()].push(Box::new(handler));
        self
    }

    /// Register a handler for every message kind
    pub fn on_any<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&InboundMessage) + Send + Clone + 'static,
    {
        for kind in MessageKind::ALL {
            self.on(kind, handler.clone());
        }
        self
    }

    /// Register a handler for connection lifecycle events
    pub fn on_lifecycle<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&LifecycleEvent) + Send + 'static,
    {
        self.lifecycle.push(Box::new(handler));
        self
    }

    pub fn handler_count(&self, kind: MessageKind) -> usize {
        self.handlers[kind.index()].len()
    }

    /// Deliver a message to every handler registered for its kind
    pub fn dispatch(&mut self, message: &InboundMessage) {
        let handlers = &mut self.handlers[message.kind().index()];
        trace!(kind = ?message.kind(), handlers = handlers.len(), "dispatch");
        for handler in handlers.iter_mut() {
            handler(message);
        }
    }

    /// Classify a raw frame and dispatch it
    pub fn dispatch_frame(&mut self, raw: &[u8]) -> Result<InboundMessage> {
        let message = classify(raw)?;
        self.dispatch(&message);
        Ok(message)
    }

    pub fn emit_lifecycle(&mut self, event: &LifecycleEvent) {
        for handler in self.lifecycle.iter_mut() {
            handler(event);
        }
    }
}

impl fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<_> = MessageKind::ALL
            .iter()
            .map(|kind| (*kind, self.handler_count(*kind)))
            .collect();
        f.debug_struct("MessageDispatcher")
            .field("handlers", &counts)
            .field("lifecycle", &self.lifecycle.len())
            .finish()
    }
}
