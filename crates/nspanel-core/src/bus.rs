// ── Message bus ──
//
// Outbound side of the panel transport. Publishing is fire-and-forget:
// the session hands a payload to the bus and moves on, the transport
// task delivers it and logs failures.

use tokio::sync::mpsc;

/// One message for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
}

pub trait MessageBus: Send + Sync {
    fn publish(&self, topic: &str, payload: String);
}

/// `MessageBus` over an unbounded channel drained by the transport task.
#[derive(Debug, Clone)]
pub struct ChannelBus {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageBus for ChannelBus {
    fn publish(&self, topic: &str, payload: String) {
        tracing::debug!(topic, payload = %payload, "publishing to panel");
        let message = OutboundMessage {
            topic: topic.to_owned(),
            payload,
        };
        if self.tx.send(message).is_err() {
            tracing::warn!(topic, "bus transport has stopped, dropping message");
        }
    }
}
