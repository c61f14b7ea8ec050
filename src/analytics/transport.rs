use std::fmt;

use async_channel::{Receiver, Sender, TrySendError};

use crate::analytics::event::EnrichedEvent;
use crate::analytics::LOGGER;

/// Boundary to the component that batches, persists and sends events.
///
/// `enqueue` is fire-and-forget: it must not block and its outcome is never reported back to the
/// caller that tracked the event.
pub trait EventTransport: Send + Sync {
    fn enqueue(&self, target_token: &str, event: EnrichedEvent);
}

/// An event together with the token of the target that sent it.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportEnvelope {
    pub target_token: String,
    pub event: EnrichedEvent,
}

/// Hands events over to an asynchronous consumer through an `async-channel`.
///
/// The sending side never waits: when a bounded channel is full or the consumer is gone the
/// event is dropped and a warning is logged.
#[derive(Clone)]
pub struct ChannelTransport {
    sender: Sender<TransportEnvelope>,
}

impl fmt::Debug for ChannelTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("queued", &self.sender.len())
            .field("capacity", &self.sender.capacity())
            .finish()
    }
}

impl ChannelTransport {
    pub fn unbounded() -> (Self, Receiver<TransportEnvelope>) {
        let (sender, receiver) = async_channel::unbounded();
        (Self { sender }, receiver)
    }

    pub fn bounded(capacity: usize) -> (Self, Receiver<TransportEnvelope>) {
        let (sender, receiver) = async_channel::bounded(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub fn queued(&self) -> usize {
        self.sender.len()
    }
}

impl EventTransport for ChannelTransport {
    fn enqueue(&self, target_token: &str, event: EnrichedEvent) {
        let envelope = TransportEnvelope {
            target_token: target_token.to_owned(),
            event,
        };
        match self.sender.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(envelope)) => LOGGER.warn(format!(
                "Transport queue is full, dropping event `{}`",
                envelope.event.name
            )),
            Err(TrySendError::Closed(envelope)) => LOGGER.warn(format!(
                "Transport consumer is gone, dropping event `{}`",
                envelope.event.name
            )),
        }
    }
}

/// Transport that discards everything. Useful when only validation is wanted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTransport;

impl EventTransport for NoopTransport {
    fn enqueue(&self, _target_token: &str, _event: EnrichedEvent) {}
}
