//! Subscriber lifecycle: `Connecting → Connected → Disconnected`.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriberState {
    #[default]
    Connecting,
    Connected,
    /// Terminal.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Transport handshake finished and the hub accepted the subscriber.
    Accepted,
    /// Either side closed the session.
    Closed,
    SendFailed,
    /// Transport reported the peer as gone (reset, EOF).
    TransportLost,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("subscriber cannot handle {event:?} while {from:?}")]
pub struct InvalidTransition {
    pub from: SubscriberState,
    pub event: SessionEvent,
}

impl SubscriberState {
    pub fn on(self, event: SessionEvent) -> Result<Self, InvalidTransition> {
        use SessionEvent::*;
        use SubscriberState::*;

        match (self, event) {
            (Connecting, Accepted) => Ok(Connected),
            (Connecting | Connected, Closed | SendFailed | TransportLost) => Ok(Disconnected),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SubscriberState::Disconnected
    }
}
