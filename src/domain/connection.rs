// Broker link state machine
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Connected and subscribed to the feed topic.
    Connected,
    Reconnecting,
}

/// What the transport reports about its link to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Dialing,
    Subscribed,
    Lost,
    Shutdown,
}

impl ConnectionState {
    /// Next state for `event`. Events that make no sense in the current
    /// state leave it unchanged.
    pub fn next(self, event: LinkEvent) -> ConnectionState {
        use ConnectionState::*;

        match (self, event) {
            (_, LinkEvent::Shutdown) => Disconnected,
            (Disconnected, LinkEvent::Dialing) => Connecting,
            (Connecting | Reconnecting, LinkEvent::Subscribed) => Connected,
            (Connecting | Connected, LinkEvent::Lost) => Reconnecting,
            (state, _) => state,
        }
    }
}

/// Tracks the link state and remembers whether shutdown has happened, after
/// which `Disconnected` is final.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    state: ConnectionState,
    shut_down: bool,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            shut_down: false,
        }
    }
}

impl ConnectionTracker {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Apply `event`, returning the new state when it changed.
    pub fn apply(&mut self, event: LinkEvent) -> Option<ConnectionState> {
        if self.shut_down {
            return None;
        }
        if event == LinkEvent::Shutdown {
            self.shut_down = true;
        }

        let next = self.state.next(event);
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }
}
