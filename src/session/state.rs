use std::fmt;

/// Lifecycle of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upstream link being established.
    Connecting,
    /// Upstream link open; full relay.
    Active,
    /// No usable upstream link: a retry may be scheduled, or the next client
    /// frame reconnects on demand.
    Degraded,
    /// Terminal.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "CONNECTING",
            SessionState::Active => "ACTIVE",
            SessionState::Degraded => "DEGRADED",
            SessionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}
