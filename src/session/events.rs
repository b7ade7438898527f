use crate::protocol::Frame;

/// Inbox of a session actor.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A data frame from the client socket.
    Client(Frame),
    /// The client socket closed or errored.
    ClientClosed,
    /// Liveness probe: ping the client.
    Probe,
    /// Idle too long: close both sides with 1000.
    Evict,
    /// Unresponsive: drop the client without a close handshake.
    Terminate,
    /// Process is stopping.
    Shutdown,
    /// Streamer cadence tick.
    AmbientTick,
}

/// What the actor asks the client socket to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(Frame),
    Ping,
    Close { code: u16, reason: String },
    /// Drop the socket without a close frame.
    Terminate,
}
