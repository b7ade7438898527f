use crate::{common::LinkId, gateway::constants::CLOSE_NORMAL, protocol::Frame};

/// Lifecycle and traffic of one upstream link, as seen by its session.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// Handshake completed; the link accepts frames.
    Opened,
    Frame(Frame),
    /// Frames accepted by the link but never written, oldest first. Sent
    /// ahead of the `Error`/`Closed` pair of a failed write.
    Unsent(Vec<Frame>),
    /// Transport error. Always followed by `Closed`.
    Error(String),
    Closed { code: u16, reason: String },
    /// The connect attempt itself failed; no `Closed` follows.
    Failed(String),
}

/// An `UpstreamEvent` tagged with the link that produced it, so events from
/// superseded links can be told apart.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEvent {
    pub link_id: LinkId,
    pub event: UpstreamEvent,
}

/// `1000` is the only close that does not schedule a reconnect.
pub fn is_clean_close(code: u16) -> bool {
    code == CLOSE_NORMAL
}
