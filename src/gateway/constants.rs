/// Normal closure. An upstream close with this code is not retried.
pub const CLOSE_NORMAL: u16 = 1000;

/// Local marker for a connection that dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Reported when the peer sent a close frame without a status code.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Header carrying the realtime API opt-in.
pub const BETA_HEADER: &str = "OpenAI-Beta";

/// Timeout (ms) allowed for the close frame to be written before the link
/// is torn down.
pub const WRITE_TASK_SHUTDOWN_MS: u64 = 500;
