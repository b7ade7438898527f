use std::time::Duration;

/// Capped exponential reconnect schedule: `base * 2^min(attempt-1, 3)`.
///
/// The attempt cap comes from `[session] max_reconnect_attempts`; once it is
/// reached the session stops retrying on its own and waits for client
/// traffic to try again.
#[derive(Debug)]
pub struct Backoff {
    base_ms: u64,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_ms,
            max_attempts,
            attempt: 0,
        }
    }

    pub fn next(&mut self) -> Duration {
        self.attempt += 1;
        let delay = self.base_ms * 2u64.pow((self.attempt - 1).min(3));
        Duration::from_millis(delay)
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
