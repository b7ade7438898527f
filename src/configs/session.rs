use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timings and limits of the per-connection relay.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Base delay before reconnecting after an abnormal upstream close.
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    /// Upper bound on one gateway handshake; a stalled attempt counts as failed.
    pub connect_timeout_ms: u64,
    /// How long client frames may wait for an upstream link to open.
    pub pending_timeout_ms: u64,
    pub pending_queue_limit: usize,
    /// Cadence of the ambient-only side channel.
    pub ambient_chunk_ms: u64,
    pub liveness_interval_ms: u64,
    pub inactivity_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 1_000,
            max_reconnect_attempts: 5,
            connect_timeout_ms: 10_000,
            pending_timeout_ms: 5_000,
            pending_queue_limit: 64,
            ambient_chunk_ms: 480,
            liveness_interval_ms: 30_000,
            inactivity_timeout_ms: 15 * 60 * 1_000,
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    pub fn pending_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_timeout_ms)
    }

    pub fn ambient_cadence(&self) -> Duration {
        Duration::from_millis(self.ambient_chunk_ms.max(1))
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms.max(1))
    }

    /// Samples the streamer must produce per tick at `sample_rate`.
    pub fn samples_per_chunk(&self, sample_rate: u32) -> usize {
        (sample_rate as u64 * self.ambient_chunk_ms / 1_000) as usize
    }
}
