use std::time::Duration;

use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::session::events::SessionEvent;

/// Periodic ticker behind `ambient.control start`. It only paces; chunk
/// generation happens in the session actor on every `AmbientTick`.
pub struct AmbientStreamer {
    cancel: CancellationToken,
}

impl AmbientStreamer {
    pub fn start(cadence: Duration, inbox: mpsc::UnboundedSender<SessionEvent>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + cadence, cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if inbox.send(SessionEvent::AmbientTick).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self { cancel }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl Drop for AmbientStreamer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
