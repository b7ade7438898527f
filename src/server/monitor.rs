//! Periodic liveness sweep over the session registry.

use std::sync::Arc;

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{server::AppState, session::SessionEvent};

/// What one sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub terminated: usize,
    pub evicted: usize,
}

pub fn spawn_monitor(app: Arc<AppState>, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = app.config.session.liveness_interval();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let report = sweep(&app);
                    if report.terminated > 0 || report.evicted > 0 {
                        info!(
                            "Liveness sweep: {} terminated, {} evicted, {} active",
                            report.terminated,
                            report.evicted,
                            app.registry.len()
                        );
                    }
                }
            }
        }
        debug!("Liveness monitor stopped");
    })
}

/// Terminates sessions that missed the previous ping, evicts idle ones and
/// pings the rest. An entry is acted on only if this sweep removed it.
pub fn sweep(app: &AppState) -> SweepReport {
    let inactivity = std::time::Duration::from_millis(app.config.session.inactivity_timeout_ms);
    let mut report = SweepReport::default();

    for (id, handle) in app.registry.snapshot() {
        if !handle.liveness.take_alive() {
            if app.registry.remove_if(&id, handle.token()).is_some() {
                debug!("Session {} missed its ping", id.short());
                handle.send(SessionEvent::Terminate);
                report.terminated += 1;
            }
            continue;
        }

        let idle = handle.liveness.idle_for();
        if idle > inactivity {
            if app.registry.remove_if(&id, handle.token()).is_some() {
                info!("Session {} inactive for {}s", id.short(), idle.as_secs());
                handle.send(SessionEvent::Evict);
                report.evicted += 1;
            }
            continue;
        }

        handle.send(SessionEvent::Probe);
        report.probed += 1;
    }

    report
}
