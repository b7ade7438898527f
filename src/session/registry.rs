//! Process-wide map of live sessions, shared by the transport (insert),
//! the session actors (self-removal) and the liveness monitor (eviction).

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use tokio::{sync::mpsc, time::Instant};

use crate::{common::SessionId, session::events::SessionEvent};

/// Heartbeat and activity bookkeeping of one session, written by the socket
/// bridge and the actor, read by the monitor.
#[derive(Debug)]
pub struct Liveness {
    origin: Instant,
    alive: AtomicBool,
    /// Milliseconds since `origin`.
    last_activity: AtomicU64,
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            alive: AtomicBool::new(true),
            last_activity: AtomicU64::new(0),
        }
    }
}

impl Liveness {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A pong (or any sign of life from the peer) arrived.
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
    }

    /// Returns whether the peer answered since the last call, and clears
    /// the flag for the next sweep.
    pub fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }

    pub fn touch(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_activity.fetch_max(now, Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let now = self.origin.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.last_activity.load(Ordering::Relaxed)))
    }
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub inbox: mpsc::UnboundedSender<SessionEvent>,
    pub liveness: Arc<Liveness>,
    token: u64,
}

impl SessionHandle {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn send(&self, event: SessionEvent) -> bool {
        self.inbox.send(event).is_ok()
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionHandle>,
    next_token: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) the entry for `id` and returns its handle. The
    /// handle's token is what later removals must present.
    pub fn register(
        &self,
        id: SessionId,
        inbox: mpsc::UnboundedSender<SessionEvent>,
        liveness: Arc<Liveness>,
    ) -> SessionHandle {
        let handle = SessionHandle {
            inbox,
            liveness,
            token: self.next_token.fetch_add(1, Ordering::Relaxed),
        };
        self.sessions.insert(id, handle.clone());
        handle
    }

    /// Removes the entry only if it is still the one registered with
    /// `token`. At most one caller gets `Some` for a given registration.
    pub fn remove_if(&self, id: &SessionId, token: u64) -> Option<SessionHandle> {
        self.sessions
            .remove_if(id, |_, handle| handle.token == token)
            .map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Point-in-time copy, so no shard lock is held while callers act.
    pub fn snapshot(&self) -> Vec<(SessionId, SessionHandle)> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(registry: &SessionRegistry, id: &str) -> SessionHandle {
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(SessionId::from(id.to_string()), tx, Liveness::new())
    }

    #[test]
    fn removal_happens_exactly_once() {
        let registry = SessionRegistry::new();
        let handle = register(&registry, "a");
        let id = SessionId::from("a".to_string());

        assert!(registry.remove_if(&id, handle.token()).is_some());
        assert!(registry.remove_if(&id, handle.token()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn stale_token_does_not_remove_newer_entry() {
        let registry = SessionRegistry::new();
        let old = register(&registry, "a");
        let new = register(&registry, "a");
        let id = SessionId::from("a".to_string());

        assert!(registry.remove_if(&id, old.token()).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_if(&id, new.token()).is_some());
    }

    #[test]
    fn snapshot_copies_entries() {
        let registry = SessionRegistry::new();
        register(&registry, "a");
        register(&registry, "b");

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        for (id, handle) in snapshot {
            assert!(registry.remove_if(&id, handle.token()).is_some());
        }
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn liveness_tracks_idle_time_and_pongs() {
        let liveness = Liveness::new();
        assert!(liveness.take_alive());
        assert!(!liveness.take_alive());
        liveness.mark_alive();
        assert!(liveness.take_alive());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(liveness.idle_for(), Duration::from_secs(60));
        liveness.touch();
        assert_eq!(liveness.idle_for(), Duration::ZERO);
    }
}
