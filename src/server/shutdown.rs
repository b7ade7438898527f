use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{server::AppState, session::SessionEvent};

/// Grace period between asking sessions to close and stopping the server.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Resolves once ctrl-c arrives and every session has been asked to close.
pub async fn shutdown_signal(app: Arc<AppState>, shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        return;
    }

    info!("Shutting down, closing {} session(s)", app.registry.len());
    close_all(&app, &shutdown);
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    info!("Server stopped");
}

/// Stops the monitor and tells every registered session to close.
pub fn close_all(app: &AppState, shutdown: &CancellationToken) -> usize {
    shutdown.cancel();
    app.registry
        .snapshot()
        .into_iter()
        .filter(|(_, handle)| handle.send(SessionEvent::Shutdown))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{AmbientLibrary, Levels},
        configs::Config,
        gateway::link::mock::MockConnector,
        session::{Outbound, Session},
    };

    #[tokio::test(start_paused = true)]
    async fn sessions_are_closed_with_shutdown_reason() {
        let library = AmbientLibrary::new(Vec::new(), Levels::new(0.5, 0.95));
        let app = AppState::new(Config::default(), library, MockConnector::new());
        let (tx, out) = flume::unbounded();
        Session::spawn(app.clone(), tx);

        let token = CancellationToken::new();
        assert_eq!(close_all(&app, &token), 1);
        assert!(token.is_cancelled());

        let close = loop {
            match out.recv_async().await.unwrap() {
                Outbound::Frame(_) => continue,
                other => break other,
            }
        };
        assert_eq!(
            close,
            Outbound::Close {
                code: 1000,
                reason: "server shutting down".into()
            }
        );
    }
}
