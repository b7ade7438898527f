use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::{
    protocol::Frame,
    server::AppState,
    session::{Outbound, Session, SessionEvent},
};

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Bridges one client socket to its session actor: socket data frames go
/// into the actor's inbox, `Outbound` items come back out as socket writes.
pub async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (tx, rx) = flume::unbounded();
    let (session_id, handle) = Session::spawn(state.clone(), tx);
    info!(
        "WebSocket connected: session={} active={}",
        session_id,
        state.registry.len()
    );

    loop {
        tokio::select! {
            out = rx.recv_async() => {
                // The actor is gone.
                let Ok(out) = out else { break };
                match out {
                    Outbound::Frame(frame) => {
                        if let Err(e) = socket.send(frame.into()).await {
                            warn!("Socket send error: session={} err={}", session_id.short(), e);
                            break;
                        }
                    }
                    Outbound::Ping => {
                        if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                            break;
                        }
                    }
                    Outbound::Close { code, reason } => {
                        let frame = CloseFrame {
                            code,
                            reason: reason.into(),
                        };
                        let _ = socket.send(Message::Close(Some(frame))).await;
                        break;
                    }
                    Outbound::Terminate => break,
                }
            }
            msg = socket.recv() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket error: session={} err={}", session_id.short(), e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Pong(_) => handle.liveness.mark_alive(),
                    Message::Close(frame) => {
                        debug!("Client close frame: {:?}", frame);
                        break;
                    }
                    other => {
                        if let Ok(frame) = Frame::try_from(other) {
                            handle.send(SessionEvent::Client(frame));
                        }
                    }
                }
            }
        }
    }

    handle.send(SessionEvent::ClientClosed);
    info!("WebSocket closed: session={}", session_id);
}
