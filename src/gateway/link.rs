//! One websocket connection to the speech gateway.
//!
//! `UpstreamLink::start` spawns a task that connects, reports `Opened`, then
//! splits into a writer task (draining the handle's frame channel into the
//! socket) and a reader loop (turning socket traffic into `LinkEvent`s).
//! Dropping the `LinkHandle` cancels both. A failed write hands the frames
//! it still holds back to the session before the link reports `Closed`.

use std::{pin::Pin, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{
    self,
    client::IntoClientRequest,
    http::HeaderValue,
    protocol::{CloseFrame, Message},
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::{
    common::{LinkId, RelayError, RelayResult},
    configs::GatewayConfig,
    gateway::{
        constants::{BETA_HEADER, CLOSE_ABNORMAL, CLOSE_NO_STATUS, WRITE_TASK_SHUTDOWN_MS},
        types::{LinkEvent, UpstreamEvent},
    },
    protocol::Frame,
};

pub type WsSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;
pub type WsStream = Pin<Box<dyn Stream<Item = Result<Message, tungstenite::Error>> + Send>>;

/// Both halves of an established gateway socket.
pub struct Transport {
    pub sink: WsSink,
    pub stream: WsStream,
}

/// Opens gateway sockets. Abstracted so sessions can be driven against an
/// in-memory peer.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> RelayResult<Transport>;
}

/// Production connector: `wss://…?model=…` with bearer auth.
pub struct TungsteniteConnector {
    endpoint: String,
    api_key: String,
    beta: String,
}

impl TungsteniteConnector {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            api_key: config.api_key.clone().unwrap_or_default(),
            beta: config.beta_header.clone(),
        }
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self) -> RelayResult<Transport> {
        let mut request = self.endpoint.as_str().into_client_request()?;
        let headers = request.headers_mut();

        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| RelayError::Connection(format!("invalid api key header: {}", e)))?;
        headers.insert("Authorization", auth);

        if !self.beta.is_empty() {
            let beta = HeaderValue::from_str(&self.beta)
                .map_err(|e| RelayError::Connection(format!("invalid beta header: {}", e)))?;
            headers.insert(BETA_HEADER, beta);
        }

        debug!("Connecting to gateway: {}", self.endpoint);
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        let (sink, stream) = ws_stream.split();

        Ok(Transport {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// The session's grip on one link. Frames sent before the link opens are
/// written once it does; the session only sends after `Opened`.
pub struct LinkHandle {
    id: LinkId,
    tx: mpsc::UnboundedSender<Frame>,
    close_tx: Option<oneshot::Sender<(u16, String)>>,
    guard: Option<DropGuard>,
}

impl LinkHandle {
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Queues `frame` for the writer. Once the writer has stopped the frame
    /// is handed back so the caller can keep it for the next link.
    pub fn send(&self, frame: Frame) -> Result<(), Frame> {
        self.tx.send(frame).map_err(|mpsc::error::SendError(frame)| frame)
    }

    /// Sends a close frame after anything already queued and lets the link
    /// wind down on its own.
    pub fn close(mut self, code: u16, reason: impl Into<String>) {
        let Some(close_tx) = self.close_tx.take() else {
            return;
        };
        if close_tx.send((code, reason.into())).is_ok() {
            if let Some(guard) = self.guard.take() {
                let _ = guard.disarm();
            }
        }
    }
}

pub struct UpstreamLink;

impl UpstreamLink {
    /// Starts connecting in the background. Every event of this link,
    /// beginning with `Opened` or `Failed`, is delivered to `events`. A
    /// handshake that takes longer than `connect_timeout` is `Failed`.
    pub fn start(
        id: LinkId,
        connector: Arc<dyn Connector>,
        connect_timeout: Duration,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> LinkHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let writer = Writer {
            id,
            rx,
            close_rx,
            events: events.clone(),
            cancel: cancel.clone(),
        };
        tokio::spawn(run_link(id, connector, connect_timeout, events, writer, cancel.clone()));

        LinkHandle {
            id,
            tx,
            close_tx: Some(close_tx),
            guard: Some(cancel.drop_guard()),
        }
    }
}

fn emit(events: &mpsc::UnboundedSender<LinkEvent>, link_id: LinkId, event: UpstreamEvent) -> bool {
    events.send(LinkEvent { link_id, event }).is_ok()
}

async fn run_link(
    id: LinkId,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<LinkEvent>,
    writer: Writer,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        res = tokio::time::timeout(connect_timeout, connector.connect()) => res,
    };

    let failure = match connected {
        Ok(Ok(Transport { sink, stream })) => {
            info!("{} open", id);
            if !emit(&events, id, UpstreamEvent::Opened) {
                return;
            }
            tokio::spawn(writer.run(sink));
            read_loop(id, stream, events, cancel).await;
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("connect timed out after {:?}", connect_timeout),
    };

    warn!("{} connect failed: {}", id, failure);
    emit(&events, id, UpstreamEvent::Failed(failure));
}

/// Drains the handle's frames into the socket until the link closes.
struct Writer {
    id: LinkId,
    rx: mpsc::UnboundedReceiver<Frame>,
    close_rx: oneshot::Receiver<(u16, String)>,
    events: mpsc::UnboundedSender<LinkEvent>,
    cancel: CancellationToken,
}

impl Writer {
    async fn run(mut self, mut sink: WsSink) {
        let id = self.id;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                close = &mut self.close_rx => {
                    let Ok((code, reason)) = close else { break };
                    debug!("{} closing: code={}, reason='{}'", id, code, reason);
                    let close = Message::Close(Some(CloseFrame {
                        code: code.into(),
                        reason: reason.into(),
                    }));
                    let rx = &mut self.rx;
                    let drain = async {
                        while let Ok(frame) = rx.try_recv() {
                            sink.send(Message::from(frame)).await?;
                        }
                        sink.send(close).await
                    };
                    let _ = tokio::time::timeout(Duration::from_millis(WRITE_TASK_SHUTDOWN_MS), drain).await;
                    self.cancel.cancel();
                    break;
                }
                frame = self.rx.recv() => {
                    let Some(frame) = frame else { break };
                    let msg = Message::from(frame);
                    if let Err(e) = sink.send(msg.clone()).await {
                        warn!("{} write error: {}", id, e);
                        self.fail(msg, e.to_string());
                        break;
                    }
                }
            }
        }
    }

    /// Hands every frame that never reached the socket back to the session,
    /// oldest first, then reports the link as dropped.
    fn fail(&mut self, failed: Message, reason: String) {
        self.rx.close();
        let mut unsent: Vec<Frame> = Frame::try_from(failed).into_iter().collect();
        while let Ok(frame) = self.rx.try_recv() {
            unsent.push(frame);
        }

        if !unsent.is_empty() {
            emit(&self.events, self.id, UpstreamEvent::Unsent(unsent));
        }
        emit(&self.events, self.id, UpstreamEvent::Error(reason.clone()));
        emit(
            &self.events,
            self.id,
            UpstreamEvent::Closed {
                code: CLOSE_ABNORMAL,
                reason,
            },
        );
        self.cancel.cancel();
    }
}

async fn read_loop(
    id: LinkId,
    mut stream: WsStream,
    events: mpsc::UnboundedSender<LinkEvent>,
    cancel: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return,
            msg = stream.next() => msg,
        };

        let event = match msg {
            Some(Ok(Message::Text(text))) => UpstreamEvent::Frame(Frame::Text(text.to_string())),
            Some(Ok(Message::Binary(bin))) => UpstreamEvent::Frame(Frame::Binary(bin)),
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame
                    .map(|cf| (u16::from(cf.code), cf.reason.to_string()))
                    .unwrap_or((CLOSE_NO_STATUS, String::new()));
                info!("{} closed: code={}, reason='{}'", id, code, reason);
                emit(&events, id, UpstreamEvent::Closed { code, reason });
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!("{} read error: {}", id, e);
                let reason = e.to_string();
                emit(&events, id, UpstreamEvent::Error(reason.clone()));
                emit(
                    &events,
                    id,
                    UpstreamEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason,
                    },
                );
                break;
            }
            None => {
                debug!("{} stream ended", id);
                emit(
                    &events,
                    id,
                    UpstreamEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: "stream ended".into(),
                    },
                );
                break;
            }
        };

        if !emit(&events, id, event) {
            break;
        }
    }

    cancel.cancel();
}
