//! The per-connection relay.
//!
//! One task owns every piece of session state. It consumes the client-side
//! inbox and the events of its current upstream link, and talks back to the
//! client only through the outbound channel. Reconnect and queue-expiry
//! timers live in the same select loop, so closing the session drops them.

use std::{collections::VecDeque, sync::Arc};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};
use tracing::{Instrument, debug, info, info_span, trace, warn};

use crate::{
    audio::AmbientMixer,
    common::{LinkId, SessionId},
    gateway::{
        Backoff, LinkEvent, LinkHandle, UpstreamEvent, UpstreamLink, constants::CLOSE_NORMAL,
        is_clean_close,
    },
    protocol::{AmbientCommand, Frame, GatewayFrame, ServerMessage, parse_command},
    server::AppState,
    session::{
        AmbientStreamer, SessionState,
        events::{Outbound, SessionEvent},
        registry::{Liveness, SessionHandle},
    },
};

const REASON_CLIENT_GONE: &str = "client disconnected";
const REASON_INACTIVE: &str = "inactive";
const REASON_SHUTDOWN: &str = "server shutting down";

struct Pending {
    frame: Frame,
    deadline: Instant,
}

pub struct Session {
    id: SessionId,
    state: SessionState,
    app: Arc<AppState>,
    handle: SessionHandle,
    outbound: flume::Sender<Outbound>,

    mixer: AmbientMixer,
    track_index: usize,
    ambient_enabled: bool,
    streamer: Option<AmbientStreamer>,

    link: Option<LinkHandle>,
    link_open: bool,
    last_link: LinkId,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    backoff: Backoff,
    retry_at: Option<Instant>,
    pending: VecDeque<Pending>,
}

impl Session {
    /// Registers a new session and starts its actor. The returned handle is
    /// what the socket bridge feeds client traffic into.
    pub fn spawn(app: Arc<AppState>, outbound: flume::Sender<Outbound>) -> (SessionId, SessionHandle) {
        let id = SessionId::generate();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let handle = app.registry.register(id.clone(), inbox_tx, Liveness::new());

        let span = info_span!("session", id = %id.short());
        let session = Session::new(id.clone(), app, handle.clone(), outbound);
        tokio::spawn(session.run(inbox_rx).instrument(span));

        (id, handle)
    }

    fn new(
        id: SessionId,
        app: Arc<AppState>,
        handle: SessionHandle,
        outbound: flume::Sender<Outbound>,
    ) -> Self {
        let track_index = app.library.default_index();
        let mixer = app.library.new_mixer();
        let backoff = Backoff::new(
            app.config.session.reconnect_delay_ms,
            app.config.session.max_reconnect_attempts,
        );
        let (link_tx, link_rx) = mpsc::unbounded_channel();

        Self {
            id,
            state: SessionState::Connecting,
            app,
            handle,
            outbound,
            mixer,
            track_index,
            ambient_enabled: true,
            streamer: None,
            link: None,
            link_open: false,
            last_link: LinkId(0),
            link_tx,
            link_rx,
            backoff,
            retry_at: None,
            pending: VecDeque::new(),
        }
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<SessionEvent>) {
        info!("Client connected");
        self.send(self.status());
        self.connect();

        while self.state != SessionState::Closed {
            let retry_at = self.retry_at;
            let expires_at = self.pending.front().map(|p| p.deadline);

            tokio::select! {
                event = inbox.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => self.set_state(SessionState::Closed),
                },
                Some(event) = self.link_rx.recv() => self.on_link_event(event),
                _ = sleep_until_opt(retry_at) => {
                    self.retry_at = None;
                    self.connect();
                }
                _ = sleep_until_opt(expires_at) => self.expire_pending(),
            }
        }

        self.teardown();
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("{} -> {}", self.state, state);
            self.state = state;
        }
    }

    // ---- client side -------------------------------------------------------

    fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Client(frame) => self.on_client_frame(frame),
            SessionEvent::ClientClosed => {
                info!("Client disconnected");
                self.set_state(SessionState::Closed);
            }
            SessionEvent::Probe => {
                if self.outbound.send(Outbound::Ping).is_err() {
                    self.set_state(SessionState::Closed);
                }
            }
            SessionEvent::Evict => {
                info!("Evicting inactive session");
                self.close_both(REASON_INACTIVE);
            }
            SessionEvent::Shutdown => self.close_both(REASON_SHUTDOWN),
            SessionEvent::Terminate => {
                info!("Terminating unresponsive session");
                let _ = self.outbound.send(Outbound::Terminate);
                self.set_state(SessionState::Closed);
            }
            SessionEvent::AmbientTick => self.on_ambient_tick(),
        }
    }

    fn on_client_frame(&mut self, frame: Frame) {
        match frame.as_text().map(parse_command) {
            Some(Ok(Some(command))) => return self.on_command(command),
            Some(Err(e)) => debug!("Forwarding unrecognized control frame: {}", e),
            _ => {}
        }
        self.forward(frame);
    }

    fn on_command(&mut self, command: AmbientCommand) {
        debug!("Ambient command: {:?}", command);
        let reply = match command {
            AmbientCommand::Toggle => {
                self.ambient_enabled = !self.ambient_enabled;
                info!(
                    "Ambient {}",
                    if self.ambient_enabled { "enabled" } else { "disabled" }
                );
                self.status()
            }
            AmbientCommand::Switch => {
                let library = &self.app.library;
                let next = library
                    .next_index(self.track_index)
                    .and_then(|i| library.get(i).map(|t| (i, t.clone())));
                let success = match next {
                    Some((index, track)) => {
                        self.track_index = index;
                        self.mixer.set_track(track);
                        true
                    }
                    None => false,
                };
                ServerMessage::AmbientSwitched {
                    success,
                    current: self.current_track(),
                }
            }
            AmbientCommand::Levels { levels } => ServerMessage::AmbientLevels {
                levels: self.mixer.set_levels(levels.ambient, levels.voice),
            },
            AmbientCommand::Start => {
                if !self.streamer.as_ref().is_some_and(AmbientStreamer::is_running) {
                    self.streamer = Some(AmbientStreamer::start(
                        self.app.config.session.ambient_cadence(),
                        self.handle.inbox.clone(),
                    ));
                }
                ServerMessage::AmbientStreaming { active: true }
            }
            AmbientCommand::Stop => {
                self.stop_streamer();
                ServerMessage::AmbientStreaming { active: false }
            }
        };
        self.send(reply);
    }

    fn on_ambient_tick(&mut self) {
        if self.streamer.is_none() {
            return;
        }

        let sample_rate = self.app.config.ambient.sample_rate;
        let samples = self.app.config.session.samples_per_chunk(sample_rate);

        match self.mixer.generate_ambient_only(samples) {
            Some(pcm) => {
                let chunk = ServerMessage::AmbientAudio {
                    audio: BASE64_STANDARD.encode(pcm),
                    sample_rate,
                    samples,
                };
                if !self.send(chunk) {
                    self.stop_streamer();
                }
            }
            None => {
                debug!("No ambient track loaded; stopping streamer");
                self.stop_streamer();
                self.send(ServerMessage::AmbientStreaming { active: false });
            }
        }
    }

    fn stop_streamer(&mut self) {
        if let Some(streamer) = self.streamer.take() {
            streamer.stop();
        }
    }

    // ---- upstream side -----------------------------------------------------

    /// Starts a new link unless one is already open or in flight.
    fn connect(&mut self) {
        if self.link.is_some() {
            return;
        }
        self.retry_at = None;
        self.last_link = self.last_link.next();
        debug!("Starting {}", self.last_link);
        self.link = Some(UpstreamLink::start(
            self.last_link,
            self.app.connector.clone(),
            self.app.config.session.connect_timeout(),
            self.link_tx.clone(),
        ));
        self.link_open = false;
    }

    fn forward(&mut self, frame: Frame) {
        let frame = match self.link.as_ref().filter(|_| self.link_open) {
            Some(link) => match link.send(frame) {
                Ok(()) => {
                    self.handle.liveness.touch();
                    return;
                }
                Err(frame) => {
                    // The link reports its own Closed; the frame waits for the next one.
                    debug!("{} stopped accepting frames", link.id());
                    self.link_open = false;
                    frame
                }
            },
            None => frame,
        };

        let limit = self.app.config.session.pending_queue_limit;
        if self.pending.len() >= limit {
            warn!("Pending queue full ({}); dropping frame", limit);
            self.send(ServerMessage::error("gateway not ready; frame dropped"));
            return;
        }

        if self.pending.is_empty() {
            self.send(ServerMessage::update(
                "reconnecting to the speech gateway, please wait",
            ));
        }
        self.pending.push_back(Pending {
            frame,
            deadline: Instant::now() + self.app.config.session.pending_timeout(),
        });

        if self.link.is_none() && self.retry_at.is_none() {
            self.connect();
        }
    }

    fn flush_pending(&mut self) {
        let Some(link) = &self.link else { return };
        let mut flushed = 0;
        while let Some(Pending { frame, deadline }) = self.pending.pop_front() {
            if let Err(frame) = link.send(frame) {
                warn!("{} stopped accepting frames during flush", link.id());
                self.pending.push_front(Pending { frame, deadline });
                self.link_open = false;
                break;
            }
            flushed += 1;
        }
        if flushed > 0 {
            debug!("Flushed {} queued frame(s)", flushed);
            self.handle.liveness.touch();
        }
    }

    /// Puts frames a failed link never wrote back at the head of the queue,
    /// ahead of anything queued since.
    fn requeue(&mut self, frames: Vec<Frame>) {
        debug!("Requeueing {} unsent frame(s)", frames.len());
        self.link_open = false;
        if self.pending.is_empty() {
            self.send(ServerMessage::update(
                "reconnecting to the speech gateway, please wait",
            ));
        }

        let fresh = Instant::now() + self.app.config.session.pending_timeout();
        let deadline = self.pending.front().map_or(fresh, |p| p.deadline.min(fresh));
        for frame in frames.into_iter().rev() {
            self.pending.push_front(Pending { frame, deadline });
        }
    }

    fn expire_pending(&mut self) {
        let now = Instant::now();
        let mut dropped = 0;
        while self.pending.front().is_some_and(|p| p.deadline <= now) {
            self.pending.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            warn!("{} queued frame(s) timed out", dropped);
            self.send(ServerMessage::error(format!(
                "gateway not ready; {} frame(s) dropped",
                dropped
            )));
        }
    }

    fn on_link_event(&mut self, LinkEvent { link_id, event }: LinkEvent) {
        let current = self.link.as_ref().map(LinkHandle::id) == Some(link_id);
        // Unsent frames of the latest link are kept even if its Closed won the race.
        let unsent_of_latest = matches!(event, UpstreamEvent::Unsent(_)) && link_id == self.last_link;
        if !current && !unsent_of_latest {
            trace!("Ignoring event from stale {}", link_id);
            return;
        }

        match event {
            UpstreamEvent::Opened => {
                info!("Gateway connected ({})", link_id);
                self.link_open = true;
                self.backoff.reset();
                self.set_state(SessionState::Active);
                self.flush_pending();
            }
            UpstreamEvent::Frame(frame) => {
                self.handle.liveness.touch();
                let frame = self.mix_gateway_frame(frame);
                self.send_frame(frame);
            }
            UpstreamEvent::Unsent(frames) => self.requeue(frames),
            UpstreamEvent::Error(reason) => {
                warn!("Gateway error: {}", reason);
                self.send(ServerMessage::error(format!("gateway connection error: {}", reason)));
            }
            UpstreamEvent::Closed { code, reason } => {
                info!("Gateway closed: code={}, reason='{}'", code, reason);
                self.drop_link();
                self.set_state(SessionState::Degraded);
                if !is_clean_close(code) {
                    self.schedule_reconnect();
                }
            }
            UpstreamEvent::Failed(reason) => {
                warn!("Gateway connect failed: {}", reason);
                self.drop_link();
                self.set_state(SessionState::Degraded);
                self.send(ServerMessage::error(format!("gateway connection error: {}", reason)));
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.backoff.is_exhausted() {
            warn!(
                "Giving up after {} reconnect attempt(s)",
                self.backoff.attempt()
            );
            self.send(ServerMessage::error(
                "speech gateway unavailable; send a message to retry",
            ));
            return;
        }

        let delay = self.backoff.next();
        info!(
            "Reconnecting in {:?} (attempt {})",
            delay,
            self.backoff.attempt()
        );
        self.send(ServerMessage::update("speech gateway connection is being renewed"));
        self.retry_at = Some(Instant::now() + delay);
    }

    fn drop_link(&mut self) {
        self.link = None;
        self.link_open = false;
    }

    /// Mixes the ambient bed into audio-output envelopes. Anything that
    /// cannot be mixed is returned untouched.
    fn mix_gateway_frame(&mut self, frame: Frame) -> Frame {
        if !self.ambient_enabled || !self.mixer.is_loaded() {
            return frame;
        }

        let classified = GatewayFrame::classify(&frame, &self.app.config.gateway.audio_delta_type);
        let GatewayFrame::AudioDelta(delta) = classified else {
            return frame;
        };

        match delta.rewrite(|pcm| self.mixer.mix(pcm)) {
            Ok(mixed) => Frame::Text(mixed),
            Err(e) => {
                debug!("Forwarding unmixed audio: {}", e);
                frame
            }
        }
    }

    // ---- output ------------------------------------------------------------

    fn status(&self) -> ServerMessage {
        ServerMessage::AmbientStatus {
            enabled: self.ambient_enabled,
            is_loaded: self.mixer.is_loaded(),
            current: self.current_track(),
        }
    }

    fn current_track(&self) -> Option<String> {
        self.mixer.track_name().map(str::to_owned)
    }

    fn send(&self, message: ServerMessage) -> bool {
        match message.to_json() {
            Ok(json) => self.send_frame(Frame::Text(json)),
            Err(e) => {
                warn!("Failed to serialize {:?}: {}", message, e);
                false
            }
        }
    }

    fn send_frame(&self, frame: Frame) -> bool {
        self.outbound.send(Outbound::Frame(frame)).is_ok()
    }

    fn close_both(&mut self, reason: &str) {
        if let Some(link) = self.link.take() {
            link.close(CLOSE_NORMAL, reason);
        }
        self.link_open = false;
        let _ = self.outbound.send(Outbound::Close {
            code: CLOSE_NORMAL,
            reason: reason.to_string(),
        });
        self.set_state(SessionState::Closed);
    }

    fn teardown(&mut self) {
        self.set_state(SessionState::Closed);
        self.stop_streamer();
        self.retry_at = None;
        self.pending.clear();
        if let Some(link) = self.link.take() {
            link.close(CLOSE_NORMAL, REASON_CLIENT_GONE);
        }
        if self
            .app
            .registry
            .remove_if(&self.id, self.handle.token())
            .is_some()
        {
            debug!("Removed from registry");
        }
        info!("Session closed ({} active)", self.app.registry.len());
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use byteorder::{ByteOrder, LittleEndian};
    use serde_json::{Value, json};
    use tokio_tungstenite::tungstenite::Message;

    use super::*;
    use crate::{
        audio::{AmbientLibrary, AmbientTrack, Levels},
        configs::Config,
        gateway::link::mock::{MockConnector, MockPeer},
    };

    struct Harness {
        app: Arc<AppState>,
        connector: Arc<MockConnector>,
        handle: SessionHandle,
        out: flume::Receiver<Outbound>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_tracks(vec![
                AmbientTrack::new("office", "", vec![100; 4]),
                AmbientTrack::new("rain", "", vec![-5; 8]),
            ])
        }

        fn with_tracks(tracks: Vec<AmbientTrack>) -> Self {
            let connector = MockConnector::new();
            let library = AmbientLibrary::new(
                tracks.into_iter().map(Arc::new).collect(),
                Levels::new(0.15, 0.9),
            );
            let app = AppState::new(Config::default(), library, connector.clone());
            let (tx, out) = flume::unbounded();
            let (_, handle) = Session::spawn(app.clone(), tx);
            Self {
                app,
                connector,
                handle,
                out,
            }
        }

        fn client(&self, frame: Frame) {
            self.handle.send(SessionEvent::Client(frame));
        }

        fn command(&self, value: Value) {
            self.client(Frame::Text(value.to_string()));
        }

        async fn peer(&self) -> MockPeer {
            for _ in 0..1_000 {
                if let Some(peer) = self.connector.take_peer() {
                    return peer;
                }
                tokio::task::yield_now().await;
            }
            panic!("no gateway connection was made");
        }

        async fn next(&self) -> Outbound {
            self.out.recv_async().await.unwrap()
        }

        async fn next_text(&self) -> String {
            loop {
                if let Outbound::Frame(Frame::Text(text)) = self.next().await {
                    return text;
                }
            }
        }

        async fn next_json(&self) -> Value {
            serde_json::from_str(&self.next_text().await).unwrap()
        }

        /// Everything already sent to the client, as JSON.
        fn drain_json(&self) -> Vec<Value> {
            self.out
                .try_iter()
                .filter_map(|out| match out {
                    Outbound::Frame(Frame::Text(text)) => serde_json::from_str(&text).ok(),
                    _ => None,
                })
                .collect()
        }

        async fn settle(&self) {
            for _ in 0..50 {
                tokio::task::yield_now().await;
            }
        }
    }

    fn pcm(samples: &[i16]) -> Vec<u8> {
        let mut bytes = vec![0u8; samples.len() * 2];
        LittleEndian::write_i16_into(samples, &mut bytes);
        bytes
    }

    fn delta(samples: &[i16]) -> String {
        json!({"type": "response.audio.delta", "delta": BASE64_STANDARD.encode(pcm(samples))})
            .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn greets_with_status() {
        let h = Harness::new();
        assert_eq!(
            h.next_json().await,
            json!({"type": "ambient.status", "enabled": true, "isLoaded": true, "current": "office"})
        );
        assert_eq!(h.app.registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_frames_flush_in_order() {
        let h = Harness::new();
        h.client(Frame::Text("first".into()));
        h.client(Frame::Binary(vec![1, 2].into()));

        let mut peer = h.peer().await;
        assert_eq!(peer.recv().await, Some(Message::Text("first".into())));
        assert_eq!(peer.recv().await, Some(Message::Binary(vec![1, 2].into())));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_exactly_once_after_delay() {
        let h = Harness::new();
        h.next_json().await;
        let peer = h.peer().await;
        h.settle().await;

        peer.close(1011, "server error");
        assert_eq!(h.next_json().await["type"], "session.update");
        assert_eq!(h.connector.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(h.connector.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        h.settle().await;
        assert_eq!(h.connector.attempts(), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_reconnect_after_client_closes() {
        let h = Harness::new();
        h.next_json().await;
        let peer = h.peer().await;
        h.settle().await;

        peer.close(1006, "");
        assert_eq!(h.next_json().await["type"], "session.update");

        h.handle.send(SessionEvent::ClientClosed);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(h.connector.attempts(), 1);
        assert!(h.app.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clean_close_reconnects_on_demand() {
        let h = Harness::new();
        h.next_json().await;
        let peer = h.peer().await;
        h.settle().await;

        peer.close(1000, "done");
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.connector.attempts(), 1);

        h.client(Frame::Text("hello".into()));
        assert_eq!(h.next_json().await["type"], "session.update");
        let mut peer = h.peer().await;
        assert_eq!(peer.recv().await, Some(Message::Text("hello".into())));
        assert_eq!(h.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connects_back_off_then_give_up() {
        let h = Harness::new();
        h.connector.fail_next(usize::MAX);
        h.next_json().await;

        // 1 initial attempt + 5 retries at 1s, 2s, 4s, 8s, 8s.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.connector.attempts(), 6);
        assert_eq!(
            h.drain_json().last(),
            Some(&json!({
                "type": "error",
                "message": "speech gateway unavailable; send a message to retry"
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn frames_queue_while_degraded_and_flush_on_reconnect() {
        let h = Harness::new();
        h.next_json().await;
        let peer = h.peer().await;
        h.settle().await;

        peer.close(1011, "server error");
        assert_eq!(h.next_json().await["type"], "session.update");

        h.client(Frame::Text("one".into()));
        h.client(Frame::Binary(vec![3, 4].into()));
        h.settle().await;
        assert_eq!(h.connector.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        let mut peer = h.peer().await;
        assert_eq!(peer.recv().await, Some(Message::Text("one".into())));
        assert_eq!(peer.recv().await, Some(Message::Binary(vec![3, 4].into())));
        assert_eq!(h.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_keeps_frames_for_the_next_link() {
        let h = Harness::new();
        h.next_json().await;
        let mut first = h.peer().await;
        h.settle().await;

        first.stop_reading();
        h.client(Frame::Text("a".into()));
        h.settle().await;
        h.client(Frame::Text("b".into()));
        h.settle().await;

        let messages = h.drain_json();
        assert!(
            messages.iter().any(|m| m["type"] == "error"),
            "{messages:?}"
        );

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        let mut second = h.peer().await;
        assert_eq!(second.recv().await, Some(Message::Text("a".into())));
        assert_eq!(second.recv().await, Some(Message::Text("b".into())));
        assert_eq!(h.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_connect_is_retried() {
        let h = Harness::new();
        h.connector.stall(true);
        h.next_json().await;

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(h.connector.attempts(), 1);
        let messages = h.drain_json();
        assert!(
            messages.iter().any(|m| m["type"] == "error"
                && m["message"].as_str().is_some_and(|t| t.contains("timed out"))),
            "{messages:?}"
        );

        h.connector.stall(false);
        h.client(Frame::Text("late".into()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut peer = h.peer().await;
        assert_eq!(peer.recv().await, Some(Message::Text("late".into())));
        assert_eq!(h.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_control_frames_are_forwarded() {
        let h = Harness::new();
        h.next_json().await;
        let mut peer = h.peer().await;
        h.settle().await;

        let text = json!({"type": "ambient.control", "action": "louder"}).to_string();
        h.client(Frame::Text(text.clone()));
        assert_eq!(peer.recv().await, Some(Message::Text(text.into())));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_frame_times_out() {
        let h = Harness::new();
        h.connector.stall(true);
        h.next_json().await;

        h.client(Frame::Binary(vec![0, 0].into()));
        assert_eq!(h.next_json().await["type"], "session.update");

        let error = h.next_json().await;
        assert_eq!(error["type"], "error");
        assert!(error["message"].as_str().unwrap().contains("1 frame"));
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_frames() {
        let h = Harness::new();
        h.connector.stall(true);
        h.next_json().await;

        for _ in 0..=64 {
            h.client(Frame::Binary(vec![0, 0].into()));
        }
        assert_eq!(h.next_json().await["type"], "session.update");
        let error = h.next_json().await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "gateway not ready; frame dropped");
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_answered_locally() {
        let h = Harness::new();
        h.next_json().await;
        let mut peer = h.peer().await;

        h.command(json!({"type": "ambient.control", "action": "toggle"}));
        assert_eq!(h.next_json().await["enabled"], false);

        h.command(json!({"type": "ambient.control", "action": "switch"}));
        assert_eq!(
            h.next_json().await,
            json!({"type": "ambient.switched", "success": true, "current": "rain"})
        );

        h.command(json!({"type": "ambient.control", "action": "levels", "levels": {"ambient": 150, "voice": 40}}));
        assert_eq!(
            h.next_json().await,
            json!({"type": "ambient.levels", "levels": {"ambient": 1.0, "voice": 0.4}})
        );

        h.settle().await;
        assert_eq!(peer.try_recv(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn switch_without_tracks_fails() {
        let h = Harness::with_tracks(Vec::new());
        assert_eq!(h.next_json().await["isLoaded"], false);

        h.command(json!({"type": "ambient.control", "action": "switch"}));
        assert_eq!(
            h.next_json().await,
            json!({"type": "ambient.switched", "success": false, "current": null})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn streamer_sends_chunks_until_stopped() {
        let h = Harness::new();
        h.next_json().await;

        h.command(json!({"type": "ambient.control", "action": "start"}));
        assert_eq!(h.next_json().await["active"], true);

        let chunk = h.next_json().await;
        assert_eq!(chunk["type"], "ambient.audio");
        assert_eq!(chunk["sampleRate"], 24_000);
        assert_eq!(chunk["samples"], 11_520);
        let audio = BASE64_STANDARD.decode(chunk["audio"].as_str().unwrap()).unwrap();
        assert_eq!(audio.len(), 11_520 * 2);

        h.command(json!({"type": "ambient.control", "action": "stop"}));
        // A tick may already be queued behind the command.
        loop {
            let msg = h.next_json().await;
            if msg["type"] == "ambient.streaming" {
                assert_eq!(msg["active"], false);
                break;
            }
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(h.out.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn streamer_stops_when_nothing_is_loaded() {
        let h = Harness::with_tracks(Vec::new());
        h.next_json().await;

        h.command(json!({"type": "ambient.control", "action": "start"}));
        assert_eq!(h.next_json().await["active"], true);
        assert_eq!(
            h.next_json().await,
            json!({"type": "ambient.streaming", "active": false})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn audio_deltas_are_mixed() {
        let h = Harness::new();
        h.next_json().await;
        let peer = h.peer().await;
        h.settle().await;

        peer.send_text(&delta(&[1000, -1000, 0, 32767]));
        let msg = h.next_json().await;
        let mixed = BASE64_STANDARD.decode(msg["delta"].as_str().unwrap()).unwrap();
        let mut samples = [0i16; 4];
        LittleEndian::read_i16_into(&mixed, &mut samples);
        assert_eq!(samples, [915, -885, 15, 29505]);
    }

    #[tokio::test(start_paused = true)]
    async fn passthrough_when_disabled_or_unparseable() {
        let h = Harness::new();
        h.next_json().await;
        let peer = h.peer().await;
        h.settle().await;

        peer.send_text("not json");
        assert_eq!(h.next_text().await, "not json");

        peer.send_binary(&[1, 2, 3]);
        assert_eq!(h.next().await, Outbound::Frame(Frame::Binary(vec![1, 2, 3].into())));

        let odd = json!({"type": "response.audio.delta", "delta": BASE64_STANDARD.encode([1u8, 2, 3])})
            .to_string();
        peer.send_text(&odd);
        assert_eq!(h.next_text().await, odd);

        h.command(json!({"type": "ambient.control", "action": "toggle"}));
        h.next_json().await;
        let frame = delta(&[1000, -1000]);
        peer.send_text(&frame);
        assert_eq!(h.next_text().await, frame);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_closes_both_sides() {
        let h = Harness::new();
        h.next_json().await;
        let mut peer = h.peer().await;
        h.settle().await;

        h.handle.send(SessionEvent::Evict);
        assert_eq!(
            h.next().await,
            Outbound::Close {
                code: 1000,
                reason: "inactive".into()
            }
        );
        match peer.recv().await {
            Some(Message::Close(Some(frame))) => assert_eq!(u16::from(frame.code), 1000),
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}
