//! The client session state machine.
//!
//! One `ClientSession` owns one logical connection to the room: a health
//! probe gates every transport open, a spawned io task pumps the socket and
//! the heartbeat, and an automatic reconnect cycle with capped exponential
//! backoff takes over on unexpected loss. Messages sent while disconnected
//! are queued and flushed in order on reconnect.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use pitchside_shared::config::ReconnectConfig;
use pitchside_shared::protocol::{ClientMsg, ServerMsg};

use crate::backoff::Backoff;
use crate::error::ClientError;
use crate::events::{EventBus, EventKind, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ws_url: String,
    pub health_url: String,
    pub connect_timeout: Duration,
    pub probe_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// A ping left unanswered this long marks the link degraded
    pub pong_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl SessionConfig {
    pub fn new(ws_url: impl Into<String>, health_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            health_url: health_url.into(),
            connect_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(4),
            reconnect: ReconnectConfig::default(),
        }
    }
}

struct Inner {
    config: SessionConfig,
    state: Mutex<SessionState>,
    /// Orthogonal to `state`: true while an automatic cycle is in flight
    reconnecting: AtomicBool,
    /// Bumped by every manual connect; stale io tasks and pending backoff
    /// cycles notice and abandon themselves
    generation: AtomicU64,
    events: EventBus,
    /// Channel into the live io task, None while disconnected
    writer: Mutex<Option<mpsc::UnboundedSender<ClientMsg>>>,
    /// FIFO buffer for sends issued while disconnected
    outbox: Mutex<VecDeque<ClientMsg>>,
    http: reqwest::Client,
}

impl Inner {
    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap();
        if *state != next {
            *state = next;
            drop(state);
            self.events.emit(&SessionEvent::StateChanged(next));
        }
    }
}

pub struct ClientSession {
    inner: Arc<Inner>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl ClientSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(SessionState::Disconnected),
                reconnecting: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                events: EventBus::new(),
                writer: Mutex::new(None),
                outbox: Mutex::new(VecDeque::new()),
                http: reqwest::Client::new(),
            }),
        }
    }

    pub fn on(&self, kind: EventKind, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        self.inner.events.on(kind, listener);
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().unwrap()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.reconnecting.load(Ordering::SeqCst)
    }

    /// Probe, then open the transport. A manual connect cancels any pending
    /// reconnect backoff so two attempts never race.
    pub async fn connect(&self) -> Result<(), ClientError> {
        if self.state() == SessionState::Connected {
            return Ok(());
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.reconnecting.store(false, Ordering::SeqCst);
        self.inner.set_state(SessionState::Connecting);
        match open_transport(self.inner.clone(), generation).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.inner.set_state(SessionState::Disconnected);
                Err(err)
            }
        }
    }

    /// Hand a message to the live connection, or buffer it FIFO while
    /// disconnected. Never blocks.
    pub fn send(&self, msg: ClientMsg) {
        let writer = self.inner.writer.lock().unwrap();
        match writer.as_ref() {
            Some(tx) => {
                if let Err(returned) = tx.send(msg) {
                    // The io task died under us; keep the intent for the
                    // next connection.
                    self.inner.outbox.lock().unwrap().push_back(returned.0);
                }
            }
            None => {
                self.inner.outbox.lock().unwrap().push_back(msg);
            }
        }
    }

    pub fn join(&self, room_id: impl Into<String>) {
        self.send(ClientMsg::Join {
            room_id: room_id.into(),
        });
    }

    pub fn place_bet(&self, team: u8, amount: u64) {
        self.send(ClientMsg::PlaceBet { team, amount });
    }

    #[cfg(test)]
    fn queued(&self) -> Vec<ClientMsg> {
        self.inner.outbox.lock().unwrap().iter().cloned().collect()
    }
}

/// Probe the health endpoint, open the socket, install the writer and flush
/// the outbox, then hand the stream to a spawned io task.
async fn open_transport(inner: Arc<Inner>, generation: u64) -> Result<(), ClientError> {
    // Fail fast on a dead server without ever opening a socket.
    let probe = inner.http.get(&inner.config.health_url).send();
    let response = tokio::time::timeout(inner.config.probe_timeout, probe)
        .await
        .map_err(|_| ClientError::Timeout("health probe"))?
        .map_err(|err| ClientError::ProbeFailed(err.to_string()))?;
    if !response.status().is_success() {
        return Err(ClientError::ProbeFailed(format!(
            "health endpoint returned {}",
            response.status()
        )));
    }

    let connect = tokio_tungstenite::connect_async(inner.config.ws_url.as_str());
    let (ws, _) = tokio::time::timeout(inner.config.connect_timeout, connect)
        .await
        .map_err(|_| ClientError::Timeout("connect handshake"))?
        .map_err(|err| ClientError::Connection(err.to_string()))?;

    let (writer_tx, writer_rx) = mpsc::unbounded_channel::<ClientMsg>();
    {
        // Install the writer and drain the outbox inside one critical
        // section so no new send can jump ahead of a queued message.
        let mut writer = inner.writer.lock().unwrap();
        let mut outbox = inner.outbox.lock().unwrap();
        for msg in outbox.drain(..) {
            let _ = writer_tx.send(msg);
        }
        *writer = Some(writer_tx);
    }

    inner.reconnecting.store(false, Ordering::SeqCst);
    inner.set_state(SessionState::Connected);
    inner.events.emit(&SessionEvent::Connected);

    tokio::spawn(run_io(inner, ws, writer_rx, generation));
    Ok(())
}

async fn maybe_sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

async fn run_io(
    inner: Arc<Inner>,
    ws: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    mut writer_rx: mpsc::UnboundedReceiver<ClientMsg>,
    generation: u64,
) {
    let (mut sink, mut stream) = ws.split();

    let mut heartbeat = tokio::time::interval(inner.config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    heartbeat.tick().await; // the first tick fires immediately

    // Oldest unanswered ping: (timestamp sent on the wire, local send time)
    let mut pending_ping: Option<(u64, Instant)> = None;

    let reason = loop {
        let pong_deadline = pending_ping.map(|(_, sent_at)| sent_at + inner.config.pong_timeout);

        tokio::select! {
            biased;

            Some(msg) = writer_rx.recv() => {
                match serde_json::to_string(&msg) {
                    Ok(text) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break "send failed".to_string();
                        }
                    }
                    Err(err) => tracing::warn!("dropping unserializable message: {}", err),
                }
            }

            _ = heartbeat.tick() => {
                let timestamp = now_millis();
                if pending_ping.is_none() {
                    pending_ping = Some((timestamp, Instant::now()));
                }
                if let Ok(text) = serde_json::to_string(&ClientMsg::Ping { timestamp }) {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break "send failed".to_string();
                    }
                }
            }

            _ = maybe_sleep_until(pong_deadline) => {
                // Degraded link: tear down proactively rather than waiting
                // for the transport's own close event.
                break "heartbeat pong timed out".to_string();
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(server_msg) = serde_json::from_str::<ServerMsg>(&text) {
                            if let ServerMsg::Pong(pong) = &server_msg {
                                if let Some((sent_ts, sent_at)) = pending_ping {
                                    if pong.timestamp == sent_ts {
                                        pending_ping = None;
                                        inner.events.emit(&SessionEvent::Latency {
                                            rtt_ms: sent_at.elapsed().as_millis() as u64,
                                        });
                                    }
                                }
                            }
                            inner.events.emit(&SessionEvent::Message(server_msg));
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break "connection closed".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break format!("transport error: {}", err),
                }
            }
        }
    };

    // A newer manual connect owns the session now; this task just exits.
    if inner.generation.load(Ordering::SeqCst) != generation {
        return;
    }

    *inner.writer.lock().unwrap() = None;
    tracing::info!("connection lost: {}", reason);
    inner.set_state(SessionState::Disconnected);
    inner.events.emit(&SessionEvent::Closed);
    inner.events.emit(&SessionEvent::Error(reason));

    inner.reconnecting.store(true, Ordering::SeqCst);
    tokio::spawn(run_reconnect(inner, generation));
}

/// Automatic reconnect cycle: capped exponential backoff, bounded attempts,
/// abandoned the moment a manual connect supersedes it.
fn run_reconnect(
    inner: Arc<Inner>,
    generation: u64,
) -> futures_util::future::BoxFuture<'static, ()> {
    // Boxed instead of `async fn`: the open_transport -> run_io ->
    // run_reconnect spawn cycle otherwise makes the opaque futures'
    // `Send` inference unresolvable.
    Box::pin(async move {
        let backoff = Backoff::from_config(&inner.config.reconnect);
        for attempt in 1..=backoff.max_attempts() {
            let Some(delay) = backoff.delay_for(attempt) else {
                break;
            };
            tokio::time::sleep(delay).await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }

            inner.set_state(SessionState::Connecting);
            tracing::info!(attempt, "reconnecting");
            match open_transport(inner.clone(), generation).await {
                Ok(()) => return,
                Err(err) => {
                    inner.set_state(SessionState::Disconnected);
                    inner.events.emit(&SessionEvent::Error(err.to_string()));
                }
            }
        }

        // Terminal. Only an explicit connect() leaves this state.
        inner.reconnecting.store(false, Ordering::SeqCst);
        inner.set_state(SessionState::Disconnected);
        inner.events.emit(&SessionEvent::Error(
            ClientError::AttemptsExhausted {
                attempts: backoff.max_attempts(),
            }
            .to_string(),
        ));
    })
}
