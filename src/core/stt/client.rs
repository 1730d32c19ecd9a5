//! Streaming transcription websocket client.
//!
//! [`StreamingClient`] owns one recognition session at a time: it opens the
//! socket, pushes audio frames, parses inbound transcript/session messages,
//! manages reconnection with a bounded budget, and performs the graceful
//! shutdown handshake.
//!
//! # Architecture
//!
//! All socket I/O and every state transition happen inside a single
//! session-owning task; the client handle only enqueues work:
//!
//! ```text
//! ┌──────────────┐   audio (mpsc)    ┌───────────────────┐
//! │ push_audio() │──────────────────▶│                   │
//! ├──────────────┤   control (mpsc)  │   session task    │──▶ websocket
//! │ stop()       │──────────────────▶│  (single writer)  │
//! └──────────────┘                   └─────────┬─────────┘
//!                                              │ transcripts (mpsc)
//!                                              │ state (watch)
//!                                              ▼
//!                                         subscribers
//! ```
//!
//! Callers never mutate session state directly; `stop()` posts a control
//! signal and the task performs the transition. The session task also owns
//! the `audio_enabled` flag, raising it on its Connected transition; the one
//! caller-side exception is `stop()` clearing it synchronously so the
//! caller's recording indicator can react instantly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use super::config::{RecognizerEndpoint, StreamingConfig};
use super::messages::{
    AudioFrameMessage, InboundMessage, SessionConfigMessage, TerminateSessionMessage,
    TranscriptMessage,
};
use super::types::{SessionState, StreamingError, StreamingResult, TranscriptionResult};

// =============================================================================
// Constants
// =============================================================================

/// How long the socket is held open after `stop()` waiting for the
/// authoritative final transcript before cleanup is forced.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Reconnection budget after a socket failure. Exhausting it leaves the
/// session in `Error` until an explicit `start()`.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Base delay for the linear reconnect backoff (`attempt x base`).
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Bounded audio queue depth; backpressure beyond this drops frames.
const AUDIO_QUEUE_DEPTH: usize = 32;

/// Bounded transcript queue depth; slow subscribers must not stall the
/// socket reader, so overflow drops with a warning.
const TRANSCRIPT_QUEUE_DEPTH: usize = 256;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

// =============================================================================
// Session Task Plumbing
// =============================================================================

/// Control signals posted from the client handle to the session task.
#[derive(Debug)]
enum ControlSignal {
    /// Begin graceful shutdown (audio already disabled synchronously)
    Stop,
    /// Close unconditionally, skipping the final-transcript wait
    ForceCleanup,
}

/// Why one connection ended, from the session task's perspective.
enum SessionExit {
    /// Graceful shutdown, forced cleanup, or server termination; no reconnect
    Clean,
    /// Transport failure; candidate for reconnection
    Transport(StreamingError),
}

/// What to do after one inbound frame.
enum MessageOutcome {
    Continue,
    /// Final+formatted transcript arrived during graceful shutdown
    ShutdownComplete,
    /// Transport closed by the peer
    Closed,
}

/// Shared state handed to the session-owning task.
struct SessionContext {
    endpoint: RecognizerEndpoint,
    config: StreamingConfig,
    state_tx: Arc<watch::Sender<SessionState>>,
    transcript_tx: mpsc::Sender<TranscriptionResult>,
    audio_enabled: Arc<AtomicBool>,
    is_listening: Arc<AtomicBool>,
    session_id: Arc<RwLock<Option<String>>>,
}

// =============================================================================
// StreamingClient
// =============================================================================

/// Client for the real-time speech recognition socket.
///
/// At most one session is alive at a time. `start()` is idempotent while
/// connected; after a stop or terminal error, a new `start()` opens a fresh
/// session and a fresh transcript stream.
pub struct StreamingClient {
    endpoint: RecognizerEndpoint,
    state_tx: Arc<watch::Sender<SessionState>>,
    transcript_rx: Option<mpsc::Receiver<TranscriptionResult>>,
    audio_tx: Option<mpsc::Sender<Bytes>>,
    control_tx: Option<mpsc::Sender<ControlSignal>>,
    session_handle: Option<tokio::task::JoinHandle<()>>,
    audio_enabled: Arc<AtomicBool>,
    starting: Arc<AtomicBool>,
    dropped_frames: Arc<AtomicU64>,
    is_listening: Arc<AtomicBool>,
    session_id: Arc<RwLock<Option<String>>>,
}

impl StreamingClient {
    /// Create a client for the given recognizer endpoint. No connection is
    /// made until [`start`](Self::start).
    pub fn new(endpoint: RecognizerEndpoint) -> Self {
        let (state_tx, _state_rx) = watch::channel(SessionState::Disconnected);
        Self {
            endpoint,
            state_tx: Arc::new(state_tx),
            transcript_rx: None,
            audio_tx: None,
            control_tx: None,
            session_handle: None,
            audio_enabled: Arc::new(AtomicBool::new(false)),
            starting: Arc::new(AtomicBool::new(false)),
            dropped_frames: Arc::new(AtomicU64::new(0)),
            is_listening: Arc::new(AtomicBool::new(false)),
            session_id: Arc::new(RwLock::new(None)),
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to session state changes.
    pub fn session_states(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Take the transcript stream for the current session.
    ///
    /// Returns `None` if no session was started or the stream was already
    /// taken. The stream ends when the session fully stops; a later `start()`
    /// creates a fresh one.
    pub fn take_transcripts(&mut self) -> Option<mpsc::Receiver<TranscriptionResult>> {
        self.transcript_rx.take()
    }

    /// Number of audio frames dropped because no session was accepting them.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Whether the recognizer is currently accepting speech.
    pub fn is_listening(&self) -> bool {
        self.is_listening.load(Ordering::Acquire)
    }

    /// Session id assigned by the recognizer, once the session has begun.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Open a session with the given configuration.
    ///
    /// Idempotent while connected: returns `Ok(())` without opening a second
    /// socket. Fails with [`StreamingError::AlreadyStarting`] only if a
    /// connect attempt is already in flight. Suspends the caller until the
    /// socket handshake completes or fails.
    pub async fn start(&mut self, config: StreamingConfig) -> StreamingResult<()> {
        if self.state() == SessionState::Connected {
            debug!("start() called while connected; session reused");
            return Ok(());
        }

        if self.starting.swap(true, Ordering::AcqRel) {
            return Err(StreamingError::AlreadyStarting);
        }

        let result = self.start_session(config).await;
        self.starting.store(false, Ordering::Release);
        result
    }

    async fn start_session(&mut self, config: StreamingConfig) -> StreamingResult<()> {
        config.validate()?;

        // Tear down a previous session task that ended in Error or was never
        // fully cleaned up; its channels are replaced below.
        if let Some(handle) = self.session_handle.take() {
            handle.abort();
        }
        *self.session_id.write() = None;
        self.is_listening.store(false, Ordering::Release);

        let (audio_tx, audio_rx) = mpsc::channel::<Bytes>(AUDIO_QUEUE_DEPTH);
        let (control_tx, control_rx) = mpsc::channel::<ControlSignal>(4);
        let (transcript_tx, transcript_rx) =
            mpsc::channel::<TranscriptionResult>(TRANSCRIPT_QUEUE_DEPTH);
        let (connected_tx, connected_rx) = oneshot::channel::<StreamingResult<()>>();

        self.audio_tx = Some(audio_tx);
        self.control_tx = Some(control_tx);
        self.transcript_rx = Some(transcript_rx);

        let handshake_timeout = config.speech_timeout;
        let ctx = SessionContext {
            endpoint: self.endpoint.clone(),
            config,
            state_tx: self.state_tx.clone(),
            transcript_tx,
            audio_enabled: self.audio_enabled.clone(),
            is_listening: self.is_listening.clone(),
            session_id: self.session_id.clone(),
        };

        // The session task raises audio_enabled itself on its Connected
        // transition. Setting it here would desynchronize the flag from the
        // session state if the handshake outlives the wait below but still
        // succeeds in the background.
        self.session_handle = Some(tokio::spawn(run_session(
            ctx,
            audio_rx,
            control_rx,
            connected_tx,
        )));

        match timeout(handshake_timeout, connected_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(_closed)) => Err(StreamingError::ConnectionFailed(
                "session task exited before handshake".to_string(),
            )),
            Err(_elapsed) => Err(StreamingError::Timeout(format!(
                "no session handshake within {handshake_timeout:?}"
            ))),
        }
    }

    /// Enqueue one PCM frame without blocking.
    ///
    /// Frames pushed while the session is not `Connected` (or while the queue
    /// is full) are dropped and counted; this is never an error.
    pub fn push_audio(&self, frame: Bytes) {
        if !self.audio_enabled.load(Ordering::Acquire) || self.state() != SessionState::Connected {
            let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(dropped, "audio frame dropped: session not accepting audio");
            return;
        }

        match &self.audio_tx {
            Some(tx) => {
                if tx.try_send(frame).is_err() {
                    let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(dropped, "audio frame dropped: send queue full or closed");
                }
            }
            None => {
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Initiate graceful shutdown without blocking the caller.
    ///
    /// Audio push is disabled immediately; the socket stays open until the
    /// final formatted transcript arrives or [`SHUTDOWN_TIMEOUT`] elapses,
    /// whichever is first. Progress is observable on the state stream.
    pub fn stop(&self) {
        self.audio_enabled.store(false, Ordering::Release);
        match &self.control_tx {
            Some(tx) => {
                if tx.try_send(ControlSignal::Stop).is_err() {
                    debug!("stop() with no active session task");
                }
            }
            None => debug!("stop() before any session was started"),
        }
    }

    /// Hard stop: skip the graceful-shutdown wait and close unconditionally.
    ///
    /// Intended for app termination paths where the last utterance may be
    /// sacrificed.
    pub async fn force_cleanup(&mut self) {
        self.audio_enabled.store(false, Ordering::Release);
        if let Some(tx) = &self.control_tx {
            let _ = tx.try_send(ControlSignal::ForceCleanup);
        }

        if let Some(mut handle) = self.session_handle.take() {
            if timeout(Duration::from_secs(1), &mut handle).await.is_err() {
                warn!("session task did not exit on force_cleanup; aborting");
                handle.abort();
            }
        }

        self.audio_tx = None;
        self.control_tx = None;
        self.is_listening.store(false, Ordering::Release);
        *self.session_id.write() = None;
        self.state_tx.send_replace(SessionState::Disconnected);
    }
}

impl Drop for StreamingClient {
    fn drop(&mut self) {
        if let Some(tx) = &self.control_tx {
            let _ = tx.try_send(ControlSignal::ForceCleanup);
        }
        if let Some(handle) = self.session_handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Session Task
// =============================================================================

/// Outer session loop: one connection per iteration, with bounded linear
/// backoff between reconnect attempts. Sole writer of the session state.
async fn run_session(
    ctx: SessionContext,
    mut audio_rx: mpsc::Receiver<Bytes>,
    mut control_rx: mpsc::Receiver<ControlSignal>,
    connected_tx: oneshot::Sender<StreamingResult<()>>,
) {
    let mut connected_tx = Some(connected_tx);
    let mut attempt: u32 = 0;

    loop {
        ctx.state_tx.send_replace(SessionState::Connecting);

        let exit = run_connection(
            &ctx,
            &mut audio_rx,
            &mut control_rx,
            &mut connected_tx,
            &mut attempt,
        )
        .await;

        ctx.is_listening.store(false, Ordering::Release);

        match exit {
            SessionExit::Clean => {
                ctx.state_tx.send_replace(SessionState::Disconnected);
                break;
            }
            SessionExit::Transport(err) => {
                attempt += 1;
                ctx.state_tx.send_replace(SessionState::Error);

                if attempt > MAX_RECONNECT_ATTEMPTS {
                    error!(%err, "reconnection budget exhausted; session requires explicit restart");
                    if let Some(tx) = connected_tx.take() {
                        let _ = tx.send(Err(err));
                    }
                    break;
                }

                let delay = RECONNECT_BASE_DELAY * attempt;
                warn!(%err, attempt, ?delay, "socket failure; reconnecting after backoff");

                tokio::select! {
                    _ = sleep(delay) => {}
                    signal = control_rx.recv() => {
                        // A user stop cancels the pending reconnection
                        // immediately; there is no socket left to drain.
                        debug!(?signal, "reconnection cancelled by control signal");
                        ctx.state_tx.send_replace(SessionState::Disconnected);
                        break;
                    }
                }
            }
        }
    }

    ctx.audio_enabled.store(false, Ordering::Release);
}

/// Connect, run the config handshake, then pump one socket until it exits.
async fn run_connection(
    ctx: &SessionContext,
    audio_rx: &mut mpsc::Receiver<Bytes>,
    control_rx: &mut mpsc::Receiver<ControlSignal>,
    connected_tx: &mut Option<oneshot::Sender<StreamingResult<()>>>,
    attempt: &mut u32,
) -> SessionExit {
    let request = match build_request(&ctx.endpoint) {
        Ok(request) => request,
        Err(err) => {
            // Nothing transport-level to retry; report and end the session.
            error!(%err, "failed to build websocket request");
            if let Some(tx) = connected_tx.take() {
                let _ = tx.send(Err(err));
            }
            return SessionExit::Clean;
        }
    };

    let (ws, _response) = match connect_async(request).await {
        Ok(ok) => ok,
        Err(e) => {
            return SessionExit::Transport(StreamingError::ConnectionFailed(format!(
                "recognizer connect failed: {e}"
            )));
        }
    };

    let (mut sink, mut stream) = ws.split();

    // Config frame goes out exactly once, immediately after connect.
    let config_frame = SessionConfigMessage::from_config(&ctx.config);
    let json = match serde_json::to_string(&config_frame) {
        Ok(json) => json,
        Err(e) => {
            return SessionExit::Transport(StreamingError::SerializationError(format!(
                "config frame: {e}"
            )));
        }
    };
    if let Err(e) = sink.send(Message::Text(json.into())).await {
        return SessionExit::Transport(StreamingError::NetworkError(format!(
            "config frame send failed: {e}"
        )));
    }

    *attempt = 0;
    // Raise the audio flag before publishing Connected so no observer can
    // see a Connected session that drops frames.
    ctx.audio_enabled.store(true, Ordering::Release);
    ctx.state_tx.send_replace(SessionState::Connected);
    if let Some(tx) = connected_tx.take() {
        let _ = tx.send(Ok(()));
    }
    info!(url = %ctx.endpoint.url, "connected to recognizer");

    pump_socket(ctx, &mut sink, &mut stream, audio_rx, control_rx).await
}

/// Main event loop for one open socket.
async fn pump_socket(
    ctx: &SessionContext,
    sink: &mut WsSink,
    stream: &mut WsStream,
    audio_rx: &mut mpsc::Receiver<Bytes>,
    control_rx: &mut mpsc::Receiver<ControlSignal>,
) -> SessionExit {
    let idle_timeout = ctx.config.silence_timeout;
    let mut shutdown_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            // Outgoing audio; disabled once graceful shutdown begins
            Some(frame) = audio_rx.recv(), if shutdown_deadline.is_none() => {
                let payload = match serde_json::to_string(&AudioFrameMessage::encode(&frame)) {
                    Ok(payload) => payload,
                    Err(e) => {
                        // Base64 text cannot fail to serialize; count and move on.
                        warn!("audio frame dropped: {e}");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(payload.into())).await {
                    return SessionExit::Transport(StreamingError::NetworkError(format!(
                        "audio send failed: {e}"
                    )));
                }
                debug!(bytes = frame.len(), "audio frame sent");
            }

            // Control signals from the client handle
            Some(signal) = control_rx.recv() => match signal {
                ControlSignal::Stop => {
                    if shutdown_deadline.is_none() {
                        info!("graceful shutdown: holding socket open for the final transcript");
                        ctx.state_tx.send_replace(SessionState::GracefulShutdown);
                        shutdown_deadline = Some(Instant::now() + SHUTDOWN_TIMEOUT);
                    }
                }
                ControlSignal::ForceCleanup => {
                    terminate_session(sink).await;
                    return SessionExit::Clean;
                }
            },

            // Graceful-shutdown safety valve
            _ = sleep_until(shutdown_deadline.unwrap_or_else(Instant::now)),
                if shutdown_deadline.is_some() =>
            {
                warn!("graceful shutdown timed out; forcing session termination");
                terminate_session(sink).await;
                return SessionExit::Clean;
            }

            // Inbound messages, bounded by the idle window
            incoming = timeout(idle_timeout, stream.next()) => {
                match incoming {
                    Ok(Some(Ok(msg))) => {
                        match handle_message(ctx, msg, shutdown_deadline.is_some()) {
                            MessageOutcome::Continue => {}
                            MessageOutcome::ShutdownComplete => {
                                info!("final transcript received; completing graceful shutdown");
                                terminate_session(sink).await;
                                return SessionExit::Clean;
                            }
                            MessageOutcome::Closed => {
                                if shutdown_deadline.is_some() {
                                    return SessionExit::Clean;
                                }
                                return SessionExit::Transport(StreamingError::NetworkError(
                                    "socket closed by peer".to_string(),
                                ));
                            }
                        }
                    }
                    Ok(Some(Err(e))) => {
                        if shutdown_deadline.is_some() {
                            return SessionExit::Clean;
                        }
                        return SessionExit::Transport(StreamingError::NetworkError(format!(
                            "websocket error: {e}"
                        )));
                    }
                    Ok(None) => {
                        if shutdown_deadline.is_some() {
                            return SessionExit::Clean;
                        }
                        return SessionExit::Transport(StreamingError::NetworkError(
                            "websocket stream ended".to_string(),
                        ));
                    }
                    Err(_elapsed) => {
                        if shutdown_deadline.is_some() {
                            terminate_session(sink).await;
                            return SessionExit::Clean;
                        }
                        return SessionExit::Transport(StreamingError::Timeout(format!(
                            "no recognizer message within {idle_timeout:?}"
                        )));
                    }
                }
            }
        }
    }
}

/// Handle one inbound websocket frame.
///
/// Malformed messages are logged and dropped, never fatal.
fn handle_message(ctx: &SessionContext, msg: Message, in_shutdown: bool) -> MessageOutcome {
    match msg {
        Message::Text(text) => match InboundMessage::parse(&text) {
            Ok(InboundMessage::SessionBegins(begin)) => {
                info!(session_id = %begin.session_id, "recognizer session began");
                *ctx.session_id.write() = Some(begin.session_id);
                ctx.is_listening.store(true, Ordering::Release);
                MessageOutcome::Continue
            }
            Ok(InboundMessage::PartialTranscript(t)) => {
                forward_transcript(ctx, t, false);
                MessageOutcome::Continue
            }
            Ok(InboundMessage::FinalTranscript(t)) => {
                let formatted = t.formatting_complete();
                forward_transcript(ctx, t, true);
                if in_shutdown && formatted {
                    MessageOutcome::ShutdownComplete
                } else {
                    MessageOutcome::Continue
                }
            }
            Ok(InboundMessage::SessionEnded(_)) => {
                // Courtesy notice, not a transport close.
                debug!("recognizer stopped listening; socket remains open");
                ctx.is_listening.store(false, Ordering::Release);
                MessageOutcome::Continue
            }
            Ok(InboundMessage::Unknown(kind)) => {
                debug!(message_type = %kind, "unknown recognizer message dropped");
                MessageOutcome::Continue
            }
            Err(e) => {
                warn!("malformed recognizer message dropped: {e}");
                MessageOutcome::Continue
            }
        },
        Message::Close(frame) => {
            info!(?frame, "recognizer closed the socket");
            MessageOutcome::Closed
        }
        Message::Ping(_) | Message::Pong(_) => MessageOutcome::Continue,
        Message::Binary(_) => {
            debug!("unexpected binary frame from recognizer dropped");
            MessageOutcome::Continue
        }
        _ => MessageOutcome::Continue,
    }
}

/// Convert an inbound transcript into a [`TranscriptionResult`] and forward
/// it without blocking the socket reader. Empty text never goes downstream.
fn forward_transcript(ctx: &SessionContext, msg: TranscriptMessage, is_final: bool) {
    if msg.text.trim().is_empty() {
        return;
    }

    let result = TranscriptionResult {
        confidence: msg.confidence_value(),
        session_id: ctx.session_id.read().clone(),
        message_id: msg.message_id,
        audio_start_ms: msg.audio_start,
        audio_end_ms: msg.audio_end,
        ..TranscriptionResult::new(msg.text, is_final, 0.0)
    };

    if ctx.transcript_tx.try_send(result).is_err() {
        warn!("transcript dropped: subscriber lagging or gone");
    }
}

/// Send the termination message and close frame, ignoring failures; the
/// socket is going away either way.
async fn terminate_session(sink: &mut WsSink) {
    if let Ok(json) = serde_json::to_string(&TerminateSessionMessage::default()) {
        let _ = sink.send(Message::Text(json.into())).await;
    }
    let _ = sink.send(Message::Close(None)).await;
}

/// Build the websocket upgrade request, attaching the API key when present.
fn build_request(
    endpoint: &RecognizerEndpoint,
) -> StreamingResult<tokio_tungstenite::tungstenite::handshake::client::Request> {
    let mut request = endpoint
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| StreamingError::ConfigurationError(format!("invalid recognizer URL: {e}")))?;

    if let Some(key) = &endpoint.api_key {
        let value = HeaderValue::from_str(key).map_err(|_| {
            StreamingError::ConfigurationError("API key contains invalid header bytes".to_string())
        })?;
        request.headers_mut().insert("Authorization", value);
    }

    Ok(request)
}
