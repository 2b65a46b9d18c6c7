//! Connection owner for the chat socket.
//!
//! [`ChatSocket`] is a thin handle: every operation becomes a command sent
//! to a single spawned task that owns the socket, the keep-alive timer, and
//! the reconnect schedule. Confining all socket I/O to that task keeps the
//! transport free of shared mutable state; the handle observes progress
//! through atomics the task updates.
//!
//! Unexpected closes and failed dials retry per [`ReconnectPolicy`]. Manual
//! closes cancel the session token, so a dial or reconnect delay already in
//! flight is abandoned rather than allowed to finish.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::config::TransportConfig;
use crate::endpoint::Endpoint;
use crate::error::SendError;
use crate::handlers::EventHandlers;
use crate::protocol::{self, OutboundFrame};
use crate::reconnect::ReconnectPolicy;
use crate::types::{CloseEvent, ConnectionState};

const CLOSE_NORMAL: u16 = 1000;
const CLOSE_ABNORMAL: u16 = 1006;
const MANUAL_CLOSE_REASON: &str = "Manual close";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Operations forwarded from the handle to the connection task.
#[derive(Debug)]
enum Command {
    Connect,
    Send {
        content: String,
        api_key: Option<String>,
    },
    SendRaw {
        payload: String,
    },
    Ping,
    Close,
    UpdateToken {
        token: String,
        authorization_token: Option<String>,
    },
}

/// Handle to one conversation's chat socket.
///
/// Construction spawns the connection task but performs no I/O; nothing is
/// dialed until [`connect`](Self::connect). Dropping the handle closes the
/// command channel and the task shuts the socket down without firing
/// callbacks.
pub struct ChatSocket {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: Arc<AtomicU8>,
    attempts: Arc<AtomicU32>,
    session_cancel: Arc<Mutex<CancellationToken>>,
    _task: JoinHandle<()>,
}

impl ChatSocket {
    /// Create the handle and spawn its connection task. Must be called
    /// from within a tokio runtime.
    pub fn new(endpoint: Endpoint, handlers: EventHandlers, config: TransportConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicU8::new(ConnectionState::Closed.as_u8()));
        let attempts = Arc::new(AtomicU32::new(0));
        let session_cancel = Arc::new(Mutex::new(CancellationToken::new()));

        let task = ConnectionTask {
            endpoint,
            policy: config.reconnect_policy(),
            config,
            handlers,
            cmd_rx,
            state: state.clone(),
            attempts: attempts.clone(),
            session_cancel: session_cancel.clone(),
        };
        let _task = tokio::spawn(task.run());

        Self {
            cmd_tx,
            state,
            attempts,
            session_cancel,
            _task,
        }
    }

    /// Start connecting. Returns once the attempt is initiated; the outcome
    /// arrives through the on-open or on-error callbacks. Calls made while
    /// a connection is already open or being established are ignored.
    pub fn connect(&self) {
        match self.connection_state() {
            ConnectionState::Connecting | ConnectionState::Open => {
                tracing::debug!("connect ignored: socket already active");
            }
            ConnectionState::Closing | ConnectionState::Closed => {
                let _ = self.cmd_tx.send(Command::Connect);
            }
        }
    }

    /// Send a chat message, trimmed of surrounding whitespace. Fails when
    /// the socket is not open; messages are never queued for later.
    pub fn send_message(
        &self,
        content: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<(), SendError> {
        self.ensure_open()?;
        self.cmd_tx
            .send(Command::Send {
                content: content.into(),
                api_key,
            })
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Send a pre-serialized payload verbatim, without any framing.
    pub fn send_raw(&self, payload: impl Into<String>) -> Result<(), SendError> {
        self.ensure_open()?;
        self.cmd_tx
            .send(Command::SendRaw {
                payload: payload.into(),
            })
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Send one application-level ping immediately, independent of the
    /// periodic keep-alive.
    pub fn send_ping(&self) -> Result<(), SendError> {
        self.ensure_open()?;
        self.cmd_tx
            .send(Command::Ping)
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Close deliberately: stops the keep-alive, performs a normal close
    /// handshake, and suppresses reconnection. Safe to call at any time,
    /// including repeatedly or before ever connecting.
    pub fn close(&self) {
        self.session_cancel.lock().unwrap().cancel();
        let _ = self.cmd_tx.send(Command::Close);
    }

    /// Replace the credentials, close any current connection, and open a
    /// fresh one with the new tokens after a short settle delay.
    pub fn update_token(&self, token: impl Into<String>, authorization_token: Option<String>) {
        let _ = self.cmd_tx.send(Command::UpdateToken {
            token: token.into(),
            authorization_token,
        });
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Open
    }

    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Consecutive failed reconnect attempts so far; resets to zero when a
    /// connection opens.
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    fn ensure_open(&self) -> Result<(), SendError> {
        if self.connection_state() == ConnectionState::Open {
            Ok(())
        } else {
            tracing::error!("cannot send: chat socket is not open");
            Err(SendError::NotConnected)
        }
    }
}

/// How one driven connection ended.
enum SessionEnd {
    /// Deliberate close; do not reconnect.
    Manual,
    /// Server close, read/write failure, or stream end; reconnect may apply.
    Unexpected,
    /// Credentials replaced; reconnect with the new tokens after settling.
    Rotate {
        token: String,
        authorization_token: Option<String>,
    },
    /// Handle dropped; tear everything down.
    Shutdown,
}

/// How one session (dial, drive, retries) ended.
enum SessionOutcome {
    Finished,
    Shutdown,
    Rotate {
        token: String,
        authorization_token: Option<String>,
    },
}

/// How a cancellable wait ended.
enum PauseOutcome {
    Elapsed,
    Cancelled,
    Shutdown,
    Rotate {
        token: String,
        authorization_token: Option<String>,
    },
}

/// How a dial attempt ended.
enum DialOutcome {
    Connected(Socket),
    Failed(WsError),
    Cancelled,
    Shutdown,
    Rotate {
        token: String,
        authorization_token: Option<String>,
    },
}

/// Owns the socket and processes commands. Runs until the handle drops.
struct ConnectionTask {
    endpoint: Endpoint,
    policy: ReconnectPolicy,
    config: TransportConfig,
    handlers: EventHandlers,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state: Arc<AtomicU8>,
    attempts: Arc<AtomicU32>,
    session_cancel: Arc<Mutex<CancellationToken>>,
}

impl ConnectionTask {
    async fn run(mut self) {
        let mut pending_rotate: Option<(String, Option<String>)> = None;

        loop {
            let settle_first = if let Some((token, authorization_token)) = pending_rotate.take() {
                self.endpoint.set_tokens(token, authorization_token);
                true
            } else {
                // Idle: no socket and no session. Wait for a command that
                // starts one.
                match self.cmd_rx.recv().await {
                    None => return,
                    Some(Command::Connect) => false,
                    Some(Command::UpdateToken {
                        token,
                        authorization_token,
                    }) => {
                        self.endpoint.set_tokens(token, authorization_token);
                        true
                    }
                    Some(Command::Close) => continue,
                    Some(Command::Send { .. })
                    | Some(Command::SendRaw { .. })
                    | Some(Command::Ping) => {
                        tracing::warn!("dropping outbound frame: socket is not open");
                        continue;
                    }
                }
            };

            match self.run_session(settle_first).await {
                SessionOutcome::Finished => {}
                SessionOutcome::Shutdown => return,
                SessionOutcome::Rotate {
                    token,
                    authorization_token,
                } => {
                    pending_rotate = Some((token, authorization_token));
                }
            }
        }
    }

    /// One session: optional settle delay, then dial and drive the socket,
    /// retrying per policy after unexpected ends.
    async fn run_session(&mut self, settle_first: bool) -> SessionOutcome {
        // Fresh token per session: cancelling it marks this session, and
        // only this session, as manually closed.
        let cancel = CancellationToken::new();
        *self.session_cancel.lock().unwrap() = cancel.clone();

        if settle_first {
            match self.pause(&cancel, self.config.settle_delay()).await {
                PauseOutcome::Elapsed => {}
                PauseOutcome::Cancelled => {
                    self.set_state(ConnectionState::Closed);
                    return SessionOutcome::Finished;
                }
                PauseOutcome::Shutdown => return SessionOutcome::Shutdown,
                PauseOutcome::Rotate {
                    token,
                    authorization_token,
                } => {
                    return SessionOutcome::Rotate {
                        token,
                        authorization_token,
                    };
                }
            }
        }

        loop {
            self.set_state(ConnectionState::Connecting);
            // Rebuilt each dial so token rotation takes effect here.
            let url = self.endpoint.websocket_url();
            tracing::debug!(
                conversation = %self.endpoint.conversation_id(),
                "dialing chat socket"
            );

            match self.dial(&cancel, url.as_str()).await {
                DialOutcome::Connected(ws) => {
                    self.attempts.store(0, Ordering::SeqCst);
                    self.set_state(ConnectionState::Open);
                    tracing::info!(
                        conversation = %self.endpoint.conversation_id(),
                        "chat socket open"
                    );
                    self.handlers.emit_open();

                    match self.drive(ws).await {
                        SessionEnd::Manual => return SessionOutcome::Finished,
                        SessionEnd::Shutdown => return SessionOutcome::Shutdown,
                        SessionEnd::Rotate {
                            token,
                            authorization_token,
                        } => {
                            return SessionOutcome::Rotate {
                                token,
                                authorization_token,
                            };
                        }
                        SessionEnd::Unexpected => {}
                    }
                }
                DialOutcome::Failed(err) => {
                    tracing::warn!(error = %err, "chat socket connection failed");
                    self.handlers.emit_error(format!("connection failed: {err}"));
                    self.set_state(ConnectionState::Closed);
                    self.handlers
                        .emit_close(CloseEvent::new(CLOSE_ABNORMAL, "abnormal closure"));
                }
                DialOutcome::Cancelled => {
                    tracing::info!("chat socket dial abandoned by close");
                    self.set_state(ConnectionState::Closed);
                    self.handlers
                        .emit_close(CloseEvent::new(CLOSE_NORMAL, MANUAL_CLOSE_REASON));
                    return SessionOutcome::Finished;
                }
                DialOutcome::Shutdown => {
                    self.set_state(ConnectionState::Closed);
                    return SessionOutcome::Shutdown;
                }
                DialOutcome::Rotate {
                    token,
                    authorization_token,
                } => {
                    self.set_state(ConnectionState::Closed);
                    return SessionOutcome::Rotate {
                        token,
                        authorization_token,
                    };
                }
            }

            if cancel.is_cancelled() {
                return SessionOutcome::Finished;
            }
            let so_far = self.attempts.load(Ordering::SeqCst);
            if !self.policy.allows(so_far) {
                tracing::warn!(
                    attempts = so_far,
                    "reconnect attempts exhausted; staying closed"
                );
                return SessionOutcome::Finished;
            }
            let attempt = so_far + 1;
            // Counted before the wait so the attempt is visible while the
            // delay elapses.
            self.attempts.store(attempt, Ordering::SeqCst);
            let delay = self.policy.delay_for(attempt);
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );

            match self.pause(&cancel, delay).await {
                PauseOutcome::Elapsed => {}
                PauseOutcome::Cancelled => return SessionOutcome::Finished,
                PauseOutcome::Shutdown => return SessionOutcome::Shutdown,
                PauseOutcome::Rotate {
                    token,
                    authorization_token,
                } => {
                    return SessionOutcome::Rotate {
                        token,
                        authorization_token,
                    };
                }
            }
            // A manual close may land while the delay elapses; honor it at
            // fire time rather than dialing anyway.
            if cancel.is_cancelled() {
                return SessionOutcome::Finished;
            }
        }
    }

    /// Dial the endpoint while still answering commands. A manual close or
    /// a dropped handle abandons the attempt instead of waiting for the
    /// handshake to resolve.
    async fn dial(&mut self, cancel: &CancellationToken, url: &str) -> DialOutcome {
        let connecting = connect_async(url);
        tokio::pin!(connecting);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return DialOutcome::Cancelled,
                result = &mut connecting => return match result {
                    Ok((ws, _response)) => DialOutcome::Connected(ws),
                    Err(err) => DialOutcome::Failed(err),
                },
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return DialOutcome::Shutdown,
                    Some(Command::Close) => return DialOutcome::Cancelled,
                    // Already dialing; nothing to do.
                    Some(Command::Connect) => {}
                    Some(Command::UpdateToken { token, authorization_token }) => {
                        return DialOutcome::Rotate { token, authorization_token };
                    }
                    Some(Command::Send { .. })
                    | Some(Command::SendRaw { .. })
                    | Some(Command::Ping) => {
                        tracing::warn!("dropping outbound frame: socket is not open");
                    }
                },
            }
        }
    }

    /// Wait out a delay while still answering commands. A connect request
    /// ends the wait early and dials immediately.
    async fn pause(&mut self, cancel: &CancellationToken, duration: Duration) -> PauseOutcome {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return PauseOutcome::Cancelled,
                _ = &mut sleep => return PauseOutcome::Elapsed,
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return PauseOutcome::Shutdown,
                    Some(Command::Close) => return PauseOutcome::Cancelled,
                    Some(Command::Connect) => return PauseOutcome::Elapsed,
                    Some(Command::UpdateToken { token, authorization_token }) => {
                        return PauseOutcome::Rotate { token, authorization_token };
                    }
                    Some(Command::Send { .. })
                    | Some(Command::SendRaw { .. })
                    | Some(Command::Ping) => {
                        tracing::warn!("dropping outbound frame: socket is not open");
                    }
                },
            }
        }
    }

    /// Pump one open socket: deliver inbound events, transmit commands,
    /// and keep the server alive with periodic pings.
    async fn drive(&mut self, mut ws: Socket) -> SessionEnd {
        let period = self.config.ping_interval().max(Duration::from_millis(1));
        let mut ping = tokio::time::interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match protocol::decode_event(text.as_str()) {
                            Ok(event) => self.handlers.emit_message(event),
                            Err(err) => {
                                tracing::warn!(error = %err, "dropping malformed inbound frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let event = match frame {
                            Some(f) => CloseEvent::new(u16::from(f.code), f.reason.as_str()),
                            None => CloseEvent::new(CLOSE_ABNORMAL, ""),
                        };
                        tracing::info!(
                            code = event.code,
                            reason = %event.reason,
                            "chat socket closed by server"
                        );
                        self.set_state(ConnectionState::Closed);
                        self.handlers.emit_close(event);
                        return SessionEnd::Unexpected;
                    }
                    // Transport-level ping/pong is answered by tungstenite;
                    // the application-level pong arrives as a text frame.
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "chat socket read failed");
                        return self.fail_socket(format!("socket error: {err}"));
                    }
                    None => {
                        tracing::info!("chat socket stream ended");
                        self.set_state(ConnectionState::Closed);
                        self.handlers
                            .emit_close(CloseEvent::new(CLOSE_ABNORMAL, "abnormal closure"));
                        return SessionEnd::Unexpected;
                    }
                },
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Send { content, api_key }) => {
                        let frame = OutboundFrame::ChatMessage {
                            content: content.trim().to_string(),
                            api_key,
                        };
                        if let Some(end) = self.transmit(&mut ws, &frame).await {
                            return end;
                        }
                    }
                    Some(Command::SendRaw { payload }) => {
                        if let Some(end) = self.transmit_text(&mut ws, payload).await {
                            return end;
                        }
                    }
                    Some(Command::Ping) => {
                        if let Some(end) = self.transmit(&mut ws, &OutboundFrame::Ping).await {
                            return end;
                        }
                    }
                    // Already connected; nothing to do.
                    Some(Command::Connect) => {}
                    Some(Command::Close) => {
                        self.shutdown_socket(&mut ws).await;
                        return SessionEnd::Manual;
                    }
                    Some(Command::UpdateToken { token, authorization_token }) => {
                        self.shutdown_socket(&mut ws).await;
                        return SessionEnd::Rotate { token, authorization_token };
                    }
                    // Handle dropped: close quietly, no callbacks.
                    None => {
                        self.set_state(ConnectionState::Closing);
                        let _ = ws.close(None).await;
                        self.set_state(ConnectionState::Closed);
                        return SessionEnd::Shutdown;
                    }
                },
                _ = ping.tick() => {
                    tracing::trace!("sending keep-alive ping");
                    if let Some(end) = self.transmit(&mut ws, &OutboundFrame::Ping).await {
                        return end;
                    }
                }
            }
        }
    }

    async fn transmit(&mut self, ws: &mut Socket, frame: &OutboundFrame) -> Option<SessionEnd> {
        match frame.encode() {
            Ok(text) => self.transmit_text(ws, text).await,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode outbound frame");
                None
            }
        }
    }

    async fn transmit_text(&mut self, ws: &mut Socket, text: String) -> Option<SessionEnd> {
        match ws.send(Message::Text(text.into())).await {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(error = %err, "chat socket write failed");
                Some(self.fail_socket(format!("socket error: {err}")))
            }
        }
    }

    /// Report a socket failure and synthesize the abnormal close that
    /// follows it. Retry eligibility is decided by the caller.
    fn fail_socket(&mut self, description: String) -> SessionEnd {
        self.handlers.emit_error(description);
        self.set_state(ConnectionState::Closed);
        self.handlers
            .emit_close(CloseEvent::new(CLOSE_ABNORMAL, "abnormal closure"));
        SessionEnd::Unexpected
    }

    /// Deliberate close: normal-close handshake, then report it. Inbound
    /// frames still in flight are discarded with the socket.
    async fn shutdown_socket(&mut self, ws: &mut Socket) {
        self.set_state(ConnectionState::Closing);
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: MANUAL_CLOSE_REASON.into(),
        };
        if let Err(err) = ws.close(Some(frame)).await {
            tracing::debug!(error = %err, "close handshake did not complete cleanly");
        }
        self.set_state(ConnectionState::Closed);
        tracing::info!("chat socket closed");
        self.handlers
            .emit_close(CloseEvent::new(CLOSE_NORMAL, MANUAL_CLOSE_REASON));
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.store(next.as_u8(), Ordering::SeqCst);
    }
}
