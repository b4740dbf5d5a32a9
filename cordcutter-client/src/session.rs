//! Gateway session state machine
//!
//! A session runs as a single task that owns the socket, the heartbeat timer
//! and all session fields. Socket messages, heartbeat ticks and commands
//! from the [`Gateway`](crate::Gateway) handle are handled one at a time as
//! branches of one `select!` loop, so no two handlers ever overlap.
//!
//! Lifecycle of a connection:
//!
//! 1. The socket opens: state becomes `AwaitingHello`.
//! 2. Hello arrives: the heartbeat timer starts and the session sends
//!    Resume if an earlier connection produced a session id, Identify
//!    otherwise.
//! 3. READY or RESUMED arrives: state becomes `Active`.
//! 4. The socket closes or fails, or the gateway asks for a reconnect: the
//!    heartbeat stops, the socket is closed and a new one is opened with the
//!    connect retry policy. If that runs out, the session ends.

use crate::config::ConnectOptions;
use crate::heartbeat::{self, Heartbeat};
use crate::retry::{self, RetryPolicy};
use crate::sink::EventSink;
use crate::transport::{Connector, Socket};
use cordcutter_core::codec::Codec;
use cordcutter_core::error::CodecError;
use cordcutter_core::message::Message;
use cordcutter_core::payload::{Hello, Payload, Ready, Resume};
use cordcutter_core::protocol::constants::{CLOSE_NORMAL, CLOSE_RECONNECT};
use cordcutter_core::protocol::{events, OpCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// Undecodable messages in a row after which the connection is replaced
const MAX_CONSECUTIVE_DECODE_FAILURES: u32 = 5;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport and no attempt in flight
    Disconnected,
    /// Opening a transport
    Connecting,
    /// Transport open, waiting for Hello
    AwaitingHello,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    /// Session established
    Active,
}

impl ConnectionState {
    /// Check if a transport is open in this state
    pub fn is_open(self) -> bool {
        !matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Connecting
        )
    }

    /// Get the name of this state
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingHello => "awaiting_hello",
            ConnectionState::Identifying => "identifying",
            ConnectionState::Resuming => "resuming",
            ConnectionState::Active => "active",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests from the gateway handle to the session task
#[derive(Debug)]
pub(crate) enum Command {
    /// Put an encoded payload on the wire
    Send(Message),
    /// Close the transport and end the session
    Disconnect,
}

/// What the loop does after a handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Reconnect,
    Shutdown,
}

/// Session task state
pub(crate) struct Session<C: Connector> {
    connector: Arc<C>,
    url: String,
    token: String,
    options: ConnectOptions,
    codec: Codec,
    sink: Arc<dyn EventSink>,
    state: watch::Sender<ConnectionState>,
    sequence: Option<u64>,
    session_id: Option<String>,
    has_connected_before: bool,
    resuming: bool,
    heartbeat: Option<Heartbeat>,
    decode_failures: u32,
}

impl<C: Connector> Session<C> {
    pub(crate) fn new(
        connector: Arc<C>,
        url: String,
        token: String,
        options: ConnectOptions,
        codec: Codec,
        sink: Arc<dyn EventSink>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            connector,
            url,
            token,
            options,
            codec,
            sink,
            state,
            sequence: None,
            session_id: None,
            has_connected_before: false,
            resuming: false,
            heartbeat: None,
            decode_failures: 0,
        }
    }

    /// Drive the session on an already open socket until it is disconnected
    /// or a reconnect runs out of attempts.
    pub(crate) async fn run(mut self, mut socket: C::Socket, mut commands: mpsc::Receiver<Command>) {
        self.on_open();

        loop {
            let flow = tokio::select! {
                incoming = socket.next() => match incoming {
                    Some(Ok(message)) => self.on_message(&mut socket, message).await,
                    Some(Err(err)) => {
                        warn!(error = %err, "transport error");
                        Flow::Reconnect
                    }
                    None => {
                        info!("transport closed");
                        Flow::Reconnect
                    }
                },
                () = heartbeat::next_tick(&mut self.heartbeat) => self.on_heartbeat(&mut socket).await,
                command = commands.recv() => match command {
                    Some(Command::Send(message)) => self.send_message(&mut socket, message).await,
                    Some(Command::Disconnect) | None => Flow::Shutdown,
                },
            };

            match flow {
                Flow::Continue => {}
                Flow::Reconnect => match self.reconnect(&mut socket, &mut commands).await {
                    Some(next) => {
                        socket = next;
                        self.on_open();
                    }
                    None => break,
                },
                Flow::Shutdown => {
                    self.shutdown(&mut socket).await;
                    break;
                }
            }
        }

        debug!("session task finished");
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "connection state changed");
        }
    }

    fn on_open(&mut self) {
        self.resuming = self.has_connected_before;
        self.has_connected_before = true;
        self.decode_failures = 0;
        self.set_state(ConnectionState::AwaitingHello);
    }

    async fn on_message(&mut self, socket: &mut C::Socket, message: Message) -> Flow {
        if let Message::Close(frame) = &message {
            match frame {
                Some(frame) => info!(
                    code = frame.code,
                    reason = %frame.reason,
                    "gateway closed the connection"
                ),
                None => info!("gateway closed the connection"),
            }
            return Flow::Reconnect;
        }

        let payload = match self.codec.decode(&message) {
            Ok(payload) => payload,
            Err(err) => return self.on_decode_failure(err),
        };
        self.decode_failures = 0;

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("cordcutter_payloads_received_total").increment(1);
        }

        if let Err(err) = payload.validate() {
            warn!(error = %err, "protocol violation");
        }
        trace!(op = %payload.op, seq = ?payload.s, event = ?payload.t, "payload received");

        self.sink.raw(&payload);
        self.route(socket, payload).await
    }

    fn on_decode_failure(&mut self, err: CodecError) -> Flow {
        self.decode_failures += 1;

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("cordcutter_decode_failures_total").increment(1);
        }

        warn!(
            error = %err,
            consecutive = self.decode_failures,
            "dropping undecodable message"
        );
        if self.decode_failures >= MAX_CONSECUTIVE_DECODE_FAILURES {
            warn!("too many undecodable messages, replacing connection");
            Flow::Reconnect
        } else {
            Flow::Continue
        }
    }

    async fn route(&mut self, socket: &mut C::Socket, payload: Payload) -> Flow {
        match payload.op {
            OpCode::Hello => self.on_hello(socket, &payload).await,
            OpCode::Dispatch => {
                self.on_dispatch(&payload);
                Flow::Continue
            }
            OpCode::Heartbeat => self.send_heartbeat(socket).await,
            OpCode::HeartbeatAck => {
                if let Some(latency) = self.heartbeat.as_mut().and_then(Heartbeat::acked) {
                    debug!(latency_ms = latency.as_millis() as u64, "heartbeat acknowledged");
                }
                Flow::Continue
            }
            OpCode::InvalidSession => {
                warn!("session invalidated, identifying again");
                self.session_id = None;
                self.sequence = None;
                self.identify(socket).await
            }
            OpCode::Reconnect => {
                info!("gateway requested a reconnect");
                Flow::Reconnect
            }
            op => {
                warn!(op = %op, "unexpected op code from gateway");
                Flow::Continue
            }
        }
    }

    async fn on_hello(&mut self, socket: &mut C::Socket, payload: &Payload) -> Flow {
        match payload.data::<Hello>() {
            Ok(hello) if hello.heartbeat_interval > 0 => {
                let period = Duration::from_millis(hello.heartbeat_interval);
                debug!(interval_ms = hello.heartbeat_interval, "hello received");
                self.heartbeat = Some(Heartbeat::new(period));
            }
            Ok(_) => {
                warn!("hello carried a zero heartbeat interval, not heartbeating");
                self.heartbeat = None;
            }
            Err(err) => warn!(error = %err, "malformed hello"),
        }

        match self.session_id.clone() {
            Some(session_id) if self.resuming => self.resume(socket, session_id).await,
            _ => self.identify(socket).await,
        }
    }

    fn on_dispatch(&mut self, payload: &Payload) {
        if let Some(sequence) = payload.s {
            self.sequence = Some(sequence);
        }

        let Some(event) = payload.event_name() else {
            warn!("dispatch without an event name");
            return;
        };

        if event == events::READY {
            match payload.data::<Ready>() {
                Ok(ready) => {
                    info!(session_id = %ready.session_id, "session ready");
                    self.session_id = Some(ready.session_id);
                }
                Err(err) => warn!(error = %err, "ready event without a session id"),
            }
        }

        let handshake_done = event == events::READY || event == events::RESUMED;
        if handshake_done
            && matches!(
                self.current_state(),
                ConnectionState::Identifying | ConnectionState::Resuming
            )
        {
            self.set_state(ConnectionState::Active);
        }

        self.sink.dispatch(events::sink_name(event), &payload.d);
    }

    async fn identify(&mut self, socket: &mut C::Socket) -> Flow {
        let identify = self.options.gateway.identify(&self.token);
        info!(shard = ?identify.shard, "identifying");
        self.handshake(socket, Payload::identify(&identify), ConnectionState::Identifying)
            .await
    }

    async fn resume(&mut self, socket: &mut C::Socket, session_id: String) -> Flow {
        info!(session_id = %session_id, seq = ?self.sequence, "resuming");
        let resume = Resume {
            token: self.token.clone(),
            session_id,
            seq: self.sequence,
        };
        self.handshake(socket, Payload::resume(&resume), ConnectionState::Resuming)
            .await
    }

    async fn handshake(
        &mut self,
        socket: &mut C::Socket,
        payload: Result<Payload, CodecError>,
        next: ConnectionState,
    ) -> Flow {
        let payload = match payload {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = %err, "failed to build handshake payload");
                return Flow::Continue;
            }
        };
        let flow = self.send_payload(socket, &payload).await;
        if flow == Flow::Continue {
            self.set_state(next);
        }
        flow
    }

    async fn on_heartbeat(&mut self, socket: &mut C::Socket) -> Flow {
        let unacked = self
            .heartbeat
            .as_ref()
            .is_some_and(Heartbeat::awaiting_ack);
        if self.options.detect_zombies && unacked {
            warn!("previous heartbeat was never acknowledged, replacing connection");
            return Flow::Reconnect;
        }
        self.send_heartbeat(socket).await
    }

    async fn send_heartbeat(&mut self, socket: &mut C::Socket) -> Flow {
        trace!(seq = ?self.sequence, "sending heartbeat");
        let flow = self
            .send_payload(socket, &Payload::heartbeat(self.sequence))
            .await;
        if let Some(heartbeat) = self.heartbeat.as_mut() {
            heartbeat.sent();
        }
        flow
    }

    async fn send_payload(&self, socket: &mut C::Socket, payload: &Payload) -> Flow {
        match self.codec.encode(payload) {
            Ok(message) => self.send_message(socket, message).await,
            Err(err) => {
                error!(op = %payload.op, error = %err, "failed to encode payload");
                Flow::Continue
            }
        }
    }

    async fn send_message(&self, socket: &mut C::Socket, message: Message) -> Flow {
        match socket.send(message).await {
            Ok(()) => {
                #[cfg(feature = "metrics")]
                {
                    metrics::counter!("cordcutter_payloads_sent_total").increment(1);
                }
                Flow::Continue
            }
            Err(err) => {
                warn!(error = %err, "send failed");
                Flow::Reconnect
            }
        }
    }

    async fn close_socket(&self, socket: &mut C::Socket, code: u16, reason: &str) {
        match tokio::time::timeout(self.options.timeout, socket.close(code, reason)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(error = %err, "close failed"),
            Err(_) => debug!("close timed out"),
        }
    }

    /// Replace a dead connection. `None` means the session is over.
    async fn reconnect(
        &mut self,
        socket: &mut C::Socket,
        commands: &mut mpsc::Receiver<Command>,
    ) -> Option<C::Socket> {
        self.heartbeat = None;
        self.close_socket(socket, CLOSE_RECONNECT, "reconnecting").await;
        self.set_state(ConnectionState::Connecting);

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("cordcutter_reconnects_total").increment(1);
        }

        info!(resumable = self.session_id.is_some(), "reconnecting to gateway");
        let policy = RetryPolicy::from(&self.options);

        tokio::select! {
            result = retry::open_with_retry(&*self.connector, &self.url, policy) => match result {
                Ok(next) => Some(next),
                Err(err) => {
                    error!(error = %err, "could not reconnect to gateway");
                    self.set_state(ConnectionState::Disconnected);
                    None
                }
            },
            () = wait_for_shutdown(commands) => {
                info!("disconnect requested while reconnecting");
                self.set_state(ConnectionState::Disconnected);
                None
            }
        }
    }

    async fn shutdown(&mut self, socket: &mut C::Socket) {
        self.heartbeat = None;
        self.close_socket(socket, CLOSE_NORMAL, "disconnect").await;
        self.set_state(ConnectionState::Disconnected);
        info!("disconnected from gateway");
    }
}

impl<C: Connector> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.url)
            .field("state", &self.current_state())
            .field("sequence", &self.sequence)
            .field("session_id", &self.session_id)
            .field("has_connected_before", &self.has_connected_before)
            .finish_non_exhaustive()
    }
}

/// Drain commands while no transport is open, returning on disconnect
async fn wait_for_shutdown(commands: &mut mpsc::Receiver<Command>) {
    loop {
        match commands.recv().await {
            Some(Command::Send(message)) => {
                warn!(%message, "transport not open, dropping message");
            }
            Some(Command::Disconnect) | None => return,
        }
    }
}
