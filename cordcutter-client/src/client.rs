//! Gateway client
//!
//! A [`Client`] holds what stays fixed across connections: options, the
//! transport connector, the endpoint resolver and the event sink. Each
//! [`Client::connect`] call resolves the gateway, opens a socket with the
//! retry policy and hands it to a freshly spawned session task. The
//! returned [`Gateway`] talks to that task.

use crate::config::{ClientOptions, ConnectOptions};
use crate::error::{GatewayError, Result};
use crate::resolver::{gateway_url, HttpResolver, Resolver};
use crate::retry::{self, RetryPolicy};
use crate::session::{Command, ConnectionState, Session};
use crate::sink::{EventSink, NullSink};
use crate::transport::{Connector, WsConnector};
use cordcutter_core::codec::Codec;
use cordcutter_core::error::ProtocolError;
use cordcutter_core::payload::{Payload, RequestGuildMembers, StatusUpdate};
use cordcutter_core::protocol::OpCode;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Outbound commands buffered between the handle and the session task
const COMMAND_BUFFER: usize = 64;

/// Gateway client
pub struct Client<C: Connector = WsConnector> {
    options: ClientOptions,
    connector: Arc<C>,
    resolver: Arc<dyn Resolver>,
    sink: Arc<dyn EventSink>,
}

impl Client<WsConnector> {
    /// Create a WebSocket client resolving the gateway over HTTP
    pub fn new(options: ClientOptions) -> Result<Self> {
        ClientBuilder::new(options).build()
    }

    /// Start building a client
    pub fn builder(options: ClientOptions) -> ClientBuilder<WsConnector> {
        ClientBuilder::new(options)
    }
}

impl<C: Connector> Client<C> {
    /// Client options
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Install a log subscriber at this client's log level.
    ///
    /// See [`init_logging`](crate::logging::init_logging).
    pub fn init_logging(&self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        crate::logging::init_logging(self.options.log_level)
    }

    /// Connect to the gateway.
    ///
    /// Resolves once the first socket is open; the handshake continues in
    /// the background. Fails if the options are invalid, the gateway URL
    /// cannot be resolved, or every open attempt fails.
    pub async fn connect(&self, options: ConnectOptions) -> Result<Gateway> {
        options.validate()?;
        let codec = options.gateway.codec()?;

        let base = self.resolver.resolve().await?;
        let url = gateway_url(&base, codec.encoding());
        tracing::info!(url = %url, encoding = %codec.encoding(), compress = codec.compress(), "connecting to gateway");

        let socket =
            retry::open_with_retry(&*self.connector, &url, RetryPolicy::from(&options)).await?;

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let session = Session::new(
            Arc::clone(&self.connector),
            url,
            self.options.token.clone(),
            options,
            codec,
            Arc::clone(&self.sink),
            state_tx,
        );
        let task = tokio::spawn(session.run(socket, commands_rx));

        Ok(Gateway {
            commands: commands_tx,
            state: state_rx,
            codec,
            task,
        })
    }
}

impl<C: Connector> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Client builder
pub struct ClientBuilder<C: Connector = WsConnector> {
    options: ClientOptions,
    connector: C,
    resolver: Option<Arc<dyn Resolver>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl ClientBuilder<WsConnector> {
    /// Create a new client builder
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            connector: WsConnector::new(),
            resolver: None,
            sink: None,
        }
    }
}

impl<C: Connector> ClientBuilder<C> {
    /// Use a different transport connector
    pub fn connector<D: Connector>(self, connector: D) -> ClientBuilder<D> {
        ClientBuilder {
            options: self.options,
            connector,
            resolver: self.resolver,
            sink: self.sink,
        }
    }

    /// Use a different gateway resolver
    pub fn resolver(mut self, resolver: impl Resolver) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Deliver events to this sink
    pub fn sink(mut self, sink: impl EventSink) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<Client<C>> {
        self.options.validate()?;

        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(HttpResolver::new(&self.options)?),
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(NullSink));

        Ok(Client {
            options: self.options,
            connector: Arc::new(self.connector),
            resolver,
            sink,
        })
    }
}

impl<C: Connector> fmt::Debug for ClientBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("options", &self.options)
            .field("custom_resolver", &self.resolver.is_some())
            .field("custom_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle to a running gateway session.
///
/// Dropping the handle disconnects the session.
#[derive(Debug)]
pub struct Gateway {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    codec: Codec,
    task: JoinHandle<()>,
}

impl Gateway {
    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver following every state change
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the session reaches `target`.
    ///
    /// Fails with [`GatewayError::Closed`] if the session ends first.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| GatewayError::Closed)
    }

    /// Check if the session task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Send a payload.
    ///
    /// Op codes only the gateway may send and encoding errors are rejected;
    /// payloads queued while the transport is down are dropped with a warning.
    pub async fn send(&self, payload: &Payload) -> Result<()> {
        if !payload.op.is_client_op() {
            return Err(ProtocolError::NotClientOp { op: payload.op }.into());
        }
        let message = self.codec.encode(payload)?;
        self.commands
            .send(Command::Send(message))
            .await
            .map_err(|_| GatewayError::Closed)
    }

    /// Update the client's presence
    pub async fn update_status(&self, status: &StatusUpdate) -> Result<()> {
        self.send(&Payload::with_data(OpCode::StatusUpdate, status)?)
            .await
    }

    /// Request offline members of a guild
    pub async fn request_guild_members(&self, request: &RequestGuildMembers) -> Result<()> {
        self.send(&Payload::with_data(OpCode::RequestGuildMembers, request)?)
            .await
    }

    /// Close the transport and wait for the session task to end
    pub async fn disconnect(self) -> Result<()> {
        // Already gone if the send fails
        let _ = self.commands.send(Command::Disconnect).await;
        self.task.await.map_err(|err| {
            tracing::error!(error = %err, "session task failed");
            GatewayError::Closed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayOptions;
    use crate::resolver::StaticResolver;
    use crate::sink::{ChannelSink, GatewayEvent};
    use crate::transport::mock::{MockConnector, MockPeer, OpenBehavior};
    use cordcutter_core::codec::Encoding;
    use cordcutter_core::message::Message;
    use cordcutter_core::payload::Game;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    fn json_options() -> ConnectOptions {
        ConnectOptions::default().gateway(
            GatewayOptions::default()
                .encoding(Encoding::Json)
                .compress(false),
        )
    }

    fn client(connector: MockConnector) -> (Client<MockConnector>, UnboundedReceiver<GatewayEvent>) {
        let (sink, events) = ChannelSink::new();
        let client = ClientBuilder::new(ClientOptions::new("token"))
            .connector(connector)
            .resolver(StaticResolver::new("mock://gateway"))
            .sink(sink)
            .build()
            .unwrap();
        (client, events)
    }

    async fn recv_op(peer: &mut MockPeer, op: OpCode) -> Payload {
        let payload = peer.recv_payload().await.expect("socket closed");
        assert_eq!(payload.op, op, "unexpected payload {:?}", payload);
        payload
    }

    /// Hello, Identify, READY with session `abc` at sequence 1
    async fn establish(peer: &mut MockPeer, gateway: &Gateway) {
        peer.hello(45_000);
        recv_op(peer, OpCode::Identify).await;
        peer.send_payload(&Payload::dispatch("READY", 1, json!({"session_id": "abc"})));
        gateway
            .wait_for_state(ConnectionState::Active)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_identifies_after_hello() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector.clone());
        let gateway = client.connect(json_options()).await.unwrap();
        assert_eq!(
            connector.urls(),
            vec!["mock://gateway/?v=6&encoding=json".to_string()]
        );

        let mut peer = peers.recv().await.unwrap();
        gateway
            .wait_for_state(ConnectionState::AwaitingHello)
            .await
            .unwrap();
        peer.hello(41_250);

        let identify = recv_op(&mut peer, OpCode::Identify).await;
        assert_eq!(identify.d["token"], "token");
        assert_eq!(identify.d["large_threshold"], 250);
        assert_eq!(identify.d["compress"], false);
        assert_eq!(identify.d["properties"]["$browser"], "cordcutter");
        assert!(identify.d.get("shard").is_none());
        gateway
            .wait_for_state(ConnectionState::Identifying)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_identify_includes_shard() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector);
        let options = json_options().gateway(
            GatewayOptions::default()
                .encoding(Encoding::Json)
                .compress(false)
                .shard(1, 2),
        );
        let _gateway = client.connect(options).await.unwrap();
        let mut peer = peers.recv().await.unwrap();
        peer.hello(41_250);
        let identify = recv_op(&mut peer, OpCode::Identify).await;
        assert_eq!(identify.d["shard"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_dispatches_reach_sink_under_aliases() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, mut events) = client(connector);
        let gateway = client.connect(json_options()).await.unwrap();
        let mut peer = peers.recv().await.unwrap();
        establish(&mut peer, &gateway).await;

        peer.send_payload(&Payload::dispatch("MESSAGE_CREATE", 2, json!({"content": "hi"})));
        peer.send_payload(&Payload::dispatch("CHANNEL_PINS_UPDATE", 3, json!({})));

        let expected = [
            ("ready", json!({"session_id": "abc"})),
            ("message", json!({"content": "hi"})),
            ("CHANNEL_PINS_UPDATE", json!({})),
        ];
        for (name, data) in expected {
            assert_eq!(
                events.recv().await.unwrap(),
                GatewayEvent::Dispatch {
                    name: name.to_string(),
                    data,
                }
            );
        }
        assert_eq!(gateway.state(), ConnectionState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_carry_last_sequence() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector);
        let _gateway = client.connect(json_options()).await.unwrap();
        let mut peer = peers.recv().await.unwrap();

        let hello_at = Instant::now();
        peer.hello(1000);
        recv_op(&mut peer, OpCode::Identify).await;

        let beat = recv_op(&mut peer, OpCode::Heartbeat).await;
        assert_eq!(beat.d, Value::Null);
        let first = hello_at.elapsed();
        assert!(first >= Duration::from_millis(1000) && first < Duration::from_millis(1100));

        peer.send_payload(&Payload::new(OpCode::HeartbeatAck, Value::Null));
        peer.send_payload(&Payload::dispatch("TYPING_START", 7, json!({})));
        let beat = recv_op(&mut peer, OpCode::Heartbeat).await;
        assert_eq!(beat.d, json!(7));
        let second = hello_at.elapsed();
        assert!(second >= Duration::from_millis(2000) && second < Duration::from_millis(2100));
    }

    #[tokio::test]
    async fn test_gateway_heartbeat_request_is_answered() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector);
        let gateway = client.connect(json_options()).await.unwrap();
        let mut peer = peers.recv().await.unwrap();
        establish(&mut peer, &gateway).await;

        peer.send_payload(&Payload::heartbeat(None));
        let beat = recv_op(&mut peer, OpCode::Heartbeat).await;
        assert_eq!(beat.d, json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_times_out_after_every_attempt() {
        let (connector, _peers) = MockConnector::scripted(
            Codec::json(),
            Vec::new(),
            OpenBehavior::Delay(Duration::from_millis(100)),
        );
        let (client, _events) = client(connector.clone());
        let options = json_options()
            .timeout(Duration::from_millis(50))
            .reconnect_tries(1);

        let err = client.connect(options).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "timeout");
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn test_connect_surfaces_transport_error() {
        let (connector, _peers) = MockConnector::scripted(
            Codec::json(),
            Vec::new(),
            OpenBehavior::Fail("connection refused".to_string()),
        );
        let (client, _events) = client(connector.clone());

        let err = client.connect(json_options()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(connector.attempts(), 4);
    }

    #[tokio::test]
    async fn test_invalid_options_never_open() {
        let (connector, _peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector.clone());
        let options = json_options().gateway(
            GatewayOptions::default()
                .encoding(Encoding::Json)
                .compress(false)
                .large_threshold(10),
        );

        let err = client.connect(options).await.unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert_eq!(connector.attempts(), 0);
    }

    #[test]
    fn test_builder_requires_token() {
        let err = ClientBuilder::new(ClientOptions::default())
            .resolver(StaticResolver::new("mock://gateway"))
            .build()
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[tokio::test]
    async fn test_open_then_immediate_close_reconnects() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector.clone());
        let gateway = client.connect(json_options()).await.unwrap();

        drop(peers.recv().await.unwrap());

        let mut peer = peers.recv().await.unwrap();
        assert_eq!(connector.attempts(), 2);
        // No session id yet, so the new connection identifies
        peer.hello(41_250);
        recv_op(&mut peer, OpCode::Identify).await;
        assert!(gateway.state().is_open());
    }

    #[tokio::test]
    async fn test_reconnect_resumes_with_session_and_sequence() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, mut events) = client(connector);
        let gateway = client.connect(json_options()).await.unwrap();

        let mut first = peers.recv().await.unwrap();
        establish(&mut first, &gateway).await;
        first.send_payload(&Payload::dispatch("GUILD_CREATE", 2, json!({"id": "1"})));
        events.recv().await.unwrap();
        events.recv().await.unwrap();
        drop(first);

        let mut second = peers.recv().await.unwrap();
        second.hello(41_250);
        let resume = recv_op(&mut second, OpCode::Resume).await;
        assert_eq!(
            resume.d,
            json!({"token": "token", "session_id": "abc", "seq": 2})
        );
        gateway
            .wait_for_state(ConnectionState::Resuming)
            .await
            .unwrap();

        second.send_payload(&Payload::dispatch("RESUMED", 3, json!({})));
        gateway
            .wait_for_state(ConnectionState::Active)
            .await
            .unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            GatewayEvent::Dispatch {
                name: "resumed".to_string(),
                data: json!({}),
            }
        );
    }

    #[tokio::test]
    async fn test_reconnect_request_closes_and_resumes() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector);
        let gateway = client.connect(json_options()).await.unwrap();

        let mut first = peers.recv().await.unwrap();
        establish(&mut first, &gateway).await;
        first.send_payload(&Payload::new(OpCode::Reconnect, Value::Null));
        assert_eq!(
            first.recv().await,
            Some(Message::close(4000, "reconnecting"))
        );

        let mut second = peers.recv().await.unwrap();
        second.hello(41_250);
        let resume = recv_op(&mut second, OpCode::Resume).await;
        assert_eq!(resume.d["session_id"], "abc");
        assert_eq!(resume.d["seq"], 1);
    }

    #[tokio::test]
    async fn test_invalid_session_identifies_again() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector);
        let gateway = client.connect(json_options()).await.unwrap();

        let mut peer = peers.recv().await.unwrap();
        establish(&mut peer, &gateway).await;
        peer.send_payload(&Payload::new(OpCode::InvalidSession, json!(false)));
        let identify = recv_op(&mut peer, OpCode::Identify).await;
        assert_eq!(identify.d["token"], "token");
        gateway
            .wait_for_state(ConnectionState::Identifying)
            .await
            .unwrap();

        // The dropped session means the next connection identifies too
        drop(peer);
        let mut peer = peers.recv().await.unwrap();
        peer.hello(41_250);
        recv_op(&mut peer, OpCode::Identify).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacked_heartbeat_replaces_zombie_connection() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector.clone());
        let _gateway = client
            .connect(json_options().detect_zombies(true))
            .await
            .unwrap();

        let mut peer = peers.recv().await.unwrap();
        peer.hello(1000);
        recv_op(&mut peer, OpCode::Identify).await;
        recv_op(&mut peer, OpCode::Heartbeat).await;
        // No ack: the next tick gives up on this connection
        assert_eq!(peer.recv().await, Some(Message::close(4000, "reconnecting")));
        assert!(peers.recv().await.is_some());
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acked_heartbeats_keep_connection() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector.clone());
        let _gateway = client
            .connect(json_options().detect_zombies(true))
            .await
            .unwrap();

        let mut peer = peers.recv().await.unwrap();
        peer.hello(1000);
        recv_op(&mut peer, OpCode::Identify).await;
        for _ in 0..3 {
            recv_op(&mut peer, OpCode::Heartbeat).await;
            peer.send_payload(&Payload::new(OpCode::HeartbeatAck, Value::Null));
        }
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_reconnect_ends_session() {
        let (connector, mut peers) = MockConnector::scripted(
            Codec::json(),
            vec![OpenBehavior::Accept],
            OpenBehavior::Fail("gateway down".to_string()),
        );
        let (client, _events) = client(connector.clone());
        let gateway = client
            .connect(json_options().reconnect_tries(1))
            .await
            .unwrap();

        let mut peer = peers.recv().await.unwrap();
        establish(&mut peer, &gateway).await;
        drop(peer);

        gateway
            .wait_for_state(ConnectionState::Disconnected)
            .await
            .unwrap();
        assert_eq!(connector.attempts(), 3);
        assert!(gateway.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_undecodable_messages_are_dropped() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector.clone());
        let _gateway = client.connect(json_options()).await.unwrap();

        let mut peer = peers.recv().await.unwrap();
        peer.send(Message::text("{not json"));
        peer.send(Message::text(r#"{"op":42,"d":null}"#));
        peer.hello(41_250);
        recv_op(&mut peer, OpCode::Identify).await;
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_repeated_garbage_replaces_connection() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector.clone());
        let _gateway = client.connect(json_options()).await.unwrap();

        let mut peer = peers.recv().await.unwrap();
        for _ in 0..5 {
            peer.send(Message::text("garbage"));
        }
        assert_eq!(peer.recv().await, Some(Message::close(4000, "reconnecting")));
        assert!(peers.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_outbound_commands() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector);
        let gateway = client.connect(json_options()).await.unwrap();
        let mut peer = peers.recv().await.unwrap();
        establish(&mut peer, &gateway).await;

        gateway
            .update_status(&StatusUpdate {
                idle_since: None,
                game: Some(Game {
                    name: "chess".to_string(),
                }),
            })
            .await
            .unwrap();
        let status = recv_op(&mut peer, OpCode::StatusUpdate).await;
        assert_eq!(status.d, json!({"idle_since": null, "game": {"name": "chess"}}));

        gateway
            .request_guild_members(&RequestGuildMembers {
                guild_id: "41771983423143937".to_string(),
                query: String::new(),
                limit: 0,
            })
            .await
            .unwrap();
        let request = recv_op(&mut peer, OpCode::RequestGuildMembers).await;
        assert_eq!(request.d["guild_id"], "41771983423143937");
    }

    #[tokio::test]
    async fn test_gateway_only_ops_are_rejected() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector);
        let gateway = client.connect(json_options()).await.unwrap();
        let mut peer = peers.recv().await.unwrap();
        establish(&mut peer, &gateway).await;

        let err = assert_err!(
            gateway
                .send(&Payload::dispatch("MESSAGE_CREATE", 9, json!({})))
                .await
        );
        assert!(matches!(
            err,
            GatewayError::Core(cordcutter_core::Error::Protocol(ProtocolError::NotClientOp {
                op: OpCode::Dispatch
            }))
        ));
        assert_err!(gateway.send(&Payload::new(OpCode::HeartbeatAck, Value::Null)).await);

        assert_ok!(gateway.send(&Payload::heartbeat(Some(1))).await);
        let beat = recv_op(&mut peer, OpCode::Heartbeat).await;
        assert_eq!(beat.d, json!(1));
    }

    #[tokio::test]
    async fn test_dispatch_before_hello_keeps_awaiting_hello() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, mut events) = client(connector);
        let gateway = client.connect(json_options()).await.unwrap();
        let peer = peers.recv().await.unwrap();
        assert_ok!(gateway.wait_for_state(ConnectionState::AwaitingHello).await);

        peer.send_payload(&Payload::dispatch("READY", 1, json!({"session_id": "early"})));
        assert_eq!(
            events.recv().await.unwrap(),
            GatewayEvent::Dispatch {
                name: "ready".to_string(),
                data: json!({"session_id": "early"}),
            }
        );
        assert_eq!(gateway.state(), ConnectionState::AwaitingHello);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_restarts_with_new_interval_after_reconnect() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector);
        let gateway = assert_ok!(client.connect(json_options()).await);

        let mut first = peers.recv().await.unwrap();
        first.hello(1000);
        recv_op(&mut first, OpCode::Identify).await;
        first.send_payload(&Payload::dispatch("READY", 5, json!({"session_id": "abc"})));
        assert_ok!(gateway.wait_for_state(ConnectionState::Active).await);
        drop(first);

        let mut second = peers.recv().await.unwrap();
        let hello_at = Instant::now();
        second.hello(300);
        let resume = recv_op(&mut second, OpCode::Resume).await;
        assert_eq!(resume.d["seq"], 5);

        let beat = recv_op(&mut second, OpCode::Heartbeat).await;
        assert_eq!(beat.d, json!(5));
        let elapsed = hello_at.elapsed();
        assert!(
            elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(310),
            "first beat after {:?}",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_aborts_pending_reconnect() {
        let (connector, mut peers) = MockConnector::scripted(
            Codec::json(),
            vec![OpenBehavior::Accept],
            OpenBehavior::Hang,
        );
        let (client, _events) = client(connector.clone());
        let gateway = assert_ok!(client.connect(json_options()).await);

        let mut peer = peers.recv().await.unwrap();
        establish(&mut peer, &gateway).await;
        drop(peer);
        assert_ok!(gateway.wait_for_state(ConnectionState::Connecting).await);

        let state = gateway.subscribe_state();
        let started = Instant::now();
        assert_ok!(gateway.disconnect().await);
        assert!(started.elapsed() < Duration::from_millis(3000));
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
        assert_eq!(connector.attempts(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_closes_transport() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let (client, _events) = client(connector.clone());
        let gateway = client.connect(json_options()).await.unwrap();
        let mut peer = peers.recv().await.unwrap();
        establish(&mut peer, &gateway).await;

        let state = gateway.subscribe_state();
        gateway.disconnect().await.unwrap();
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
        assert_eq!(peer.recv().await, Some(Message::close(1000, "disconnect")));
        assert_eq!(connector.attempts(), 1);
    }

    #[cfg(feature = "compression")]
    #[tokio::test]
    async fn test_compressed_session() {
        let codec = Codec::new(Encoding::Json, true).unwrap();
        let (connector, mut peers) = MockConnector::new(codec);
        let (client, _events) = client(connector.clone());
        let options = ConnectOptions::default().gateway(
            GatewayOptions::default()
                .encoding(Encoding::Json)
                .compress(true),
        );
        let _gateway = client.connect(options).await.unwrap();

        let mut peer = peers.recv().await.unwrap();
        peer.hello(41_250);
        match peer.recv().await.unwrap() {
            Message::Binary(data) => {
                let identify = codec.decode(&Message::Binary(data)).unwrap();
                assert_eq!(identify.op, OpCode::Identify);
                assert_eq!(identify.d["compress"], true);
            }
            other => panic!("expected a compressed frame, got {}", other),
        }
    }

    #[cfg(feature = "etf")]
    #[tokio::test]
    async fn test_etf_session() {
        let codec = Codec::new(Encoding::Etf, false).unwrap();
        let (connector, mut peers) = MockConnector::new(codec);
        let (client, _events) = client(connector.clone());
        let options = ConnectOptions::default().gateway(
            GatewayOptions::default()
                .encoding(Encoding::Etf)
                .compress(false),
        );
        let gateway = client.connect(options).await.unwrap();
        assert_eq!(
            connector.urls(),
            vec!["mock://gateway/?v=6&encoding=etf".to_string()]
        );

        let mut peer = peers.recv().await.unwrap();
        establish(&mut peer, &gateway).await;
    }
}
