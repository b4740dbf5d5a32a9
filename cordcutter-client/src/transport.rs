//! Transport layer abstraction
//!
//! A [`Connector`] opens message-framed duplex [`Socket`]s to a URL. The
//! session only ever sees whole text, binary and close messages; ping/pong
//! handling stays inside the transport.

use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use cordcutter_core::message::{CloseFrame, Message};
use futures_util::{SinkExt, StreamExt};
use std::fmt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Opens sockets to the gateway
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The socket type produced by this connector
    type Socket: Socket;

    /// Open a socket to the given URL
    async fn open(&self, url: &str) -> Result<Self::Socket>;
}

/// An open message-framed socket
#[async_trait]
pub trait Socket: Send + 'static {
    /// Send a message
    async fn send(&mut self, message: Message) -> Result<()>;

    /// Receive the next message; `None` once the socket is closed.
    ///
    /// Must be cancel safe.
    async fn next(&mut self) -> Option<Result<Message>>;

    /// Close the socket with a close code and reason
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a new WebSocket connector
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Socket = WsSocket;

    async fn open(&self, url: &str) -> Result<WsSocket> {
        let (stream, response) = tokio_tungstenite::connect_async(url).await?;
        tracing::debug!(url, status = %response.status(), "websocket handshake complete");
        Ok(WsSocket { stream })
    }
}

/// WebSocket connection to the gateway
pub struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl fmt::Debug for WsSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsSocket").finish_non_exhaustive()
    }
}

#[async_trait]
impl Socket for WsSocket {
    async fn send(&mut self, message: Message) -> Result<()> {
        let message = match message {
            Message::Text(text) => WsMessage::Text(text),
            Message::Binary(data) => WsMessage::Binary(data.to_vec()),
            Message::Close(frame) => WsMessage::Close(frame.map(|frame| WsCloseFrame {
                code: CloseCode::from(frame.code),
                reason: frame.reason.into(),
            })),
        };
        self.stream.send(message).await?;
        Ok(())
    }

    async fn next(&mut self) -> Option<Result<Message>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(err) => return Some(Err(err.into())),
            };

            match message {
                WsMessage::Text(text) => return Some(Ok(Message::Text(text))),
                WsMessage::Binary(data) => return Some(Ok(Message::Binary(Bytes::from(data)))),
                WsMessage::Close(frame) => {
                    return Some(Ok(Message::Close(frame.map(|frame| CloseFrame {
                        code: u16::from(frame.code),
                        reason: frame.reason.into_owned(),
                    }))))
                }
                // Pongs are queued by tungstenite itself
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = WsCloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        match self.stream.close(Some(frame)).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(err) => Err(GatewayError::from(err)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use cordcutter_core::codec::Codec;
    use cordcutter_core::payload::Payload;

    #[tokio::test]
    async fn test_mock_socket_exchange() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let mut socket = connector.open("mock://gateway").await.unwrap();
        let mut peer = peers.recv().await.unwrap();

        peer.hello(41250);
        let message = socket.next().await.unwrap().unwrap();
        assert_eq!(message, Message::text(r#"{"op":10,"d":{"heartbeat_interval":41250}}"#));

        socket
            .send(Codec::json().encode(&Payload::heartbeat(None)).unwrap())
            .await
            .unwrap();
        assert_eq!(peer.recv_payload().await, Some(Payload::heartbeat(None)));

        socket.close(4000, "bye").await.unwrap();
        assert_eq!(peer.recv().await, Some(Message::close(4000, "bye")));
        assert!(socket.next().await.is_none());
        assert_eq!(connector.attempts(), 1);
        assert_eq!(connector.urls(), vec!["mock://gateway".to_string()]);
    }

    #[tokio::test]
    async fn test_dropped_peer_ends_stream() {
        let (connector, mut peers) = MockConnector::new(Codec::json());
        let mut socket = connector.open("mock://gateway").await.unwrap();
        drop(peers.recv().await.unwrap());
        assert!(socket.next().await.is_none());
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let (connector, _peers) = MockConnector::scripted(
            Codec::json(),
            vec![OpenBehavior::Fail("refused".to_string())],
            OpenBehavior::Accept,
        );
        let err = connector.open("mock://gateway").await.unwrap_err();
        assert_eq!(err.to_string(), "refused");
        assert!(connector.open("mock://gateway").await.is_ok());
        assert_eq!(connector.attempts(), 2);
    }
}
