use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{Error, Result};

/// One WebSocket frame, independent of the transport library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    /// Close frame with its reason, if any
    Close(Option<String>),
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Ping(data) => Message::Ping(data),
            Frame::Pong(data) => Message::Pong(data),
            Frame::Close(_) => Message::Close(None),
        }
    }
}

impl From<Message> for Frame {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => Frame::Text(text),
            Message::Binary(data) => Frame::Binary(data),
            Message::Ping(data) => Frame::Ping(data),
            Message::Pong(data) => Frame::Pong(data),
            Message::Close(close_frame) => Frame::Close(
                close_frame.map(|frame| format!("code={}, reason={}", frame.code, frame.reason)),
            ),
            // Raw frames are never yielded while reading
            Message::Frame(_) => Frame::Binary(Vec::new()),
        }
    }
}

/// An open connection for one epoch
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Next inbound frame; `None` once the connection has ended
    ///
    /// Server pings are answered by the implementation and only reported.
    async fn receive(&mut self) -> Option<Result<Frame>>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens transports; one call per epoch
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport + 'static;

    /// Connect to `url`, attaching `headers` to the upgrade request
    async fn connect(&self, url: &str, headers: &[(String, String)]) -> Result<Self::Transport>;
}

/// Connector backed by tokio-tungstenite; only `wss://` URLs are accepted
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str, headers: &[(String, String)]) -> Result<WsTransport> {
        if !url.starts_with("wss://") {
            return Err(Error::WebSocket(format!(
                "secure transport required, refusing {}",
                url
            )));
        }

        let mut request = url.into_client_request()?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid header value: {}", e)))?;
            request.headers_mut().insert(name, value);
        }

        let (stream, response) = connect_async(request).await?;
        debug!(status = %response.status(), "websocket handshake complete");

        Ok(WsTransport { stream })
    }
}

/// tokio-tungstenite WebSocket stream
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.stream.send(frame.into()).await?;
        Ok(())
    }

    async fn receive(&mut self) -> Option<Result<Frame>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Frame(_)) => continue,
                Ok(message) => return Some(Ok(message.into())),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(e) => match Error::from(e) {
                // Already gone is the outcome we wanted
                Error::ConnectionClosed => Ok(()),
                other => Err(other),
            },
        }
    }
}
