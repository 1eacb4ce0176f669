use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{FrameSink, FrameSource};
use crate::config::SessionConfig;
use crate::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Пишущая половина websocket
pub struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

/// Читающая половина websocket
pub struct WsSource {
    inner: SplitStream<WsStream>,
}

/// Открывает websocket с заголовком `Origin` из конфигурации и делит его
/// на половины для писателя и читателя.
pub async fn connect(config: &SessionConfig) -> Result<(WsSink, WsSource), TransportError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::Connect(format!("bad url {:?}: {e}", config.url)))?;

    let origin = HeaderValue::from_str(&config.origin)
        .map_err(|e| TransportError::Connect(format!("bad origin {:?}: {e}", config.origin)))?;
    request.headers_mut().insert("Origin", origin);

    let (stream, response) = connect_async(request)
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    info!("websocket connected: {} status={}", config.url, response.status());

    let (write, read) = stream.split();
    Ok((WsSink { inner: write }, WsSource { inner: read }))
}

fn send_error(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed
        | tungstenite::Error::Io(_) => TransportError::Closed,
        other => TransportError::Send(other.to_string()),
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(send_error)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.inner.close().await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(send_error(e)),
        }
    }
}

#[async_trait]
impl FrameSource for WsSource {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    info!("websocket close frame: {frame:?}");
                    return None;
                }
                // pong на ping tungstenite отправляет сам
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Ok(Message::Binary(data)) => {
                    debug!("ignoring binary message ({} bytes)", data.len());
                    continue;
                }
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                }
                Err(tungstenite::Error::Io(e)) => {
                    warn!("websocket io error: {e}");
                    return Some(Err(TransportError::Closed));
                }
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }
}
