//! # Websocket Transport
//!
//! The connection manager talks to the network through the [`Connector`] trait:
//! one call opens a connection and hands back a frame sink and a frame stream.
//! The production implementation wraps `tokio-tungstenite`; tests plug in an
//! in-process pair of channels instead.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::future;
use futures_util::sink::{Sink, SinkExt};
use futures_util::stream::{Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use crate::codec::Frame;
use crate::error::{OtcError, OtcResult};

/// Write half of an open connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = OtcError> + Send>>;
/// Read half of an open connection. The stream ends when the peer goes away.
pub type FrameStream = Pin<Box<dyn Stream<Item = OtcResult<Frame>> + Send>>;

/// Opens full-duplex frame connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> OtcResult<(FrameSink, FrameStream)>;
}

/// Websocket connector backed by `tokio-tungstenite` (TLS via rustls).
#[derive(Clone, Copy, Debug, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> OtcResult<(FrameSink, FrameStream)> {
        let (ws_stream, response) = connect_async(url).await?;
        tracing::debug!("Websocket handshake completed with status {}", response.status());
        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(OtcError::from)
            .with(|frame: Frame| future::ready(Ok::<_, OtcError>(to_ws_message(frame))));

        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(WsMessage::Binary(bytes)) => Some(Ok(Frame::Binary(bytes.to_vec()))),
                Ok(WsMessage::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Ok(WsMessage::Close(close)) => {
                    let reason = close
                        .map(|c| format!("closed by server: {} {}", u16::from(c.code), c.reason.as_str()))
                        .unwrap_or_else(|| "closed by server".to_string());
                    Some(Err(OtcError::ConnectionLost(reason)))
                }
                // Control frames are answered by tungstenite itself.
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

fn to_ws_message(frame: Frame) -> WsMessage {
    match frame {
        Frame::Binary(bytes) => WsMessage::binary(bytes),
        Frame::Text(text) => WsMessage::text(text),
    }
}

/// A connector that never connects.
#[cfg(test)]
pub(crate) struct NullConnector;

#[cfg(test)]
#[async_trait]
impl Connector for NullConnector {
    async fn connect(&self, url: &str) -> OtcResult<(FrameSink, FrameStream)> {
        Err(OtcError::Transport(format!("no route to {url}")))
    }
}
