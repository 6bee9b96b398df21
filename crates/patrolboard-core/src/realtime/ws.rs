//! WebSocket transport over tokio-tungstenite.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::transport::{FrameEvent, RealtimeStream, RealtimeTransport};
use crate::error::RealtimeError;

/// Production transport. The bearer token travels as a query parameter,
/// matching the device endpoint's handshake.
pub struct WsTransport;

#[async_trait]
impl RealtimeTransport for WsTransport {
    async fn connect(
        &self,
        url: &Url,
        bearer: &str,
    ) -> Result<Box<dyn RealtimeStream>, RealtimeError> {
        let mut request_url = url.clone();
        request_url.query_pairs_mut().append_pair("token", bearer);
        let (stream, _response) = connect_async(request_url.as_str())
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        Ok(Box::new(WsStream { inner: stream }))
    }
}

struct WsStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl RealtimeStream for WsStream {
    async fn receive(&mut self) -> FrameEvent {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return FrameEvent::Frame(text),
                Some(Ok(Message::Close(_))) | None => return FrameEvent::Closed,
                // Pings/pongs are handled by tungstenite; binary frames are
                // not part of the protocol.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return FrameEvent::Failed(RealtimeError::Stream(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}
