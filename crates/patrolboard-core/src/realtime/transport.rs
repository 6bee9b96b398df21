//! Abstract duplex transport for the push channel.
//!
//! The connection loop only ever sees these traits, so it can be exercised
//! against scripted in-memory transports. The production implementation
//! lives in [`super::ws`].

use async_trait::async_trait;
use url::Url;

use crate::error::RealtimeError;

/// One received event from the wire.
#[derive(Debug)]
pub enum FrameEvent {
    /// A complete text frame.
    Frame(String),
    /// The peer closed the connection.
    Closed,
    /// The stream failed; treated the same as a close by the loop.
    Failed(RealtimeError),
}

/// An established push-channel stream.
#[async_trait]
pub trait RealtimeStream: Send {
    /// Block until the next frame, close, or error.
    async fn receive(&mut self) -> FrameEvent;

    /// Close the stream. Best effort; errors are ignored.
    async fn close(&mut self);
}

/// Connects push-channel streams.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open a connection to `url`, authenticating with `bearer`.
    async fn connect(
        &self,
        url: &Url,
        bearer: &str,
    ) -> Result<Box<dyn RealtimeStream>, RealtimeError>;
}
