//! Realtime push channel: message taxonomy, transport seam, connection loop.

pub mod connection;
pub mod message;
pub mod transport;
pub mod ws;

pub use connection::{ConnectionState, MessageHandler, RealtimeConnection};
pub use message::RealtimeMessage;
pub use transport::{FrameEvent, RealtimeStream, RealtimeTransport};
pub use ws::WsTransport;
