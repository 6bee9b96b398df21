//! Push-channel connection loop.
//!
//! Owns at most one logical connection at a time and retries forever until
//! stopped. Connectivity transitions and decoded messages surface to the
//! orchestrator without blocking: the handler runs inline on the receive
//! loop and must be short.
//!
//! State machine: Disconnected -> Connecting -> Connected -> Disconnected,
//! re-entering Connecting after the backoff delay. The attempt counter
//! increments only on attempts that never reached Connected and resets to
//! zero the moment a connection is established, so a long-lived connection
//! that drops reconnects after the base delay.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::message::{decode, RealtimeMessage};
use super::transport::{FrameEvent, RealtimeTransport};
use crate::backoff::ReconnectBackoff;

const STOP_GRACE: Duration = Duration::from_secs(3);

/// Handler for decoded messages. Runs on the receive loop; must not block.
pub type MessageHandler = Arc<dyn Fn(RealtimeMessage) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            2 => Self::Connected,
            1 => Self::Connecting,
            _ => Self::Disconnected,
        }
    }
}

struct Worker {
    url: Url,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Maintains one push-channel connection with automatic reconnect.
pub struct RealtimeConnection {
    transport: Arc<dyn RealtimeTransport>,
    backoff: ReconnectBackoff,
    state: Arc<AtomicU8>,
    worker: Mutex<Option<Worker>>,
}

impl RealtimeConnection {
    pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
        Self::with_backoff(transport, ReconnectBackoff::new())
    }

    pub fn with_backoff(transport: Arc<dyn RealtimeTransport>, backoff: ReconnectBackoff) -> Self {
        Self {
            transport,
            backoff,
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)),
            worker: Mutex::new(None),
        }
    }

    /// Begin the background connection loop. No-op if a loop is already
    /// running for the same endpoint; a loop for a different endpoint is
    /// signalled to stop and replaced.
    pub fn start(&self, url: Url, bearer: String, handler: MessageHandler) {
        let mut worker = self.worker.lock().unwrap();
        if let Some(existing) = worker.as_ref() {
            if !existing.task.is_finished() {
                if existing.url == url {
                    debug!(%url, "realtime connection already running");
                    return;
                }
                warn!(old = %existing.url, new = %url, "replacing realtime connection");
                let _ = existing.stop_tx.send(true);
            }
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(
            self.transport.clone(),
            url.clone(),
            bearer,
            handler,
            self.state.clone(),
            self.backoff,
            stop_rx,
        ));
        *worker = Some(Worker { url, stop_tx, task });
    }

    /// Request shutdown and wait for the loop to exit, bounded by a grace
    /// period. Interrupts an in-flight attempt or backoff wait. Safe to
    /// call when not started and safe to call repeatedly.
    pub async fn stop(&self) {
        let worker = self.worker.lock().unwrap().take();
        if let Some(Worker { stop_tx, mut task, .. }) = worker {
            let _ = stop_tx.send(true);
            if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
                warn!("realtime loop did not stop within grace period; aborting");
                task.abort();
            }
        }
        self.state
            .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
    }

    /// Last known state. May be briefly stale relative to the wire; this is
    /// a display hint, not a synchronization primitive.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

async fn run_loop(
    transport: Arc<dyn RealtimeTransport>,
    url: Url,
    bearer: String,
    handler: MessageHandler,
    state: Arc<AtomicU8>,
    backoff: ReconnectBackoff,
    mut stop_rx: watch::Receiver<bool>,
) {
    let set_state = |s: ConnectionState| state.store(s as u8, Ordering::SeqCst);
    let mut attempt: u32 = 0;

    loop {
        if *stop_rx.borrow() {
            break;
        }
        set_state(ConnectionState::Connecting);

        let result = tokio::select! {
            res = transport.connect(&url, &bearer) => res,
            _ = stop_rx.changed() => break,
        };

        let delay = match result {
            Ok(mut stream) => {
                attempt = 0;
                set_state(ConnectionState::Connected);
                info!(%url, "realtime channel connected");
                loop {
                    let event = tokio::select! {
                        ev = stream.receive() => ev,
                        _ = stop_rx.changed() => {
                            stream.close().await;
                            set_state(ConnectionState::Disconnected);
                            return;
                        }
                    };
                    match event {
                        FrameEvent::Frame(text) => {
                            if let Some(msg) = decode(&text) {
                                handler(msg);
                            }
                        }
                        FrameEvent::Closed => {
                            debug!("realtime channel closed by peer");
                            break;
                        }
                        FrameEvent::Failed(e) => {
                            debug!(error = %e, "realtime stream failed");
                            break;
                        }
                    }
                }
                set_state(ConnectionState::Disconnected);
                backoff.delay(attempt)
            }
            Err(e) => {
                set_state(ConnectionState::Disconnected);
                let delay = backoff.delay(attempt);
                debug!(
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "realtime connect failed"
                );
                attempt = attempt.saturating_add(1);
                delay
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop_rx.changed() => break,
        }
    }
    set_state(ConnectionState::Disconnected);
}
