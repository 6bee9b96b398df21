//! End-to-end orchestrator tests against scripted collaborators.
//!
//! Everything runs on a paused tokio clock; timing assertions are exact in
//! virtual time. The scripted transport defaults to a silent connected
//! stream once its scripts run out, so the connection loop settles instead
//! of reconnect-spinning.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

use patrolboard_core::realtime::transport::{FrameEvent, RealtimeStream};
use patrolboard_core::{
    ApiError, DisplaySink, FetchFailure, FetchOutcome, Orchestrator, OrchestratorConfig,
    PatrolScore, RateLimitState, RealtimeError, RealtimeTransport, Reauthenticator, ScoreSnapshot,
    ScoreSource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Scores {
        patrols: usize,
        connected: bool,
        offset: u32,
    },
    Countdown {
        remaining: u32,
        paused: bool,
    },
}

#[derive(Default)]
struct RecordingDisplay {
    frames: Mutex<Vec<Frame>>,
}

impl RecordingDisplay {
    fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    fn score_frames(&self) -> usize {
        self.frames()
            .iter()
            .filter(|f| matches!(f, Frame::Scores { .. }))
            .count()
    }

    fn countdown_frames(&self) -> Vec<(u32, bool)> {
        self.frames()
            .iter()
            .filter_map(|f| match f {
                Frame::Countdown { remaining, paused } => Some((*remaining, *paused)),
                _ => None,
            })
            .collect()
    }
}

impl DisplaySink for RecordingDisplay {
    fn render_scores(
        &self,
        patrols: &[PatrolScore],
        _rate_limit: RateLimitState,
        realtime_connected: bool,
        score_offset: u32,
    ) {
        self.frames.lock().unwrap().push(Frame::Scores {
            patrols: patrols.len(),
            connected: realtime_connected,
            offset: score_offset,
        });
    }

    fn render_countdown(&self, remaining_seconds: u32, paused: bool) {
        self.frames.lock().unwrap().push(Frame::Countdown {
            remaining: remaining_seconds,
            paused,
        });
    }
}

fn snapshot() -> ScoreSnapshot {
    ScoreSnapshot {
        patrols: vec![PatrolScore {
            id: "p1".into(),
            name: "Eagles".into(),
            score: 42,
        }],
        from_cache: false,
        // Far enough out that the schedule never fires during a test.
        cache_expires_at: Utc::now() + ChronoDuration::hours(1),
        rate_limit_state: RateLimitState::None,
    }
}

/// Returns scripted outcomes in order, then quiet far-future successes.
struct ScriptedSource {
    outcomes: Mutex<VecDeque<FetchOutcome>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    fn new(outcomes: Vec<FetchOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoreSource for ScriptedSource {
    async fn fetch_scores(&self) -> FetchOutcome {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| FetchOutcome::Success(snapshot()))
    }
}

/// Returns scripted results in order, then fresh tokens.
struct ScriptedReauth {
    results: Mutex<VecDeque<Result<String, ApiError>>>,
    calls: AtomicUsize,
}

impl ScriptedReauth {
    fn new(results: Vec<Result<String, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reauthenticator for ScriptedReauth {
    async fn reauthenticate(&self) -> Result<String, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("tok-fresh".to_string()))
    }
}

struct ScriptedStream {
    events: VecDeque<FrameEvent>,
    hang_when_empty: bool,
}

#[async_trait]
impl RealtimeStream for ScriptedStream {
    async fn receive(&mut self) -> FrameEvent {
        match self.events.pop_front() {
            Some(ev) => ev,
            None if self.hang_when_empty => std::future::pending().await,
            None => FrameEvent::Closed,
        }
    }
    async fn close(&mut self) {}
}

/// Hands out one scripted frame sequence per connect; once the scripts run
/// out every further connect yields a silent connected stream. A sequence
/// ending in `Closed` makes the loop reconnect to reach the next script.
struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<FrameEvent>>>,
    bearers: Mutex<Vec<String>>,
    connects: AtomicUsize,
}

impl ScriptedTransport {
    fn new(scripts: Vec<Vec<FrameEvent>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            bearers: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
        })
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn bearers(&self) -> Vec<String> {
        self.bearers.lock().unwrap().clone()
    }
}

#[async_trait]
impl RealtimeTransport for ScriptedTransport {
    async fn connect(
        &self,
        _url: &Url,
        bearer: &str,
    ) -> Result<Box<dyn RealtimeStream>, RealtimeError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.bearers.lock().unwrap().push(bearer.to_string());
        match self.scripts.lock().unwrap().pop_front() {
            Some(events) => Ok(Box::new(ScriptedStream {
                events: events.into(),
                hang_when_empty: false,
            })),
            None => Ok(Box::new(ScriptedStream {
                events: VecDeque::new(),
                hang_when_empty: true,
            })),
        }
    }
}

fn frame(json: &str) -> FrameEvent {
    FrameEvent::Frame(json.to_string())
}

fn config_with_realtime() -> OrchestratorConfig {
    OrchestratorConfig {
        realtime_url: Some(Url::parse("ws://localhost:8080/ws/device").unwrap()),
        ..OrchestratorConfig::default()
    }
}

fn spawn(
    source: Arc<ScriptedSource>,
    reauth: Arc<ScriptedReauth>,
    display: Arc<RecordingDisplay>,
    transport: Arc<ScriptedTransport>,
    config: OrchestratorConfig,
) -> (tokio::task::JoinHandle<()>, watch::Sender<bool>) {
    let orchestrator = Orchestrator::new(
        source,
        reauth,
        display,
        transport,
        "tok-1".to_string(),
        config,
    );
    let (tx, rx) = watch::channel(false);
    (tokio::spawn(orchestrator.run(rx)), tx)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

async fn stop(tx: watch::Sender<bool>, task: tokio::task::JoinHandle<()>) {
    let _ = tx.send(true);
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("orchestrator did not stop in time")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn first_success_renders_and_brings_up_realtime() {
    let source = ScriptedSource::new(vec![]);
    let reauth = ScriptedReauth::new(vec![]);
    let display = Arc::new(RecordingDisplay::default());
    let transport = ScriptedTransport::new(vec![]);

    let (task, tx) = spawn(
        source.clone(),
        reauth.clone(),
        display.clone(),
        transport.clone(),
        config_with_realtime(),
    );
    settle().await;

    assert_eq!(source.fetches(), 1);
    assert_eq!(display.score_frames(), 1);
    assert_eq!(transport.connects(), 1);
    assert_eq!(transport.bearers(), vec!["tok-1"]);
    assert_eq!(reauth.calls(), 0);

    stop(tx, task).await;
}

#[tokio::test(start_paused = true)]
async fn realtime_stays_down_when_disabled() {
    let source = ScriptedSource::new(vec![]);
    let reauth = ScriptedReauth::new(vec![]);
    let display = Arc::new(RecordingDisplay::default());
    let transport = ScriptedTransport::new(vec![]);

    let (task, tx) = spawn(
        source.clone(),
        reauth.clone(),
        display.clone(),
        transport.clone(),
        OrchestratorConfig::default(),
    );
    settle().await;

    assert_eq!(source.fetches(), 1);
    assert_eq!(display.score_frames(), 1);
    assert_eq!(transport.connects(), 0);

    stop(tx, task).await;
}

#[tokio::test(start_paused = true)]
async fn burst_of_refresh_messages_coalesces_into_one_fetch() {
    let source = ScriptedSource::new(vec![]);
    let reauth = ScriptedReauth::new(vec![]);
    let display = Arc::new(RecordingDisplay::default());
    let transport = ScriptedTransport::new(vec![vec![
        frame(r#"{"type":"refresh-scores"}"#),
        frame(r#"{"type":"refresh-scores"}"#),
    ]]);

    let (task, tx) = spawn(
        source.clone(),
        reauth.clone(),
        display.clone(),
        transport.clone(),
        config_with_realtime(),
    );
    settle().await;

    // Initial fetch plus exactly one for the coalesced burst.
    assert_eq!(source.fetches(), 2);
    assert_eq!(display.score_frames(), 2);

    stop(tx, task).await;
}

#[tokio::test(start_paused = true)]
async fn countdown_owns_the_display_until_reset() {
    let source = ScriptedSource::new(vec![]);
    let reauth = ScriptedReauth::new(vec![]);
    let display = Arc::new(RecordingDisplay::default());
    // First stream starts the countdown, then closes; the reconnect
    // requests a refresh (pending while the timer runs) and resets.
    let transport = ScriptedTransport::new(vec![
        vec![
            frame(r#"{"type":"timer-start","duration":300}"#),
            FrameEvent::Closed,
        ],
        vec![
            frame(r#"{"type":"refresh-scores"}"#),
            frame(r#"{"type":"timer-reset"}"#),
        ],
    ]);

    let (task, tx) = spawn(
        source.clone(),
        reauth.clone(),
        display.clone(),
        transport.clone(),
        config_with_realtime(),
    );
    settle().await;

    // Countdown running: score output is frozen at the initial frame.
    assert_eq!(display.score_frames(), 1);
    let countdowns = display.countdown_frames();
    assert_eq!(countdowns.first(), Some(&(300, false)));

    // Reconnect (2s backoff, plus jitter) delivers refresh + reset.
    tokio::time::sleep(Duration::from_secs(5)).await;

    // Reset repaints the cached scores and the pending refresh fetches.
    assert_eq!(source.fetches(), 2);
    assert_eq!(display.score_frames(), 3);

    // No countdown frames once the timer is inactive again.
    let after_reset = display.countdown_frames().len();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(display.countdown_frames().len(), after_reset);

    stop(tx, task).await;
}

#[tokio::test(start_paused = true)]
async fn auth_loss_suspends_fetching_until_reauth_succeeds() {
    let source = ScriptedSource::new(vec![FetchOutcome::Failure(FetchFailure::AuthExpired)]);
    let reauth = ScriptedReauth::new(vec![
        Err(ApiError::AccessDenied),
        Ok("tok-2".to_string()),
    ]);
    let display = Arc::new(RecordingDisplay::default());
    let transport = ScriptedTransport::new(vec![]);

    let (task, tx) = spawn(
        source.clone(),
        reauth.clone(),
        display.clone(),
        transport.clone(),
        config_with_realtime(),
    );

    // First attempt failed and the retry wait (5s) is in progress: no
    // fetches happen while auth is invalid.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(source.fetches(), 1);
    assert_eq!(reauth.calls(), 1);
    assert_eq!(display.score_frames(), 0);
    assert_eq!(transport.connects(), 0);

    // Retry succeeds; an immediate fetch follows with the new token.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(reauth.calls(), 2);
    assert_eq!(source.fetches(), 2);
    assert_eq!(display.score_frames(), 1);
    assert_eq!(transport.bearers(), vec!["tok-2"]);

    stop(tx, task).await;
}

#[tokio::test(start_paused = true)]
async fn server_disconnect_forces_reauth_and_reconnect() {
    let source = ScriptedSource::new(vec![]);
    let reauth = ScriptedReauth::new(vec![Ok("tok-2".to_string())]);
    let display = Arc::new(RecordingDisplay::default());
    let transport = ScriptedTransport::new(vec![vec![frame(
        r#"{"type":"disconnect","reason":"registration revoked"}"#,
    )]]);

    let (task, tx) = spawn(
        source.clone(),
        reauth.clone(),
        display.clone(),
        transport.clone(),
        config_with_realtime(),
    );
    // The loop notices the termination flag within one idle-wait cap.
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(reauth.calls(), 1);
    assert_eq!(source.fetches(), 2);
    assert_eq!(transport.connects(), 2);
    assert_eq!(transport.bearers(), vec!["tok-1", "tok-2"]);

    stop(tx, task).await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_bounded_with_timer_and_connection_active() {
    let source = ScriptedSource::new(vec![]);
    let reauth = ScriptedReauth::new(vec![]);
    let display = Arc::new(RecordingDisplay::default());
    let transport = ScriptedTransport::new(vec![vec![frame(
        r#"{"type":"timer-start","duration":600}"#,
    )]]);

    let (task, tx) = spawn(
        source.clone(),
        reauth.clone(),
        display.clone(),
        transport.clone(),
        config_with_realtime(),
    );
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!display.countdown_frames().is_empty());

    stop(tx, task).await;
}

#[tokio::test(start_paused = true)]
async fn unknown_message_types_are_ignored() {
    let source = ScriptedSource::new(vec![]);
    let reauth = ScriptedReauth::new(vec![]);
    let display = Arc::new(RecordingDisplay::default());
    let transport = ScriptedTransport::new(vec![vec![
        frame(r#"{"type":"brightness","level":3}"#),
        frame("not json at all"),
    ]]);

    let (task, tx) = spawn(
        source.clone(),
        reauth.clone(),
        display.clone(),
        transport.clone(),
        config_with_realtime(),
    );
    settle().await;

    // Nothing beyond the initial fetch and render.
    assert_eq!(source.fetches(), 1);
    assert_eq!(display.score_frames(), 1);
    assert_eq!(reauth.calls(), 0);

    stop(tx, task).await;
}
