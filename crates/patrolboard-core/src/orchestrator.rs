//! Synchronization orchestrator.
//!
//! Arbitrates the three timing sources over the single display: the poll
//! schedule, the realtime push channel, and the countdown timer. Display
//! ownership is cooperative: while the countdown is active the orchestrator
//! takes no display action at all, and the timer engine never renders
//! scores, so the two writers cannot race.
//!
//! The loop never terminates the process on its own. Fetch failures are
//! schedule inputs, transport failures are the connection loop's problem,
//! and auth loss suspends both sides until re-authentication succeeds.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::types::{FetchOutcome, ScoreSnapshot};
use crate::display::DisplaySink;
use crate::poll::PollScheduler;
use crate::realtime::{MessageHandler, RealtimeConnection, RealtimeMessage, RealtimeTransport};
use crate::timer::{CountdownEngine, TimerCommand, TimerPhase};
use crate::wake::WakeSignal;

/// Performs one authenticated score fetch. Infallible by contract: every
/// failure is a categorized `FetchOutcome`.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn fetch_scores(&self) -> FetchOutcome;
}

/// Invoked when auth becomes invalid. Performs whatever exchange is needed
/// (device flow, token refresh) and returns the fresh bearer token; the
/// orchestrator does not know the protocol.
#[async_trait]
pub trait Reauthenticator: Send + Sync {
    async fn reauthenticate(&self) -> Result<String, crate::error::ApiError>;
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Push-channel endpoint; `None` disables realtime entirely.
    pub realtime_url: Option<Url>,
    /// Cap on the idle wait so shutdown and wake signals are noticed
    /// promptly.
    pub loop_tick: Duration,
    /// Wait between ownership re-checks while the countdown holds the
    /// display.
    pub timer_wait: Duration,
    /// Wait before retrying a failed re-authentication.
    pub reauth_retry: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            realtime_url: None,
            loop_tick: Duration::from_secs(1),
            timer_wait: Duration::from_millis(100),
            reauth_retry: Duration::from_secs(5),
        }
    }
}

pub struct Orchestrator {
    source: Arc<dyn ScoreSource>,
    reauth: Arc<dyn Reauthenticator>,
    display: Arc<dyn DisplaySink>,
    connection: RealtimeConnection,
    timer: CountdownEngine,
    scheduler: PollScheduler,
    wake: Arc<WakeSignal>,
    /// Set by the message handler on a server-initiated disconnect.
    session_terminated: Arc<AtomicBool>,
    auth_valid: bool,
    bearer: String,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn ScoreSource>,
        reauth: Arc<dyn Reauthenticator>,
        display: Arc<dyn DisplaySink>,
        transport: Arc<dyn RealtimeTransport>,
        bearer: String,
        config: OrchestratorConfig,
    ) -> Self {
        let timer = CountdownEngine::spawn(display.clone());
        Self {
            source,
            reauth,
            display,
            connection: RealtimeConnection::new(transport),
            timer,
            scheduler: PollScheduler::new(),
            wake: Arc::new(WakeSignal::new()),
            session_terminated: Arc::new(AtomicBool::new(false)),
            auth_valid: true,
            bearer,
            config,
        }
    }

    /// Route one decoded push message. Runs on the receive loop, so every
    /// arm is a short non-blocking call.
    fn message_handler(&self) -> MessageHandler {
        let wake = self.wake.clone();
        let timer = self.timer.handle();
        let terminated = self.session_terminated.clone();
        Arc::new(move |msg| match msg {
            RealtimeMessage::RefreshScores => {
                debug!("push: refresh requested");
                wake.set();
            }
            RealtimeMessage::Disconnect { reason } => {
                info!(%reason, "push: server terminated the session");
                terminated.store(true, Ordering::SeqCst);
            }
            RealtimeMessage::TimerStart { duration } => {
                info!(duration, "push: timer start");
                timer.command(TimerCommand::Start {
                    duration_secs: duration,
                });
            }
            RealtimeMessage::TimerPause => timer.command(TimerCommand::Pause),
            RealtimeMessage::TimerResume => timer.command(TimerCommand::Resume),
            RealtimeMessage::TimerReset => timer.command(TimerCommand::Reset),
        })
    }

    /// Drive the control loop until `shutdown` flips. Consumes the
    /// orchestrator; on exit the timer engine and the realtime connection
    /// are stopped, in that order, within a bounded grace period.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let handler = self.message_handler();
        let mut realtime_started = false;
        let mut last_scores: Option<ScoreSnapshot> = None;
        let mut timer_had_display = false;

        info!("orchestrator starting");
        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.session_terminated.swap(false, Ordering::SeqCst) {
                self.connection.stop().await;
                realtime_started = false;
                self.auth_valid = false;
            }

            // (a) Countdown owns the display: take no display action.
            if self.timer.phase() != TimerPhase::Inactive {
                timer_had_display = true;
                tokio::select! {
                    _ = tokio::time::sleep(self.config.timer_wait) => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            }

            // The countdown just released the display; repaint the board
            // so scheduler-driven output resumes this iteration.
            if timer_had_display {
                timer_had_display = false;
                if let Some(snap) = &last_scores {
                    self.display.render_scores(
                        &snap.patrols,
                        self.scheduler.rate_limit_state(),
                        self.connection.is_connected(),
                        self.scheduler.score_offset(),
                    );
                }
            }

            // (b) Auth invalid: suspend both sides until re-authenticated.
            if !self.auth_valid {
                self.connection.stop().await;
                realtime_started = false;
                let result = tokio::select! {
                    res = self.reauth.reauthenticate() => Some(res),
                    _ = shutdown.changed() => None,
                };
                match result {
                    Some(Ok(bearer)) => {
                        info!("re-authentication succeeded");
                        self.bearer = bearer;
                        self.auth_valid = true;
                        self.scheduler.force_immediate();
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "re-authentication failed");
                        tokio::select! {
                            _ = tokio::time::sleep(self.config.reauth_retry) => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                    None => {}
                }
                continue;
            }

            // (c) Poll when due. Consuming the wake signal is atomic with
            // the decision to fetch: a signal arriving during the fetch
            // stays pending for the next iteration.
            let now = Utc::now();
            if self.scheduler.due(now, self.wake.is_set()) {
                if self.wake.take() {
                    info!("push-triggered score refresh");
                }
                self.scheduler.begin_fetch();
                let outcome = self.source.fetch_scores().await;
                let effect = self.scheduler.record(&outcome, Utc::now());

                match &outcome {
                    FetchOutcome::Success(snap) => {
                        last_scores = Some(snap.clone());
                        // Re-check ownership: a timer may have started
                        // while the fetch was in flight.
                        if self.timer.phase() == TimerPhase::Inactive {
                            self.display.render_scores(
                                &snap.patrols,
                                self.scheduler.rate_limit_state(),
                                self.connection.is_connected(),
                                self.scheduler.score_offset(),
                            );
                        }
                        if !realtime_started {
                            if let Some(url) = &self.config.realtime_url {
                                self.connection.start(
                                    url.clone(),
                                    self.bearer.clone(),
                                    handler.clone(),
                                );
                                realtime_started = true;
                            }
                        }
                    }
                    FetchOutcome::Failure(f) => {
                        warn!(failure = %f, "score fetch failed");
                    }
                }

                if effect.auth_invalidated {
                    self.auth_valid = false;
                }
                if let Some(grace) = effect.grace {
                    tokio::select! {
                        _ = tokio::time::sleep(grace) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                continue;
            }

            // Idle: wait for a wake signal, the schedule, or shutdown,
            // capped so all three are noticed promptly.
            tokio::select! {
                _ = self.wake.wait(self.config.loop_tick) => {}
                _ = shutdown.changed() => {}
            }
        }

        info!("orchestrator stopping");
        self.timer.shutdown().await;
        self.connection.stop().await;
        info!("orchestrator stopped");
    }
}
