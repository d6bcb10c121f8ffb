//! Lifecycle orchestration of the supervised game server.
//!
//! `Orchestrator` owns the run state (lifecycle phase, idle counter, shown
//! player count) and drives the four collaborators through one sequential
//! state machine:
//!
//! ```text
//! Starting --ready--> Online --idle--> IdleWarning --confirm--> Closing --> Closed
//!    |                  ^                  |
//!    |                  +-----cancel-------+
//!    +--exhausted--> FailedStart --> restart
//! ```

mod error;
mod phases;

pub use error::OrchestratorError;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::TimingConfig;
use crate::drain::SessionDrainer;
use crate::instance::{InstanceController, InstanceError};
use crate::lifecycle::{GraceVerdict, IdleCounter, LifecycleState, RunOutcome};
use crate::notify::{Notifier, NotifyError, ServerDetails, StatusMessage};
use crate::poll::WaitOutcome;
use crate::probe::ActivityProbe;

/// Summary of a finished run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub final_state: LifecycleState,
    pub outcome: RunOutcome,
    /// Notification calls that failed along the way, in order
    #[serde(serialize_with = "serialize_failures")]
    pub notification_failures: Vec<NotifyError>,
}

fn serialize_failures<S>(failures: &[NotifyError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(failures.iter().map(|e| e.to_string()))
}

pub struct Orchestrator<P, N, I, D> {
    probe: P,
    notifier: N,
    instance: I,
    drainer: D,
    timing: TimingConfig,
    details: ServerDetails,

    state: LifecycleState,
    idle: IdleCounter,
    /// Player count shown on the status message
    last_count: u32,
    online_since: DateTime<Utc>,
    notify_failures: Vec<NotifyError>,
    outcome: Option<RunOutcome>,
}

impl<P, N, I, D> Orchestrator<P, N, I, D>
where
    P: ActivityProbe + Sync,
    N: Notifier + Send,
    I: InstanceController + Sync,
    D: SessionDrainer + Sync,
{
    pub fn new(
        probe: P,
        notifier: N,
        instance: I,
        drainer: D,
        timing: TimingConfig,
        details: ServerDetails,
    ) -> Self {
        Self {
            probe,
            notifier,
            instance,
            drainer,
            timing,
            details,
            state: LifecycleState::Starting,
            idle: IdleCounter::new(),
            last_count: 0,
            online_since: Utc::now(),
            notify_failures: Vec::new(),
            outcome: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn idle_ticks(&self) -> u32 {
        self.idle.ticks()
    }

    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    pub fn notification_failures(&self) -> &[NotifyError] {
        &self.notify_failures
    }

    /// Announce the start, then step until the run has ended
    pub async fn run(&mut self) -> Result<RunReport, OrchestratorError> {
        info!(address = %self.details.address, "Supervising server");
        if self.state == LifecycleState::Starting {
            let message = StatusMessage::starting(&self.details, Utc::now());
            self.publish(message).await;
        }

        let outcome = loop {
            if let Some(outcome) = self.outcome {
                break outcome;
            }
            self.step().await?;
        };

        info!(state = %self.state, ?outcome, "Run finished");
        Ok(RunReport {
            final_state: self.state,
            outcome,
            notification_failures: std::mem::take(&mut self.notify_failures),
        })
    }

    /// Perform exactly one transition from the current state.
    ///
    /// From `FailedStart` this waits out the delay and requests the restart;
    /// once the run has ended it returns the final state without doing anything.
    pub async fn step(&mut self) -> Result<LifecycleState, OrchestratorError> {
        if self.outcome.is_some() {
            return Ok(self.state);
        }

        match self.state {
            LifecycleState::Starting => match self.wait_for_startup().await {
                WaitOutcome::Ready { attempts } => {
                    info!(attempts, "Server is reachable");
                    self.enter_online(0);
                    let message = StatusMessage::running(&self.details, self.online_since, Some(0));
                    self.publish(message).await;
                    self.transition(LifecycleState::Online);
                }
                WaitOutcome::Exhausted { attempts } => {
                    warn!(attempts, "Server did not become reachable in time");
                    let message = StatusMessage::restarting(&self.details, Utc::now());
                    self.publish(message).await;
                    self.transition(LifecycleState::FailedStart);
                }
            },
            LifecycleState::Online => {
                self.monitor_idle().await;
                info!(idle_ticks = self.idle.ticks(), "Server idle, opening last call");
                let window = self.timing.grace_budget().total();
                let message = StatusMessage::ending(&self.details, Utc::now(), window);
                self.publish(message).await;
                self.transition(LifecycleState::IdleWarning);
            }
            LifecycleState::IdleWarning => match self.last_call().await {
                GraceVerdict::Cancel { players, sample } => {
                    info!(players, sample, "Player joined, shutdown postponed");
                    self.idle.reset();
                    self.last_count = players;
                    let message = StatusMessage::postponed(&self.details, self.online_since, players);
                    self.publish(message).await;
                    self.transition(LifecycleState::Online);
                    tokio::time::sleep(self.timing.postpone_delay).await;
                }
                GraceVerdict::Confirm => {
                    info!("No players during last call, closing");
                    let message = StatusMessage::closed(&self.details, Utc::now());
                    self.publish(message).await;
                    self.transition(LifecycleState::Closing);
                }
            },
            LifecycleState::Closing => {
                self.drain_sessions().await;
                self.power(RunOutcome::PoweredOff).await?;
                self.transition(LifecycleState::Closed);
            }
            LifecycleState::FailedStart => {
                tokio::time::sleep(self.timing.failed_start_delay).await;
                self.power(RunOutcome::RestartRequested).await?;
            }
            LifecycleState::Closed => {}
        }

        Ok(self.state)
    }

    fn transition(&mut self, to: LifecycleState) {
        info!(from = %self.state, to = %to, "Lifecycle transition");
        self.state = to;
    }

    fn enter_online(&mut self, players: u32) {
        self.idle.reset();
        self.last_count = players;
        self.online_since = Utc::now();
    }

    /// Issue the instance action that ends the run
    async fn power(&mut self, outcome: RunOutcome) -> Result<(), OrchestratorError> {
        let result = match outcome {
            RunOutcome::PoweredOff => self.instance.shutdown().await,
            RunOutcome::RestartRequested => self.instance.restart().await,
        };

        if let Err(e) = result {
            self.report_fatal(&e).await;
            return Err(e.into());
        }
        self.outcome = Some(outcome);
        Ok(())
    }

    async fn report_fatal(&mut self, e: &InstanceError) {
        error!("Instance action failed: {}", e);
        let message = StatusMessage::error(&self.details, &e.to_string());
        self.publish(message).await;
    }

    // ========================================================================
    // Notification
    // ========================================================================

    /// Replace the status message, recording rather than propagating failure
    async fn publish(&mut self, message: StatusMessage) {
        if let Err(e) = self.notifier.replace(&message).await {
            self.record_failure(e);
        }
    }

    /// Show a new player count on the current status message
    async fn refresh_count(&mut self, players: u32) {
        let message = StatusMessage::running(&self.details, self.online_since, Some(players));

        // Nothing live to edit: the last replace failed or the message was deleted
        if self.notifier.outstanding().is_none() {
            self.publish(message).await;
            return;
        }

        match self.notifier.edit(&message).await {
            Ok(()) => {}
            Err(e @ NotifyError::Gone(_)) => {
                self.record_failure(e);
                self.publish(message).await;
            }
            Err(e) => self.record_failure(e),
        }
    }

    fn record_failure(&mut self, e: NotifyError) {
        warn!(state = %self.state, "Status notification failed: {}", e);
        self.notify_failures.push(e);
    }
}
