//! The polling phases behind each transition

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::Orchestrator;
use crate::drain::SessionDrainer;
use crate::instance::InstanceController;
use crate::lifecycle::GraceVerdict;
use crate::notify::Notifier;
use crate::poll::{Probe, WaitOutcome, poll_until};
use crate::probe::ActivityProbe;

impl<P, N, I, D> Orchestrator<P, N, I, D>
where
    P: ActivityProbe + Sync,
    N: Notifier + Send,
    I: InstanceController + Sync,
    D: SessionDrainer + Sync,
{
    /// Poll reachability until the server answers or the startup budget runs out
    pub(super) async fn wait_for_startup(&self) -> WaitOutcome {
        let budget = self.timing.startup_budget();
        info!(
            max_attempts = budget.max_attempts(),
            interval = ?budget.interval(),
            "Waiting for server to start"
        );

        let probe = &self.probe;
        poll_until(budget, |attempt| async move {
            let reachable = probe.is_reachable().await;
            debug!(attempt, ?reachable, "Startup probe");
            reachable
        })
        .await
    }

    /// Sample player counts until the idle threshold is reached.
    ///
    /// Returns right after the sample that reaches the threshold.
    pub(super) async fn monitor_idle(&mut self) {
        let threshold = self.timing.idle_threshold();
        let interval = self.timing.idle_poll_interval;
        info!(threshold, ?interval, "Monitoring player activity");

        loop {
            match self.probe.sample_player_count().await {
                Probe::Observed(players) => {
                    if players != self.last_count {
                        info!(players, previous = self.last_count, "Player count changed");
                        self.last_count = players;
                        self.refresh_count(players).await;
                    }

                    self.idle.observe(players);
                    debug!(players, idle_ticks = self.idle.ticks(), "Activity sample");
                    if self.idle.reached(threshold) {
                        return;
                    }
                }
                Probe::Unknown => debug!(idle_ticks = self.idle.ticks(), "Activity sample unavailable"),
            }

            sleep(interval).await;
        }
    }

    /// Sample the grace window; the first player seen calls the shutdown off
    pub(super) async fn last_call(&self) -> GraceVerdict {
        let budget = self.timing.grace_budget();

        for sample in 1..=budget.max_attempts() {
            if let Probe::Observed(players) = self.probe.sample_player_count().await
                && players > 0
            {
                return GraceVerdict::Cancel { players, sample };
            }
            debug!(sample, "No players during last call");
            sleep(budget.interval()).await;
        }

        GraceVerdict::Confirm
    }

    /// Signal every session to stop until none remain, then wait out the settle delay
    pub(super) async fn drain_sessions(&self) {
        loop {
            match self.drainer.active_sessions().await {
                Probe::Observed(sessions) if sessions.is_empty() => break,
                Probe::Observed(sessions) => {
                    info!(sessions = sessions.len(), "Stopping active sessions");
                    for session in &sessions {
                        if let Err(e) = self.drainer.signal_stop(session).await {
                            warn!(session = %session, "Failed to signal session: {}", e);
                        }
                    }
                }
                Probe::Unknown => debug!("Session list unavailable"),
            }

            sleep(self.timing.drain_poll_interval).await;
        }

        info!(settle = ?self.timing.drain_settle_delay, "All sessions stopped");
        sleep(self.timing.drain_settle_delay).await;
    }
}
