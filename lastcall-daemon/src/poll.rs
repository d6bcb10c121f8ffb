//! Polling primitives shared by the lifecycle phases
//!
//! - `Probe<T>` - three-valued query result (`Observed` or `Unknown`)
//! - `PollBudget` - bounded attempt count with a fixed interval
//! - `poll_until` - time-boxed wait that reports exhaustion as an outcome

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Result of querying an external process.
///
/// `Unknown` stands for a transient failure: the query could not be answered
/// this tick, which is neither a positive nor a negative observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe<T> {
    Observed(T),
    Unknown,
}

impl<T> Probe<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Probe<U> {
        match self {
            Probe::Observed(value) => Probe::Observed(f(value)),
            Probe::Unknown => Probe::Unknown,
        }
    }
}

/// A bounded number of attempts spaced by a fixed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    max_attempts: u32,
    interval: Duration,
}

impl PollBudget {
    /// At least one attempt is always allowed.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Budget whose attempts span `total` at the given interval (rounded up)
    pub fn covering(total: Duration, interval: Duration) -> Self {
        let interval_ms = interval.as_millis().max(1);
        let attempts = total.as_millis().div_ceil(interval_ms);
        Self::new(u32::try_from(attempts).unwrap_or(u32::MAX), interval)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on the time spent sleeping across all attempts
    pub fn total(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }
}

/// How a time-boxed wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The check passed on attempt `attempts`
    Ready { attempts: u32 },
    /// Every attempt was used without the check passing
    Exhausted { attempts: u32 },
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, WaitOutcome::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Ready { attempts } | WaitOutcome::Exhausted { attempts } => *attempts,
        }
    }
}

/// Run `check` until it observes `true` or the budget is spent.
///
/// `Unknown` and `Observed(false)` both mean "not yet". The interval is slept
/// between attempts only, so an exhausted wait makes exactly
/// `budget.max_attempts()` checks.
pub async fn poll_until<F, Fut>(budget: PollBudget, mut check: F) -> WaitOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Probe<bool>>,
{
    for attempt in 1..=budget.max_attempts() {
        match check(attempt).await {
            Probe::Observed(true) => return WaitOutcome::Ready { attempts: attempt },
            Probe::Observed(false) => debug!(attempt, "Check not satisfied yet"),
            Probe::Unknown => debug!(attempt, "Check returned no signal"),
        }

        if attempt < budget.max_attempts() {
            sleep(budget.interval()).await;
        }
    }

    WaitOutcome::Exhausted {
        attempts: budget.max_attempts(),
    }
}
