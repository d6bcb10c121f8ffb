//! Lifecycle state of the supervised server

use serde::Serialize;

/// Phase of the supervised server's life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Waiting for the server to answer probes
    Starting,
    /// Reachable; player activity is being sampled
    Online,
    /// Idle threshold reached; the last-call window is open
    IdleWarning,
    /// Shutdown confirmed; sessions are being drained
    Closing,
    /// Instance shutdown requested
    Closed,
    /// Server never became reachable
    FailedStart,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Online => "online",
            LifecycleState::IdleWarning => "idle_warning",
            LifecycleState::Closing => "closing",
            LifecycleState::Closed => "closed",
            LifecycleState::FailedStart => "failed_start",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Consecutive idle samples observed while online
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdleCounter(u32);

impl IdleCounter {
    pub fn new() -> Self {
        Self(0)
    }

    /// Fold one observed player count into the counter
    pub fn observe(&mut self, players: u32) {
        if players > 0 {
            self.reset();
        } else {
            self.0 = self.0.saturating_add(1);
        }
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    pub fn ticks(&self) -> u32 {
        self.0
    }

    pub fn reached(&self, threshold: u32) -> bool {
        self.0 >= threshold
    }
}

/// Result of the last-call window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceVerdict {
    /// A player showed up on sample `sample` (1-based)
    Cancel { players: u32, sample: u32 },
    /// No sample saw a player
    Confirm,
}

/// How a finished run left the instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Sessions drained and the instance was shut down
    PoweredOff,
    /// The server never came up and an instance restart was requested
    RestartRequested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_counter_counts_trailing_zero_samples() {
        let mut counter = IdleCounter::new();
        for players in [0, 0, 3, 0, 0, 0] {
            counter.observe(players);
        }
        assert_eq!(counter.ticks(), 3);
        assert!(counter.reached(3));
        assert!(!counter.reached(4));
    }

    #[test]
    fn test_idle_counter_resets_on_activity() {
        let mut counter = IdleCounter::new();
        counter.observe(0);
        counter.observe(0);
        counter.observe(1);
        assert_eq!(counter.ticks(), 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::IdleWarning.to_string(), "idle_warning");
        assert_eq!(LifecycleState::FailedStart.to_string(), "failed_start");
    }
}
