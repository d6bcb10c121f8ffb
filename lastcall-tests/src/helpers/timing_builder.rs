//! Programmatic timing creation with builder pattern

use lastcall_daemon::config::TimingConfig;
use std::time::Duration;

/// Builder for lifecycle timing in tests.
///
/// Starts from the production defaults; idle thresholds are expressed in
/// samples rather than minutes.
pub struct TestTimingBuilder {
    timing: TimingConfig,
}

impl Default for TestTimingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTimingBuilder {
    pub fn new() -> Self {
        Self {
            timing: TimingConfig::default(),
        }
    }

    /// Startup wait of `minutes` probed every `interval`
    pub fn with_startup(mut self, minutes: u64, interval: Duration) -> Self {
        self.timing.max_start_wait_minutes = minutes;
        self.timing.startup_poll_interval = interval;
        self
    }

    /// Idle threshold of `samples` one-minute samples
    pub fn with_idle_threshold(mut self, samples: u64) -> Self {
        self.timing.idle_poll_interval = Duration::from_secs(60);
        self.timing.idle_timeout_minutes = samples;
        self
    }

    pub fn with_grace(mut self, count: u32, interval: Duration) -> Self {
        self.timing.grace_check_count = count;
        self.timing.grace_check_interval = interval;
        self
    }

    pub fn with_drain(mut self, poll_interval: Duration, settle_delay: Duration) -> Self {
        self.timing.drain_poll_interval = poll_interval;
        self.timing.drain_settle_delay = settle_delay;
        self
    }

    pub fn with_failed_start_delay(mut self, delay: Duration) -> Self {
        self.timing.failed_start_delay = delay;
        self
    }

    pub fn with_postpone_delay(mut self, delay: Duration) -> Self {
        self.timing.postpone_delay = delay;
        self
    }

    pub fn build(self) -> TimingConfig {
        self.timing
    }
}

#[cfg(test)]
mod tests;
