use super::*;

#[test]
fn test_defaults_match_production() {
    assert_eq!(TestTimingBuilder::new().build(), TimingConfig::default());
}

#[test]
fn test_idle_threshold_in_samples() {
    let timing = TestTimingBuilder::new().with_idle_threshold(3).build();
    assert_eq!(timing.idle_threshold(), 3);
}

#[test]
fn test_startup_budget() {
    let timing = TestTimingBuilder::new()
        .with_startup(10, Duration::from_secs(15))
        .build();
    assert_eq!(timing.startup_budget().max_attempts(), 40);

    let timing = TestTimingBuilder::new()
        .with_startup(1, Duration::from_secs(20))
        .build();
    assert_eq!(timing.startup_budget().max_attempts(), 3);
}

#[test]
fn test_grace_and_delays() {
    let timing = TestTimingBuilder::new()
        .with_grace(4, Duration::from_secs(2))
        .with_drain(Duration::from_secs(10), Duration::from_secs(30))
        .with_failed_start_delay(Duration::from_secs(5))
        .with_postpone_delay(Duration::ZERO)
        .build();

    assert_eq!(timing.grace_budget().total(), Duration::from_secs(8));
    assert_eq!(timing.drain_settle_delay, Duration::from_secs(30));
    assert_eq!(timing.failed_start_delay, Duration::from_secs(5));
    assert!(timing.postpone_delay.is_zero());
}
