//! End-to-end lifecycle scenarios against scripted collaborators

use lastcall_daemon::lifecycle::{LifecycleState, RunOutcome};
use lastcall_tests::{
    InstanceAction, RecordingController, ScenarioHarness, ScriptedDrainer, ScriptedProbe,
    TestTimingBuilder,
};
use std::time::Duration;
use tokio::time::Instant;

const RUNNING: &str = "@everyone Server is up!";
const ENDING: &str = "Server Closing Soon!";
const POSTPONED: &str = "Server up!";
const CLOSED: &str = "Server Closed.";

// ============================================================================
// Scenario A: startup succeeds
// ============================================================================

/// Reachable on attempt 3 of 40: online after two sleeps with one replace
#[tokio::test(start_paused = true)]
async fn test_scenario_a_reachable_on_third_attempt() {
    let harness = ScenarioHarness::new(TestTimingBuilder::new().build())
        .with_probe(ScriptedProbe::new().reachable_on(3));
    assert_eq!(harness.timing.startup_budget().max_attempts(), 40);

    let mut orch = harness.orchestrator();
    let started = Instant::now();

    assert_eq!(orch.step().await.unwrap(), LifecycleState::Online);

    assert_eq!(harness.probe.reachability_checks(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
    assert_eq!(harness.transport.posted(), vec![RUNNING]);
    assert_eq!(orch.idle_ticks(), 0);
}

// ============================================================================
// Scenario B: startup never succeeds
// ============================================================================

/// Never reachable: FailedStart, one restart after the delay, no shutdown
#[tokio::test(start_paused = true)]
async fn test_scenario_b_never_reachable() {
    let harness = ScenarioHarness::new(TestTimingBuilder::new().build())
        .with_probe(ScriptedProbe::new().never_reachable());
    let mut orch = harness.orchestrator();
    let started = Instant::now();

    let report = orch.run().await.unwrap();

    assert_eq!(report.final_state, LifecycleState::FailedStart);
    assert_eq!(report.outcome, RunOutcome::RestartRequested);
    assert_eq!(harness.probe.reachability_checks(), 40);
    assert_eq!(harness.controller.actions(), vec![InstanceAction::Restart]);
    assert_eq!(harness.controller.count(InstanceAction::Shutdown), 0);

    // 39 sleeps between 40 probes, then the failed-start delay
    let restarted = harness.controller.first_at(InstanceAction::Restart).unwrap();
    assert_eq!(restarted - started, Duration::from_secs(39 * 15 + 60));

    assert_eq!(
        harness.transport.posted(),
        vec!["Machine started, starting server!", "Server failed to start."]
    );
    assert_eq!(harness.transport.live_messages(), 1);
}

// ============================================================================
// Scenario C: idle threshold reached
// ============================================================================

/// Threshold 3 with samples [0, 0, 0]: warning right after the third sample
#[tokio::test(start_paused = true)]
async fn test_scenario_c_idle_threshold() {
    let harness = ScenarioHarness::new(TestTimingBuilder::new().with_idle_threshold(3).build())
        .with_probe(ScriptedProbe::new().reachable_on(1).with_players([0, 0, 0]));
    let mut orch = harness.orchestrator();
    orch.step().await.unwrap();
    let posts_before = harness.transport.posted().len();
    let started = Instant::now();

    assert_eq!(orch.step().await.unwrap(), LifecycleState::IdleWarning);

    assert_eq!(harness.probe.player_samples(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(120));
    assert_eq!(orch.idle_ticks(), 3);
    assert_eq!(harness.transport.posted().len(), posts_before + 1);
    assert_eq!(harness.transport.posted().last().unwrap(), ENDING);
    assert!(harness.transport.edits().is_empty());
}

// ============================================================================
// Scenario D: last call cancelled
// ============================================================================

/// Grace samples [0, 0, 5, ...]: cancel at sample 3, back online
#[tokio::test(start_paused = true)]
async fn test_scenario_d_grace_cancelled() {
    let probe = ScriptedProbe::new()
        .reachable_on(1)
        .with_players([0, 0, 0])
        .with_players([0, 0, 5, 0, 0]);
    let harness =
        ScenarioHarness::new(TestTimingBuilder::new().with_idle_threshold(3).build()).with_probe(probe);
    let mut orch = harness.orchestrator();
    orch.step().await.unwrap();
    orch.step().await.unwrap();
    assert_eq!(orch.state(), LifecycleState::IdleWarning);
    let posts_before = harness.transport.posted().len();

    assert_eq!(orch.step().await.unwrap(), LifecycleState::Online);

    assert_eq!(orch.idle_ticks(), 0);
    assert_eq!(harness.probe.player_samples(), 6);
    assert_eq!(harness.probe.pending_player_samples(), 2);
    assert_eq!(harness.transport.posted().len(), posts_before + 1);
    assert_eq!(harness.transport.posted().last().unwrap(), POSTPONED);
    assert!(harness.controller.actions().is_empty());

    // the postponed count is the new baseline: the next zero is an edit
    orch.step().await.unwrap();
    let edits = harness.transport.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].embed.fields[1].value, "`0` Players Online");
}

// ============================================================================
// Scenario E: shutdown confirmed and drained
// ============================================================================

/// All-zero grace, drain [2, 1, 0]: two signal rounds then one shutdown
#[tokio::test(start_paused = true)]
async fn test_scenario_e_drain_and_shutdown() {
    let harness = ScenarioHarness::new(TestTimingBuilder::new().with_idle_threshold(3).build())
        .with_probe(ScriptedProbe::new().reachable_on(1))
        .with_drainer(ScriptedDrainer::new().with_sessions([2, 1, 0]));
    let mut orch = harness.orchestrator();
    for expected in [LifecycleState::Online, LifecycleState::IdleWarning, LifecycleState::Closing] {
        assert_eq!(orch.step().await.unwrap(), expected);
    }
    assert_eq!(harness.transport.posted().last().unwrap(), CLOSED);
    let closing_at = Instant::now();

    assert_eq!(orch.step().await.unwrap(), LifecycleState::Closed);

    assert_eq!(harness.drainer.polls(), 3);
    assert_eq!(harness.drainer.signals().len(), 3);
    assert_eq!(harness.controller.actions(), vec![InstanceAction::Shutdown]);
    let shutdown_at = harness.controller.first_at(InstanceAction::Shutdown).unwrap();
    assert_eq!(shutdown_at - closing_at, Duration::from_secs(2 * 60 + 60));
    assert_eq!(orch.outcome(), Some(RunOutcome::PoweredOff));
}

/// The whole happy path through `run()`
#[tokio::test(start_paused = true)]
async fn test_full_run_powers_off() {
    let harness = ScenarioHarness::new(TestTimingBuilder::new().with_idle_threshold(2).build())
        .with_probe(ScriptedProbe::new().reachable_on(2).with_players([1, 0, 0]))
        .with_drainer(ScriptedDrainer::new().with_sessions([1, 0]))
        .with_controller(RecordingController::new());
    let mut orch = harness.orchestrator();

    let report = orch.run().await.unwrap();

    assert_eq!(report.final_state, LifecycleState::Closed);
    assert_eq!(report.outcome, RunOutcome::PoweredOff);
    assert!(report.notification_failures.is_empty());
    assert_eq!(
        harness.transport.posted(),
        vec!["Machine started, starting server!", RUNNING, ENDING, CLOSED]
    );
    // 0 -> 1 -> 0
    assert_eq!(harness.transport.edits().len(), 2);
    assert_eq!(harness.transport.max_live_messages(), 1);
    assert_eq!(harness.controller.count(InstanceAction::Shutdown), 1);
}
