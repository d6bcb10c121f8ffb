//! Scripted collaborators for driving the orchestrator under test
//!
//! Every fake is `Clone`; clones share state through `Arc<Mutex<_>>` so a
//! test keeps one handle for inspection while the orchestrator owns another.
//! Locks are never held across an await.

use lastcall_daemon::drain::{DrainError, SessionDrainer, SessionRef};
use lastcall_daemon::instance::{InstanceController, InstanceError};
use lastcall_daemon::notify::{MessageRef, MessageTransport, NotifyError, StatusBoard, StatusMessage};
use lastcall_daemon::poll::Probe;
use lastcall_daemon::probe::ActivityProbe;
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::time::Instant;

// ============================================================================
// ActivityProbe
// ============================================================================

#[derive(Debug, Default)]
struct ProbeScript {
    reachable: VecDeque<Probe<bool>>,
    reachable_fallback: Option<Probe<bool>>,
    players: VecDeque<Probe<u32>>,
    players_fallback: Option<Probe<u32>>,
    reachability_checks: u32,
    player_samples: u32,
}

/// Probe answering from scripted queues.
///
/// Once a queue is drained the fallback is returned: `Unknown` for
/// reachability and `Observed(0)` for player counts unless overridden.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    script: Arc<Mutex<ProbeScript>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unreachable until attempt `attempt` (1-based), reachable from then on
    pub fn reachable_on(self, attempt: u32) -> Self {
        {
            let mut script = self.script.lock();
            script.reachable.clear();
            script
                .reachable
                .extend((1..attempt).map(|_| Probe::Observed(false)));
            script.reachable_fallback = Some(Probe::Observed(true));
        }
        self
    }

    pub fn never_reachable(self) -> Self {
        {
            let mut script = self.script.lock();
            script.reachable.clear();
            script.reachable_fallback = Some(Probe::Unknown);
        }
        self
    }

    pub fn with_reachability(self, samples: impl IntoIterator<Item = Probe<bool>>) -> Self {
        self.script.lock().reachable.extend(samples);
        self
    }

    /// Queue observed player counts
    pub fn with_players(self, counts: impl IntoIterator<Item = u32>) -> Self {
        self.script
            .lock()
            .players
            .extend(counts.into_iter().map(Probe::Observed));
        self
    }

    /// Queue raw player samples, including `Unknown`
    pub fn with_player_samples(self, samples: impl IntoIterator<Item = Probe<u32>>) -> Self {
        self.script.lock().players.extend(samples);
        self
    }

    /// Sample returned once the player queue is drained
    pub fn then_players(self, fallback: Probe<u32>) -> Self {
        self.script.lock().players_fallback = Some(fallback);
        self
    }

    pub fn reachability_checks(&self) -> u32 {
        self.script.lock().reachability_checks
    }

    pub fn player_samples(&self) -> u32 {
        self.script.lock().player_samples
    }

    /// Player samples still queued
    pub fn pending_player_samples(&self) -> usize {
        self.script.lock().players.len()
    }
}

impl ActivityProbe for ScriptedProbe {
    async fn is_reachable(&self) -> Probe<bool> {
        let mut script = self.script.lock();
        script.reachability_checks += 1;
        let fallback = script.reachable_fallback.unwrap_or(Probe::Unknown);
        script.reachable.pop_front().unwrap_or(fallback)
    }

    async fn sample_player_count(&self) -> Probe<u32> {
        let mut script = self.script.lock();
        script.player_samples += 1;
        let fallback = script.players_fallback.unwrap_or(Probe::Observed(0));
        script.players.pop_front().unwrap_or(fallback)
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Raw transport call seen by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Post { id: MessageRef, message: StatusMessage },
    PostFailed { message: StatusMessage },
    Patch { id: MessageRef, message: StatusMessage },
    PatchFailed { id: MessageRef, message: StatusMessage },
    Delete { id: MessageRef },
}

impl TransportCall {
    /// Content line of the message carried by this call, if any
    pub fn content(&self) -> Option<&str> {
        match self {
            TransportCall::Post { message, .. }
            | TransportCall::PostFailed { message }
            | TransportCall::Patch { message, .. }
            | TransportCall::PatchFailed { message, .. } => Some(message.content.as_str()),
            TransportCall::Delete { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct TransportState {
    calls: Vec<TransportCall>,
    live: BTreeSet<String>,
    max_live: usize,
    next_id: u64,
    fail_posts: bool,
    fail_patches: bool,
    fail_deletes: bool,
}

/// In-memory message endpoint that tracks which messages are still live
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<TransportState>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_posts(&self, fail: bool) {
        self.state.lock().fail_posts = fail;
    }

    pub fn fail_patches(&self, fail: bool) {
        self.state.lock().fail_patches = fail;
    }

    /// Remove a live message behind the notifier's back, as a moderator would
    pub fn delete_by_hand(&self, id: &MessageRef) {
        self.state.lock().live.remove(id.as_str());
    }

    /// Id of the most recent successful post
    pub fn last_posted_id(&self) -> Option<MessageRef> {
        self.calls().into_iter().rev().find_map(|call| match call {
            TransportCall::Post { id, .. } => Some(id),
            _ => None,
        })
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().fail_deletes = fail;
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.state.lock().calls.clone()
    }

    /// Content lines of successful posts, in order
    pub fn posted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Post { message, .. } => Some(message.content),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<StatusMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Patch { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Messages posted and not yet deleted
    pub fn live_messages(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Highest number of simultaneously live messages ever observed
    pub fn max_live_messages(&self) -> usize {
        self.state.lock().max_live
    }
}

impl MessageTransport for RecordingTransport {
    async fn post(&self, message: &StatusMessage) -> Result<MessageRef, NotifyError> {
        let mut state = self.state.lock();
        if state.fail_posts {
            state.calls.push(TransportCall::PostFailed {
                message: message.clone(),
            });
            return Err(NotifyError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        state.next_id += 1;
        let id = MessageRef::new(state.next_id.to_string());
        state.live.insert(id.to_string());
        state.max_live = state.max_live.max(state.live.len());
        state.calls.push(TransportCall::Post {
            id: id.clone(),
            message: message.clone(),
        });
        Ok(id)
    }

    async fn patch(&self, id: &MessageRef, message: &StatusMessage) -> Result<(), NotifyError> {
        let mut state = self.state.lock();
        if !state.live.contains(id.as_str()) {
            state.calls.push(TransportCall::PatchFailed {
                id: id.clone(),
                message: message.clone(),
            });
            return Err(NotifyError::Gone(id.clone()));
        }
        if state.fail_patches {
            state.calls.push(TransportCall::PatchFailed {
                id: id.clone(),
                message: message.clone(),
            });
            return Err(NotifyError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        state.calls.push(TransportCall::Patch {
            id: id.clone(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn delete(&self, id: &MessageRef) -> Result<(), NotifyError> {
        let mut state = self.state.lock();
        state.calls.push(TransportCall::Delete { id: id.clone() });
        if state.fail_deletes {
            return Err(NotifyError::Transport("connection reset".to_string()));
        }
        state.live.remove(id.as_str());
        Ok(())
    }
}

/// The real status board protocol over a recording transport
pub type RecordingNotifier = StatusBoard<RecordingTransport>;

// ============================================================================
// InstanceController
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceAction {
    Restart,
    Shutdown,
}

impl InstanceAction {
    fn as_str(&self) -> &'static str {
        match self {
            InstanceAction::Restart => "restart",
            InstanceAction::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    calls: Vec<(InstanceAction, Instant)>,
    fail: bool,
}

/// Records instance actions and when they happened
#[derive(Debug, Clone, Default)]
pub struct RecordingController {
    state: Arc<Mutex<ControllerState>>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every action fail with a non-zero exit
    pub fn failing(self) -> Self {
        self.state.lock().fail = true;
        self
    }

    pub fn actions(&self) -> Vec<InstanceAction> {
        self.state.lock().calls.iter().map(|(action, _)| *action).collect()
    }

    pub fn count(&self, action: InstanceAction) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(a, _)| *a == action)
            .count()
    }

    /// When `action` was first requested
    pub fn first_at(&self, action: InstanceAction) -> Option<Instant> {
        self.state
            .lock()
            .calls
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, at)| *at)
    }

    fn act(&self, action: InstanceAction) -> Result<(), InstanceError> {
        let mut state = self.state.lock();
        state.calls.push((action, Instant::now()));
        if state.fail {
            return Err(InstanceError::Failed {
                action: action.as_str(),
                status: "exit status: 1".to_string(),
                stderr: "NotAuthorizedOrNotFound".to_string(),
            });
        }
        Ok(())
    }
}

impl InstanceController for RecordingController {
    async fn restart(&self) -> Result<(), InstanceError> {
        self.act(InstanceAction::Restart)
    }

    async fn shutdown(&self) -> Result<(), InstanceError> {
        self.act(InstanceAction::Shutdown)
    }
}

// ============================================================================
// SessionDrainer
// ============================================================================

#[derive(Debug, Default)]
struct DrainState {
    rounds: VecDeque<Probe<usize>>,
    polls: u32,
    signals: Vec<SessionRef>,
    fail_signals: bool,
}

/// Reports a scripted number of sessions per poll; zero once the script ends
#[derive(Debug, Clone, Default)]
pub struct ScriptedDrainer {
    state: Arc<Mutex<DrainState>>,
}

impl ScriptedDrainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session counts reported by successive polls
    pub fn with_sessions(self, counts: impl IntoIterator<Item = usize>) -> Self {
        self.state
            .lock()
            .rounds
            .extend(counts.into_iter().map(Probe::Observed));
        self
    }

    pub fn with_rounds(self, rounds: impl IntoIterator<Item = Probe<usize>>) -> Self {
        self.state.lock().rounds.extend(rounds);
        self
    }

    pub fn failing_signals(self) -> Self {
        self.state.lock().fail_signals = true;
        self
    }

    pub fn polls(&self) -> u32 {
        self.state.lock().polls
    }

    pub fn signals(&self) -> Vec<SessionRef> {
        self.state.lock().signals.clone()
    }
}

impl SessionDrainer for ScriptedDrainer {
    async fn active_sessions(&self) -> Probe<Vec<SessionRef>> {
        let mut state = self.state.lock();
        state.polls += 1;
        let round = state.rounds.pop_front().unwrap_or(Probe::Observed(0));
        round.map(|count| {
            (0..count)
                .map(|i| SessionRef::new(format!("${}", i), "MC_SERVER_RUNNING"))
                .collect()
        })
    }

    async fn signal_stop(&self, session: &SessionRef) -> Result<(), DrainError> {
        let mut state = self.state.lock();
        state.signals.push(session.clone());
        if state.fail_signals {
            return Err(DrainError::Failed {
                command: format!("tmux send-keys -t {}", session.id),
                stderr: "can't find pane".to_string(),
            });
        }
        Ok(())
    }
}
