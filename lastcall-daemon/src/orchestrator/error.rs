//! Error types for the lifecycle orchestrator

use crate::instance::InstanceError;

/// Conditions that end a run early.
///
/// Probe, drain and notification failures are absorbed by the orchestrator;
/// only instance power actions are fatal.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Instance action failed: {0}")]
    Instance(#[from] InstanceError),
}
