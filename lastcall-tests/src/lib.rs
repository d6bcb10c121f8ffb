//! Test utilities for the lastcall workspace
//!
//! Scripted stand-ins for every collaborator of the orchestrator, a timing
//! builder and a harness that wires them together.

pub mod helpers;

pub use helpers::fakes::{
    InstanceAction, RecordingController, RecordingNotifier, RecordingTransport, ScriptedDrainer,
    ScriptedProbe, TransportCall,
};
pub use helpers::scenario_harness::ScenarioHarness;
pub use helpers::timing_builder::TestTimingBuilder;
