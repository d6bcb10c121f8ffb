//! Orchestrator wired to scripted collaborators

use lastcall_daemon::config::TimingConfig;
use lastcall_daemon::notify::{ServerDetails, StatusBoard};
use lastcall_daemon::orchestrator::Orchestrator;

use super::fakes::{
    RecordingController, RecordingNotifier, RecordingTransport, ScriptedDrainer, ScriptedProbe,
};

pub type TestOrchestrator =
    Orchestrator<ScriptedProbe, RecordingNotifier, RecordingController, ScriptedDrainer>;

/// Holds inspection handles to every fake handed to the orchestrator
pub struct ScenarioHarness {
    pub probe: ScriptedProbe,
    pub transport: RecordingTransport,
    pub controller: RecordingController,
    pub drainer: ScriptedDrainer,
    pub timing: TimingConfig,
}

impl ScenarioHarness {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            probe: ScriptedProbe::new(),
            transport: RecordingTransport::new(),
            controller: RecordingController::new(),
            drainer: ScriptedDrainer::new(),
            timing,
        }
    }

    pub fn with_probe(mut self, probe: ScriptedProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_controller(mut self, controller: RecordingController) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_drainer(mut self, drainer: ScriptedDrainer) -> Self {
        self.drainer = drainer;
        self
    }

    pub fn details() -> ServerDetails {
        ServerDetails::new("play.example.com:25565")
    }

    pub fn orchestrator(&self) -> TestOrchestrator {
        Orchestrator::new(
            self.probe.clone(),
            StatusBoard::new(self.transport.clone()),
            self.controller.clone(),
            self.drainer.clone(),
            self.timing.clone(),
            Self::details(),
        )
    }
}
