pub mod config;
pub mod drain;
pub mod env;
pub mod errors;
pub mod instance;
pub mod lifecycle;
pub mod notify;
pub mod orchestrator;
pub mod poll;
pub mod probe;

use config::LastcallConfig;
use drain::TmuxDrainer;
use instance::CommandController;
use notify::{NotifyError, ServerDetails, StatusBoard, WebhookTransport};
use orchestrator::Orchestrator;
use probe::MinecraftProbe;

/// Orchestrator wired to the production backends
pub type Supervisor =
    Orchestrator<MinecraftProbe, StatusBoard<WebhookTransport>, CommandController, TmuxDrainer>;

/// Text shown on status messages for this configuration
pub fn server_details(config: &LastcallConfig) -> ServerDetails {
    let details = ServerDetails::new(config.server.display_address());
    match &config.notify.footer {
        Some(footer) => details.with_footer(footer.clone()),
        None => details,
    }
}

pub fn build_supervisor(config: &LastcallConfig) -> Result<Supervisor, NotifyError> {
    let transport = WebhookTransport::new(&config.notify)?;

    Ok(Orchestrator::new(
        MinecraftProbe::new(&config.server),
        StatusBoard::new(transport),
        CommandController::new(&config.instance),
        TmuxDrainer::new(&config.drain),
        config.timing.clone(),
        server_details(config),
    ))
}
