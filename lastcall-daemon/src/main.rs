use anyhow::{Context, Result};
use clap::Parser;
use lastcall_daemon::config::{LastcallConfig, format_duration};
use lastcall_daemon::env::{DEFAULT_ENV_FILE, load_env_file, merge_env};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// lastcall - start-to-poweroff supervisor for an on-demand game server
#[derive(Parser)]
#[command(name = "lastcall", version, about = "Supervise an on-demand game server until it goes idle")]
struct Args {
    /// Config file (default: lastcall.yaml in the working directory or a parent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dotenv file with LASTCALL_* settings (default: .env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn load_env(env_file: Option<PathBuf>) -> Result<HashMap<String, String>> {
    let file_vars = match env_file {
        Some(path) => load_env_file(&path)?,
        None => {
            let default = PathBuf::from(DEFAULT_ENV_FILE);
            if default.exists() {
                load_env_file(&default)?
            } else {
                HashMap::new()
            }
        }
    };
    Ok(merge_env(file_vars, std::env::vars()))
}

fn load_config(args: &Args, env: &HashMap<String, String>) -> Result<LastcallConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => {
            let cwd = std::env::current_dir().context("Cannot determine working directory")?;
            LastcallConfig::find_config_file(&cwd)
        }
    };

    match &path {
        Some(path) => info!("Using config file {}", path.display()),
        None => warn!("No config file found, using defaults and environment"),
    }
    Ok(LastcallConfig::load(path.as_deref(), env)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let env = load_env(args.env_file.clone())?;
    let config = load_config(&args, &env)?;

    let timing = &config.timing;
    info!(
        startup_attempts = timing.startup_budget().max_attempts(),
        startup_interval = %format_duration(&timing.startup_poll_interval),
        idle_threshold = timing.idle_threshold(),
        idle_interval = %format_duration(&timing.idle_poll_interval),
        grace_samples = timing.grace_check_count,
        "Configuration loaded"
    );

    if args.check {
        println!("Configuration OK");
        return Ok(());
    }

    let mut supervisor =
        lastcall_daemon::build_supervisor(&config).context("Failed to set up status notifications")?;
    let report = supervisor.run().await?;

    if !report.notification_failures.is_empty() {
        warn!(
            failures = report.notification_failures.len(),
            "Some status notifications could not be delivered"
        );
    }
    info!(
        state = %report.final_state,
        outcome = ?report.outcome,
        "lastcall finished"
    );
    Ok(())
}
