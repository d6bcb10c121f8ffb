//! Session drain: find the game's tmux sessions and ask them to stop

use std::future::Future;
use std::process::{Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::config::DrainConfig;
use crate::poll::Probe;

/// Bound on a single tmux invocation
const TMUX_TIMEOUT: Duration = Duration::from_secs(10);

/// stderr fragments tmux prints when no server (and so no session) exists
const NO_SERVER_MARKERS: [&str; 3] = ["no server running", "error connecting", "no sessions"];

#[derive(Debug, Error)]
pub enum DrainError {
    #[error("failed to run `{command}`: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    Failed { command: String, stderr: String },
}

/// One live session of the game process
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionRef {
    /// Stable target id (tmux `$N`)
    pub id: String,
    pub name: String,
}

impl SessionRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for SessionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Enumerates and stops the sessions of the supervised process
pub trait SessionDrainer {
    fn active_sessions(&self) -> impl Future<Output = Probe<Vec<SessionRef>>> + Send;

    fn signal_stop(&self, session: &SessionRef) -> impl Future<Output = Result<(), DrainError>> + Send;

    fn active_session_count(&self) -> impl Future<Output = Probe<usize>> + Send
    where
        Self: Sync,
    {
        async move { self.active_sessions().await.map(|sessions| sessions.len()) }
    }
}

/// Drains sessions through the tmux CLI
#[derive(Debug, Clone)]
pub struct TmuxDrainer {
    tmux: Vec<String>,
    session_name: String,
    stop_command: String,
}

impl TmuxDrainer {
    pub fn new(config: &DrainConfig) -> Self {
        Self {
            tmux: config.tmux.clone(),
            session_name: config.session_name.clone(),
            stop_command: config.stop_command.clone(),
        }
    }

    async fn send_keys(&self, args: &[&str]) -> Result<(), DrainError> {
        let output = self.run_tmux(args).await?;
        if !output.status.success() {
            return Err(DrainError::Failed {
                command: self.describe(args),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn describe(&self, args: &[&str]) -> String {
        self.tmux
            .iter()
            .map(String::as_str)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn run_tmux(&self, args: &[&str]) -> Result<Output, DrainError> {
        let command = self.describe(args);
        let Some((program, prefix)) = self.tmux.split_first() else {
            return Err(DrainError::Command {
                command,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty tmux command"),
            });
        };

        let mut cmd = Command::new(program);
        cmd.args(prefix)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match timeout(TMUX_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(DrainError::Command { command, source }),
            Err(_) => Err(DrainError::Command {
                command,
                source: std::io::Error::new(std::io::ErrorKind::TimedOut, "tmux timed out"),
            }),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRef>, DrainError> {
        let args = ["list-sessions", "-F", "#{session_id}\t#{session_name}"];
        let output = self.run_tmux(&args).await?;
        if output.status.success() {
            return Ok(parse_sessions(
                &String::from_utf8_lossy(&output.stdout),
                &self.session_name,
            ));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if means_no_sessions(&stderr) {
            return Ok(Vec::new());
        }
        Err(DrainError::Failed {
            command: self.describe(&args),
            stderr: stderr.trim().to_string(),
        })
    }

    async fn list_panes(&self, session: &SessionRef) -> Result<Vec<String>, DrainError> {
        let args = ["list-panes", "-s", "-t", session.id.as_str(), "-F", "#{pane_id}"];
        let output = self.run_tmux(&args).await?;
        if !output.status.success() {
            return Err(DrainError::Failed {
                command: self.describe(&args),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(parse_panes(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl SessionDrainer for TmuxDrainer {
    async fn active_sessions(&self) -> Probe<Vec<SessionRef>> {
        match self.list_sessions().await {
            Ok(sessions) => Probe::Observed(sessions),
            Err(e) => {
                debug!("Could not list tmux sessions: {}", e);
                Probe::Unknown
            }
        }
    }

    async fn signal_stop(&self, session: &SessionRef) -> Result<(), DrainError> {
        for pane in self.list_panes(session).await? {
            // -l types the command as text so names like `End` are not read as keys
            self.send_keys(&["send-keys", "-l", "-t", pane.as_str(), self.stop_command.as_str()])
                .await?;
            self.send_keys(&["send-keys", "-t", pane.as_str(), "Enter"]).await?;
            debug!(session = %session, pane = %pane, "Sent stop command");
        }
        Ok(())
    }
}

/// Keep `id<TAB>name` lines whose name matches exactly
fn parse_sessions(stdout: &str, session_name: &str) -> Vec<SessionRef> {
    stdout
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .filter(|(_, name)| *name == session_name)
        .map(|(id, name)| SessionRef::new(id.trim(), name))
        .collect()
}

fn parse_panes(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn means_no_sessions(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    NO_SERVER_MARKERS.iter().any(|marker| stderr.contains(marker))
}
