//! Power actions against the compute instance hosting the server

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::{ENV_INSTANCE_ID, InstanceConfig};

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("failed to run {action} command: {source}")]
    Spawn {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{action} command exited with {status}: {stderr}")]
    Failed {
        action: &'static str,
        status: String,
        stderr: String,
    },

    #[error("{action} command timed out")]
    Timeout { action: &'static str },
}

/// Restart / shutdown of the supervised instance
pub trait InstanceController {
    fn restart(&self) -> impl Future<Output = Result<(), InstanceError>> + Send;

    fn shutdown(&self) -> impl Future<Output = Result<(), InstanceError>> + Send;
}

/// Runs a configured command for each action.
///
/// The instance id is exported as `LASTCALL_INSTANCE_ID` so shell commands can
/// reference it.
#[derive(Debug, Clone)]
pub struct CommandController {
    instance_id: String,
    restart: Vec<String>,
    shutdown: Vec<String>,
    command_timeout: Duration,
}

impl CommandController {
    pub fn new(config: &InstanceConfig) -> Self {
        Self {
            instance_id: config.id.clone(),
            restart: config.restart.clone(),
            shutdown: config.shutdown.clone(),
            command_timeout: config.command_timeout,
        }
    }

    async fn run(&self, action: &'static str, argv: &[String]) -> Result<(), InstanceError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(InstanceError::Spawn {
                action,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        info!(action, instance_id = %self.instance_id, "Requesting instance {}", action);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .env(ENV_INSTANCE_ID, &self.instance_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.command_timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| InstanceError::Spawn { action, source })?,
            Err(_) => return Err(InstanceError::Timeout { action }),
        };

        if !output.status.success() {
            return Err(InstanceError::Failed {
                action,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(
            action,
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "Instance command finished"
        );
        Ok(())
    }
}

impl InstanceController for CommandController {
    async fn restart(&self) -> Result<(), InstanceError> {
        self.run("restart", &self.restart).await
    }

    async fn shutdown(&self) -> Result<(), InstanceError> {
        self.run("shutdown", &self.shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(restart: &[&str], shutdown: &[&str]) -> CommandController {
        CommandController::new(&InstanceConfig {
            id: "ocid1.instance.test".to_string(),
            restart: restart.iter().map(|s| s.to_string()).collect(),
            shutdown: shutdown.iter().map(|s| s.to_string()).collect(),
            command_timeout: Duration::from_secs(5),
        })
    }

    #[tokio::test]
    async fn test_successful_commands() {
        let controller = controller(&["true"], &["sh", "-c", "exit 0"]);
        controller.restart().await.unwrap();
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_instance_id_is_exported() {
        let controller = controller(
            &["sh", "-c", "test \"$LASTCALL_INSTANCE_ID\" = ocid1.instance.test"],
            &["true"],
        );
        controller.restart().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let controller = controller(&["true"], &["sh", "-c", "echo denied >&2; exit 3"]);
        match controller.shutdown().await.unwrap_err() {
            InstanceError::Failed { action, stderr, .. } => {
                assert_eq!(action, "shutdown");
                assert_eq!(stderr, "denied");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let controller = controller(&["/nonexistent/lastcall-restart"], &["true"]);
        assert!(matches!(
            controller.restart().await,
            Err(InstanceError::Spawn { action: "restart", .. })
        ));
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        let mut controller = controller(&["sleep", "5"], &["true"]);
        controller.command_timeout = Duration::from_millis(50);
        assert!(matches!(
            controller.restart().await,
            Err(InstanceError::Timeout { action: "restart" })
        ));
    }
}
