//! Config file loading through to a wired supervisor

use lastcall_daemon::config::{
    ENV_IDLE_TIMEOUT_MINUTES, ENV_INSTANCE_ID, ENV_WEBHOOK_URL, LastcallConfig,
};
use lastcall_daemon::env::{load_env_file, merge_env};
use lastcall_daemon::lifecycle::LifecycleState;
use lastcall_daemon::{build_supervisor, server_details};
use lastcall_tests::TestTimingBuilder;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &std::path::Path, config: &LastcallConfig) -> std::path::PathBuf {
    let path = dir.join("lastcall.yaml");
    std::fs::write(&path, serde_yaml::to_string(config).unwrap()).unwrap();
    path
}

#[test]
fn test_serialized_config_round_trips_through_load() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = LastcallConfig::default();
    config.timing = TestTimingBuilder::new()
        .with_grace(6, Duration::from_millis(2500))
        .with_idle_threshold(20)
        .build();
    config.notify.webhook_url = "https://discord.com/api/webhooks/1/abc".to_string();
    config.notify.footer = Some("on a spare box".to_string());
    config.instance.id = "ocid1.instance".to_string();
    let path = write_config(temp_dir.path(), &config);

    let loaded = LastcallConfig::load(Some(&path), &HashMap::new()).unwrap();

    assert_eq!(loaded.timing, config.timing);
    assert_eq!(loaded.timing.grace_check_interval, Duration::from_millis(2500));
    assert_eq!(server_details(&loaded).footer.as_deref(), Some("on a spare box"));
}

#[test]
fn test_env_file_fills_required_settings() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(temp_dir.path(), &LastcallConfig::default());
    let env_path = temp_dir.path().join(".env");
    std::fs::write(
        &env_path,
        format!(
            "{}=https://discord.com/api/webhooks/1/abc\n{}=ocid1.instance\n{}=5\n",
            ENV_WEBHOOK_URL, ENV_INSTANCE_ID, ENV_IDLE_TIMEOUT_MINUTES
        ),
    )
    .unwrap();

    let env = merge_env(load_env_file(&env_path).unwrap(), Vec::new());
    let config = LastcallConfig::load(Some(&path), &env).unwrap();

    assert_eq!(config.instance.id, "ocid1.instance");
    assert_eq!(config.timing.idle_threshold(), 5);
}

#[test]
fn test_process_env_beats_env_file() {
    let file_vars = HashMap::from([(ENV_INSTANCE_ID.to_string(), "from-file".to_string())]);
    let env = merge_env(
        file_vars,
        vec![(ENV_INSTANCE_ID.to_string(), "from-process".to_string())],
    );
    assert_eq!(env[ENV_INSTANCE_ID], "from-process");
}

#[tokio::test]
async fn test_build_supervisor_from_config() {
    let env = HashMap::from([
        (
            ENV_WEBHOOK_URL.to_string(),
            "https://discord.com/api/webhooks/1/abc".to_string(),
        ),
        (ENV_INSTANCE_ID.to_string(), "ocid1.instance".to_string()),
    ]);
    let config = LastcallConfig::load(None, &env).unwrap();

    let supervisor = build_supervisor(&config).unwrap();

    assert_eq!(supervisor.state(), LifecycleState::Starting);
    assert_eq!(supervisor.idle_ticks(), 0);
    assert!(supervisor.outcome().is_none());
}
