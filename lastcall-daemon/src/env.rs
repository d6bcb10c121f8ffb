//! Environment loading for the daemon
//!
//! Values from a dotenv file are read first; variables already present in
//! the process environment take precedence over them.

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::errors::{DaemonError, Result};

/// Default dotenv file looked up in the working directory
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Parse a dotenv file into a map without touching the process environment
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut env = HashMap::new();

    for item in dotenvy::from_path_iter(path).map_err(|e| DaemonError::EnvFileParse {
        path: path.to_path_buf(),
        source: e,
    })? {
        let (key, value) = item.map_err(|e| DaemonError::EnvFileParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        env.insert(key, value);
    }

    debug!("Loaded {} variables from {}", env.len(), path.display());
    Ok(env)
}

/// Merge dotenv values with the process environment (process wins)
pub fn merge_env(
    file_vars: HashMap<String, String>,
    process_vars: impl IntoIterator<Item = (String, String)>,
) -> HashMap<String, String> {
    let mut env = file_vars;
    env.extend(process_vars);
    env
}
