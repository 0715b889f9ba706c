use crate::infrastructure::error::InfraError;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "planner.log";

/// Installs a JSON-lines subscriber writing to `<logs_dir>/planner.log`.
///
/// `RUST_LOG` overrides `default_filter`. Returns `Ok(false)` when a global
/// subscriber is already installed.
pub fn init_logging(logs_dir: &Path, default_filter: &str) -> Result<bool, InfraError> {
    fs::create_dir_all(logs_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(LOG_FILE))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    Ok(tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_current_span(false)
        .try_init()
        .is_ok())
}
