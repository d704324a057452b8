//! File logging for the dashboard process.
//!
//! The terminal belongs to the TUI, so tracing output goes to a file in the
//! run's scratch directory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "infinity.log";

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "INFINITY_LOG";

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber writing to `<scratch_dir>/infinity.log`.
pub fn init(scratch_dir: &Path) -> Result<PathBuf> {
    let path = scratch_dir.join(LOG_FILE);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|err| anyhow!("Failed to install logger: {err}"))?;

    Ok(path)
}
