//! Tracing setup. Run logs go to `$XDG_STATE_HOME/save-answersheets/`; stdout
//! stays reserved for the per-entry progress lines.

use anyhow::Result;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::APP_NAME;

const DEFAULT_FILTER: &str = "info,answersheet_core=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Opens `<state_dir>/save-answersheets.log` for appending, creating the directory.
fn open_log_file(state_dir: &Path) -> io::Result<(PathBuf, File)> {
    fs::create_dir_all(state_dir)?;
    let path = state_dir.join(format!("{APP_NAME}.log"));
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Logs to the XDG state file. Errors (no home, unwritable dir, subscriber
/// already set) are returned so the caller can use [`init_logging_stderr`].
pub fn init_logging() -> Result<()> {
    let state_dir = xdg::BaseDirectories::with_prefix(APP_NAME)?.get_state_home();
    let (path, file) = open_log_file(&state_dir)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing::info!("logging to {}", path.display());
    Ok(())
}

pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
