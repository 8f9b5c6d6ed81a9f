//! Diagnostic log installation.
//!
//! Capture output belongs to the presentation layer, so the crate's own tracing events
//! go to a plain-text log file instead of the terminal.

use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Level;

use crate::protocol::SetupError;

pub const DEFAULT_LOG_FILE: &str = "micro-capture.log";

/// `<temp dir>/micro-capture.log`
pub fn default_log_path() -> PathBuf {
    env::temp_dir().join(DEFAULT_LOG_FILE)
}

/// Installs a global fmt subscriber appending to `path`, or to [`default_log_path`].
///
/// Returns the path of the log file. Fails if the file cannot be opened or a global
/// subscriber is already installed.
pub fn init(path: Option<&Path>, level: Level) -> Result<PathBuf, SetupError> {
    let path = path.map_or_else(default_log_path, Path::to_path_buf);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(SetupError::diagnostics)?;

    Ok(path)
}
