//! Tracing initialization.
//!
//! The TUI owns the terminal, so log lines go to `<data_dir>/ccal.log`.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::utils::{self, Profile};

pub const LOG_FILE_NAME: &str = "ccal.log";

/// Path of the log file for a profile, if a data directory can be resolved
pub fn log_path(profile: Profile) -> Option<PathBuf> {
    utils::get_data_dir(profile).map(|dir| dir.join(LOG_FILE_NAME))
}

/// Initialize tracing for the process, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times (subsequent calls are no-ops). When the log
/// file cannot be opened, logging is left disabled rather than writing over
/// the terminal.
pub fn init(profile: Profile) -> Option<PathBuf> {
    let path = log_path(profile)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok()?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init();

    Some(path)
}
