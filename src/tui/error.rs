use thiserror::Error;

use crate::database::DatabaseError;

/// Fatal TUI errors. Backend failures during a session become status notices
/// instead; only setup and teardown surface here.
#[derive(Debug, Error)]
pub enum TuiError {
    #[error("IO/Terminal error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Invalid key binding for {action}: {reason}")]
    KeyBindingError { action: &'static str, reason: String },

    #[error("Terminal size too small. Current: {width}x{height}, minimum required: {min_width}x{min_height}. Please resize your terminal window.")]
    TerminalTooSmall {
        width: u16,
        height: u16,
        min_width: u16,
        min_height: u16,
    },
}
