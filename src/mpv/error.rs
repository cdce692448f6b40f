use std::io;
use thiserror::Error;

/// Error types for the local mpv controller.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The process could not be spawned or never opened its control socket.
    #[error("mpv unavailable: {0}")]
    PlayerUnavailable(String),

    /// The process exited while a request was outstanding.
    #[error("mpv stopped before answering")]
    PlayerStopped,

    #[error("no mpv instance is running")]
    NotRunning,

    #[error("mpv did not answer '{command}' in time")]
    CommandTimeout { command: String },

    /// mpv answered with something other than "success".
    #[error("mpv rejected '{command}': {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("malformed mpv message: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        PlayerError::Protocol(err.to_string())
    }
}
