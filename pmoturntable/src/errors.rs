use thiserror::Error;

/// Errors returned by a [`PlaybackBackend`](crate::PlaybackBackend).
///
/// The controller never aborts on them: they are logged and the state
/// machine proceeds as if the call had returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Authentication failed: {0}")]
    Unauthorized(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("API error (code {code}): {message}")]
    Api { code: u16, message: String },
    #[error("Nothing to play for {0}")]
    NothingToPlay(String),
    #[error("Media reference {0} is not supported by this backend")]
    UnsupportedMedia(String),
    #[error("Player error: {0}")]
    Player(String),
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport(_) => true,
            BackendError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// Failure of a sensor, reader or actuator line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("Arm sensor error: {0}")]
    Sensor(String),
    #[error("Tag reader error: {0}")]
    Reader(String),
    #[error("GPIO error: {0}")]
    Gpio(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaRefError {
    #[error("Invalid media reference '{0}': expected provider:kind:id")]
    Malformed(String),
    #[error("Unknown media kind '{0}'")]
    UnknownKind(String),
}
