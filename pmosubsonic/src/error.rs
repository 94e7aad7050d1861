//! Gestion des erreurs pour le client Subsonic

use pmoturntable::BackendError;
use thiserror::Error;

/// Type Result personnalisé pour pmosubsonic
pub type Result<T> = std::result::Result<T, SubsonicError>;

/// Erreurs possibles lors de l'utilisation du client Subsonic
#[derive(Error, Debug)]
pub enum SubsonicError {
    /// Identifiants refusés par le serveur (codes Subsonic 40/41)
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Ressource absente (code Subsonic 70)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Erreur réseau ou timeout
    #[error("HTTP error: {0}")]
    Http(String),

    /// Statut HTTP hors 2xx
    #[error("HTTP status {code} for {endpoint}")]
    Status { code: u16, endpoint: String },

    /// Erreur de parsing JSON
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Enveloppe `status: failed` renvoyée par le serveur
    #[error("Subsonic API error (code {code}): {message}")]
    ApiError { code: u32, message: String },

    /// URL du serveur invalide, identifiants absents...
    #[error("Subsonic configuration error: {0}")]
    Configuration(String),

    /// Réponse valide mais sans l'élément attendu
    #[error("Unexpected response from {0}")]
    UnexpectedResponse(String),

    /// Erreur du lecteur local
    #[error("Player error: {0}")]
    Player(#[from] PlayerError),
}

impl SubsonicError {
    /// Traduit un code d'erreur Subsonic
    pub fn from_api_code(code: u32, message: impl Into<String>) -> Self {
        match code {
            40 | 41 => Self::Unauthorized(message.into()),
            70 => Self::NotFound(message.into()),
            _ => Self::ApiError {
                code,
                message: message.into(),
            },
        }
    }
}

impl From<ureq::Error> for SubsonicError {
    fn from(e: ureq::Error) -> Self {
        SubsonicError::Http(e.to_string())
    }
}

impl From<SubsonicError> for BackendError {
    fn from(e: SubsonicError) -> Self {
        match e {
            SubsonicError::Unauthorized(m) => BackendError::Unauthorized(m),
            SubsonicError::NotFound(m) => BackendError::NotFound(m),
            SubsonicError::Http(m) => BackendError::Transport(m),
            SubsonicError::Status { code, endpoint } => BackendError::Api {
                code,
                message: endpoint,
            },
            SubsonicError::ApiError { code, message } => BackendError::Api {
                code: u16::try_from(code).unwrap_or(u16::MAX),
                message,
            },
            SubsonicError::Player(e) => BackendError::Player(e.to_string()),
            other => BackendError::Other(other.to_string()),
        }
    }
}

/// Erreurs du lecteur local (processus mpv)
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Cannot launch player: {0}")]
    Spawn(String),

    #[error("Player IPC error: {0}")]
    Ipc(#[from] std::io::Error),

    #[error("Player rejected command {command}: {reason}")]
    Command { command: String, reason: String },

    #[error("Malformed player reply: {0}")]
    Protocol(String),
}

impl From<PlayerError> for BackendError {
    fn from(e: PlayerError) -> Self {
        BackendError::Player(e.to_string())
    }
}
