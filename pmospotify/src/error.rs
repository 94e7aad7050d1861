//! Gestion des erreurs pour le client Spotify

use pmoturntable::BackendError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpotifyError>;

#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Token refusé ou refresh token révoqué
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Erreur réseau ou timeout
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Spotify API error (code {code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Rate limit exceeded, please try again later")]
    RateLimitExceeded,

    /// Identifiants manquants, URL invalide...
    #[error("Spotify configuration error: {0}")]
    Configuration(String),
}

impl SpotifyError {
    /// Crée une erreur depuis un code de statut HTTP et un message
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            401 => Self::Unauthorized(message.into()),
            404 => Self::NotFound(message.into()),
            429 => Self::RateLimitExceeded,
            _ => Self::ApiError {
                code,
                message: message.into(),
            },
        }
    }
}

impl From<ureq::Error> for SpotifyError {
    fn from(e: ureq::Error) -> Self {
        SpotifyError::Http(e.to_string())
    }
}

impl From<SpotifyError> for BackendError {
    fn from(e: SpotifyError) -> Self {
        match e {
            SpotifyError::Unauthorized(m) => BackendError::Unauthorized(m),
            SpotifyError::NotFound(m) => BackendError::NotFound(m),
            SpotifyError::Http(m) => BackendError::Transport(m),
            SpotifyError::ApiError { code, message } => BackendError::Api { code, message },
            SpotifyError::RateLimitExceeded => BackendError::Api {
                code: 429,
                message: "rate limited".to_string(),
            },
            other => BackendError::Other(other.to_string()),
        }
    }
}
