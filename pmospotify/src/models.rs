//! Modèles de données de la Web API Spotify (sous-ensemble utilisé)

use serde::{Deserialize, Serialize};

/// Réponse de `POST /api/token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Durée de validité en secondes
    pub expires_in: u64,
    /// Présent quand Spotify fait tourner le refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeviceList {
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Track {
    /// Absent pour les fichiers locaux
    pub id: Option<String>,
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Context {
    pub uri: String,
}

/// Réponse de `GET /me/player`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrentPlayback {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    /// Piste ou épisode en cours
    #[serde(default)]
    pub item: Option<Track>,
    #[serde(default)]
    pub context: Option<Context>,
    #[serde(default)]
    pub device: Option<Device>,
}

impl CurrentPlayback {
    pub fn track_id(&self) -> Option<&str> {
        self.item.as_ref().and_then(|item| item.id.as_deref())
    }
}

/// Page de résultats, `next` est une URL absolue
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PlaylistItem {
    #[serde(default)]
    pub track: Option<Track>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TrackSearch {
    pub tracks: Paging<Track>,
}

/// Corps de `PUT /me/player/play`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayRequest {
    pub uris: Vec<String>,
    pub offset: PlayOffset,
    pub position_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayOffset {
    pub position: usize,
}
