//! Client de la Web API Spotify (lecture et catalogue)

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use ureq::Agent;
use ureq::http::Response;
use url::Url;

use crate::auth::TokenManager;
use crate::error::{Result, SpotifyError};
use crate::models::{
    Artist, CurrentPlayback, Device, DeviceList, Paging, PlayRequest, PlaylistItem, Track,
    TrackSearch,
};
use pmoconfig::SpotifyConfig;

pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";

/// Taille maximale de page acceptée par la recherche
pub const SEARCH_LIMIT: u32 = 50;

#[derive(Clone, Copy, Debug)]
enum Method {
    Get,
    Put,
}

pub struct SpotifyClient {
    agent: Agent,
    api_url: String,
    auth: TokenManager,
}

impl SpotifyClient {
    pub fn new(auth: TokenManager, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            api_url: DEFAULT_API_URL.to_string(),
            auth,
        }
    }

    pub fn from_config(config: &SpotifyConfig, timeout: Duration) -> Self {
        let auth = TokenManager::new(
            &config.client_id,
            &config.client_secret,
            &config.refresh_token,
        );
        Self::new(auth, timeout)
    }

    /// Change l'URL de base de l'API (tests, proxy)
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Obtient un premier jeton d'accès
    pub fn authenticate(&mut self) -> Result<()> {
        self.auth.refresh(&self.agent).map(|_| ())
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&format!("{}{}", self.api_url, path))
            .map_err(|e| SpotifyError::Configuration(format!("invalid API URL: {}", e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    fn execute(&self, method: Method, url: &str, token: &str, body: Option<&Value>)
    -> Result<Response<ureq::Body>> {
        let bearer = format!("Bearer {}", token);
        let response = match method {
            Method::Get => self.agent.get(url).header("Authorization", &bearer).call()?,
            Method::Put => {
                let request = self.agent.put(url).header("Authorization", &bearer);
                match body {
                    Some(body) => request
                        .header("Content-Type", "application/json")
                        .send(body.to_string())?,
                    None => request.send_empty()?,
                }
            }
        };
        Ok(response)
    }

    /// Appel authentifié ; un 401 force un rafraîchissement puis un seul
    /// nouvel essai. Renvoie `None` pour une réponse sans contenu.
    fn send(&mut self, method: Method, url: &str, body: Option<&Value>) -> Result<Option<Value>> {
        let token = self.auth.access_token(&self.agent)?;
        let mut response = self.execute(method, url, &token, body)?;

        if response.status().as_u16() == 401 {
            debug!(url, "Spotify token rejected, refreshing");
            self.auth.invalidate();
            let token = self.auth.access_token(&self.agent)?;
            response = self.execute(method, url, &token, body)?;
        }

        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string()?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| url.to_string());
            return Err(SpotifyError::from_status_code(status, message));
        }

        if status == 204 || text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn get<T: DeserializeOwned>(&mut self, url: &str) -> Result<T> {
        let value = self
            .send(Method::Get, url, None)?
            .ok_or_else(|| SpotifyError::ApiError {
                code: 204,
                message: format!("empty response from {}", url),
            })?;
        Ok(serde_json::from_value(value)?)
    }

    /// Suit les pages `next` jusqu'au bout
    fn get_all<T: DeserializeOwned>(&mut self, first: String) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next {
            let page: Paging<T> = self.get(&url)?;
            items.extend(page.items);
            next = page.next;
        }
        Ok(items)
    }

    /// État de lecture courant, `None` si rien n'est actif
    pub fn current_playback(&mut self) -> Result<Option<CurrentPlayback>> {
        let url = self.endpoint("/me/player", &[])?;
        match self.send(Method::Get, &url, None)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn devices(&mut self) -> Result<Vec<Device>> {
        let url = self.endpoint("/me/player/devices", &[])?;
        let list: DeviceList = self.get(&url)?;
        Ok(list.devices)
    }

    fn device_query(device_id: Option<&str>) -> Vec<(&str, &str)> {
        device_id.map(|id| vec![("device_id", id)]).unwrap_or_default()
    }

    /// Remplace la file et démarre à `request.offset`
    pub fn start_playback(&mut self, device_id: Option<&str>, request: &PlayRequest) -> Result<()> {
        let url = self.endpoint("/me/player/play", &Self::device_query(device_id))?;
        let body = serde_json::to_value(request)?;
        self.send(Method::Put, &url, Some(&body)).map(|_| ())
    }

    /// Reprend la lecture en pause, là où elle s'est arrêtée
    pub fn resume_playback(&mut self, device_id: Option<&str>) -> Result<()> {
        let url = self.endpoint("/me/player/play", &Self::device_query(device_id))?;
        self.send(Method::Put, &url, None).map(|_| ())
    }

    pub fn pause_playback(&mut self, device_id: Option<&str>) -> Result<()> {
        let url = self.endpoint("/me/player/pause", &Self::device_query(device_id))?;
        self.send(Method::Put, &url, None).map(|_| ())
    }

    pub fn album_tracks(&mut self, album_id: &str) -> Result<Vec<Track>> {
        let url = self.endpoint(&format!("/albums/{}/tracks", album_id), &[("limit", "50")])?;
        self.get_all(url)
    }

    /// Pistes d'une playlist ; les entrées supprimées ou locales sont ignorées
    pub fn playlist_tracks(&mut self, playlist_id: &str) -> Result<Vec<Track>> {
        let url = self.endpoint(
            &format!("/playlists/{}/tracks", playlist_id),
            &[("limit", "100")],
        )?;
        let items: Vec<PlaylistItem> = self.get_all(url)?;
        let total = items.len();
        let tracks: Vec<Track> = items.into_iter().filter_map(|item| item.track).collect();
        if tracks.len() < total {
            warn!(playlist = playlist_id, skipped = total - tracks.len(), "Unplayable playlist entries skipped");
        }
        Ok(tracks)
    }

    pub fn artist(&mut self, artist_id: &str) -> Result<Artist> {
        let url = self.endpoint(&format!("/artists/{}", artist_id), &[])?;
        self.get(&url)
    }

    /// Recherche de pistes (une seule page)
    pub fn search_tracks(&mut self, query: &str, limit: u32) -> Result<Vec<Track>> {
        let limit = limit.clamp(1, SEARCH_LIMIT).to_string();
        let url = self.endpoint(
            "/search",
            &[("q", query), ("type", "track"), ("limit", &limit)],
        )?;
        let result: TrackSearch = self.get(&url)?;
        Ok(result.tracks.items)
    }
}

impl std::fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("api_url", &self.api_url)
            .field("auth", &self.auth)
            .finish()
    }
}
