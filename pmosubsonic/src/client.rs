//! Client REST Subsonic / Navidrome
//!
//! Appels bloquants via `ureq` : le client est utilisé depuis la boucle de
//! contrôle du tourne-disque, qui tourne dans son propre thread.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};
use ureq::Agent;
use url::Url;

use crate::auth::Credentials;
use crate::error::{Result, SubsonicError};
use crate::models::{Album, Artist, Playlist, SearchResult3, Song};
use pmoconfig::SubsonicConfig;

/// Nombre de morceaux demandés à `search3` pour un artiste
pub const DEFAULT_ARTIST_SONG_COUNT: u32 = 50;

/// Client pour l'API Subsonic
#[derive(Debug)]
pub struct SubsonicClient {
    base_url: String,
    credentials: Credentials,
    agent: Agent,
    artist_song_count: u32,
}

impl SubsonicClient {
    /// Crée un client pour le serveur `base_url` (ex. `https://music.example.org`)
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            agent,
            artist_song_count: DEFAULT_ARTIST_SONG_COUNT,
        }
    }

    /// Crée un client depuis la section `subsonic` de la configuration
    pub fn from_config(config: &SubsonicConfig, timeout: Duration) -> Self {
        let credentials = Credentials::new(
            &config.username,
            &config.password,
            &config.client_name,
            &config.api_version,
        );
        Self::new(&config.url, credentials, timeout)
            .with_artist_song_count(config.artist_song_count)
    }

    pub fn with_artist_song_count(mut self, count: u32) -> Self {
        self.artist_song_count = count.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Appelle `rest/{endpoint}` et renvoie le contenu de `subsonic-response`
    fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/rest/{}", self.base_url, endpoint);
        debug!(endpoint, "Subsonic request");

        let mut request = self.agent.get(&url).query("f", "json");
        for (key, value) in self.credentials.auth_params() {
            request = request.query(key, value);
        }
        for (key, value) in params {
            request = request.query(*key, *value);
        }

        let mut response = request.call()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SubsonicError::Status {
                code: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }

        let body = response.body_mut().read_to_string()?;
        parse_envelope(endpoint, &body)
    }

    fn call_for<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        key: &str,
    ) -> Result<T> {
        let mut response = self.call(endpoint, params)?;
        let item = response
            .get_mut(key)
            .map(Value::take)
            .ok_or_else(|| SubsonicError::UnexpectedResponse(format!("{} (no '{}')", endpoint, key)))?;
        Ok(serde_json::from_value(item)?)
    }

    /// Vérifie la connexion et les identifiants
    pub fn ping(&self) -> Result<()> {
        self.call("ping", &[])?;
        info!(server = %self.base_url, "Subsonic server reachable");
        Ok(())
    }

    pub fn get_song(&self, id: &str) -> Result<Song> {
        self.call_for("getSong", &[("id", id)], "song")
    }

    pub fn get_album(&self, id: &str) -> Result<Album> {
        self.call_for("getAlbum", &[("id", id)], "album")
    }

    pub fn get_playlist(&self, id: &str) -> Result<Playlist> {
        self.call_for("getPlaylist", &[("id", id)], "playlist")
    }

    pub fn get_artist(&self, id: &str) -> Result<Artist> {
        self.call_for("getArtist", &[("id", id)], "artist")
    }

    /// Recherche de morceaux uniquement
    pub fn search3(&self, query: &str, song_count: u32) -> Result<SearchResult3> {
        let song_count = song_count.to_string();
        let mut response = self.call(
            "search3",
            &[
                ("query", query),
                ("songCount", &song_count),
                ("artistCount", "0"),
                ("albumCount", "0"),
            ],
        )?;
        // Certains serveurs omettent searchResult3 quand rien ne correspond
        match response.get_mut("searchResult3").map(Value::take) {
            Some(result) => Ok(serde_json::from_value(result)?),
            None => Ok(SearchResult3::default()),
        }
    }

    /// Morceaux "phares" d'un artiste : recherche par nom puis filtre
    /// sur l'artiste exact (la recherche remonte aussi les featurings).
    pub fn artist_songs(&self, artist_id: &str) -> Result<Vec<Song>> {
        let artist = self.get_artist(artist_id)?;
        let found = self.search3(&artist.name, self.artist_song_count)?;
        let songs: Vec<Song> = found
            .song
            .into_iter()
            .filter(|song| song.artist.as_deref() == Some(artist.name.as_str()))
            .collect();
        debug!(artist = %artist.name, count = songs.len(), "Artist songs resolved");
        Ok(songs)
    }

    /// URL de streaming signée, avec un sel neuf
    pub fn stream_url(&self, song_id: &str) -> Result<String> {
        let mut url = Url::parse(&format!("{}/rest/stream", self.base_url))
            .map_err(|e| SubsonicError::Configuration(format!("invalid server URL '{}': {}", self.base_url, e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("id", song_id);
            for (key, value) in self.credentials.auth_params() {
                query.append_pair(key, &value);
            }
        }
        Ok(url.into())
    }
}

/// Décode l'enveloppe `{"subsonic-response": {"status": ..., ...}}`
fn parse_envelope(endpoint: &str, body: &str) -> Result<Value> {
    let mut root: Value = serde_json::from_str(body)?;
    let response = root
        .get_mut("subsonic-response")
        .map(Value::take)
        .ok_or_else(|| SubsonicError::UnexpectedResponse(endpoint.to_string()))?;

    match response.get("status").and_then(Value::as_str) {
        Some("ok") => Ok(response),
        Some("failed") => {
            let error = response.get("error");
            let code = error
                .and_then(|e| e.get("code"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let message = error
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(SubsonicError::from_api_code(code as u32, message))
        }
        _ => Err(SubsonicError::UnexpectedResponse(endpoint.to_string())),
    }
}
