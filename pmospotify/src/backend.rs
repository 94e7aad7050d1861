//! Backend "token-auth" : la lecture a lieu sur un appareil Spotify Connect,
//! piloté par la Web API.

use pmoturntable::{
    BackendError, MediaKind, MediaRef, PlaybackBackend, PlaybackSnapshot, ResumePoint,
};
use tracing::{debug, info, warn};

use crate::client::{SEARCH_LIMIT, SpotifyClient};
use crate::error::SpotifyError;
use crate::models::{CurrentPlayback, PlayOffset, PlayRequest, Track};

pub const PROVIDER: &str = "spotify";

pub fn track_uri(id: &str) -> String {
    format!("spotify:track:{}", id)
}

#[derive(Debug, Clone)]
struct LoadedQueue {
    media: MediaRef,
    track_ids: Vec<String>,
}

pub struct SpotifyBackend {
    client: SpotifyClient,
    device_name: Option<String>,
    device_id: Option<String>,
    loaded: Option<LoadedQueue>,
    snapshot: PlaybackSnapshot,
}

impl SpotifyBackend {
    /// `device_name` : appareil Spotify Connect cible ; à défaut, l'appareil
    /// actif du compte
    pub fn new(client: SpotifyClient, device_name: Option<String>) -> Self {
        Self {
            client,
            device_name,
            device_id: None,
            loaded: None,
            snapshot: PlaybackSnapshot::default(),
        }
    }

    pub fn client_mut(&mut self) -> &mut SpotifyClient {
        &mut self.client
    }

    pub fn snapshot(&self) -> &PlaybackSnapshot {
        &self.snapshot
    }

    /// Identifiant de l'appareil cible, résolu une fois puis mis en cache
    fn device_id(&mut self) -> Option<String> {
        if self.device_id.is_some() {
            return self.device_id.clone();
        }
        let name = self.device_name.as_deref()?;

        match self.client.devices() {
            Ok(devices) => {
                let found = devices
                    .into_iter()
                    .find(|device| device.name.eq_ignore_ascii_case(name))
                    .and_then(|device| device.id);
                match &found {
                    Some(id) => info!(device = name, id = %id, "Spotify device resolved"),
                    None => warn!(device = name, "Spotify device not found, using the active device"),
                }
                self.device_id = found;
            }
            Err(e) => warn!(device = name, error = %e, "Cannot list Spotify devices"),
        }
        self.device_id.clone()
    }

    /// Identifiants des pistes, relus à chaque appel
    fn resolve(&mut self, media: &MediaRef) -> Result<Vec<String>, SpotifyError> {
        let tracks: Vec<Track> = match media.kind {
            MediaKind::Track => return Ok(vec![media.id.clone()]),
            MediaKind::Album => self.client.album_tracks(&media.id)?,
            MediaKind::Playlist => self.client.playlist_tracks(&media.id)?,
            MediaKind::Artist => {
                let artist = self.client.artist(&media.id)?;
                let query = format!("artist:\"{}\"", artist.name);
                self.client
                    .search_tracks(&query, SEARCH_LIMIT)?
                    .into_iter()
                    .filter(|track| {
                        track.artists.first().map(|a| a.name.as_str()) == Some(artist.name.as_str())
                    })
                    .collect()
            }
        };
        Ok(tracks.into_iter().filter_map(|track| track.id).collect())
    }

    fn start(&mut self, media: &MediaRef, resume: Option<ResumePoint>) -> Result<(), BackendError> {
        let track_ids = self.resolve(media)?;
        if track_ids.is_empty() {
            return Err(BackendError::NothingToPlay(media.to_string()));
        }

        let (position, position_ms) = resume
            .and_then(|point| {
                track_ids
                    .iter()
                    .position(|id| *id == point.track_id)
                    .map(|index| (index, point.position_ms))
            })
            .unwrap_or((0, 0));

        let request = PlayRequest {
            uris: track_ids.iter().map(|id| track_uri(id)).collect(),
            offset: PlayOffset { position },
            position_ms,
        };
        info!(media = %media, tracks = track_ids.len(), position, position_ms, "Starting Spotify playback");

        let device_id = self.device_id();
        self.client.start_playback(device_id.as_deref(), &request)?;
        self.loaded = Some(LoadedQueue {
            media: media.clone(),
            track_ids,
        });
        Ok(())
    }

    /// Contexte du morceau en cours : la référence chargée par le
    /// tourne-disque si le morceau en fait partie, sinon celui annoncé par
    /// Spotify
    fn capture(&mut self, live: &CurrentPlayback) {
        let Some(track_id) = live.track_id() else {
            debug!("No track in live state, keeping previous snapshot");
            return;
        };

        let context = match &self.loaded {
            Some(loaded) if loaded.track_ids.iter().any(|id| id == track_id) => {
                match loaded.media.kind {
                    MediaKind::Track => None,
                    _ => Some(loaded.media.clone()),
                }
            }
            _ => live
                .context
                .as_ref()
                .and_then(|context| context.uri.parse::<MediaRef>().ok()),
        };

        self.snapshot = PlaybackSnapshot {
            context,
            track: Some(track_id.to_string()),
            position_ms: live.progress_ms.unwrap_or(0),
        };
        debug!(snapshot = ?self.snapshot, "Playback snapshot captured");
    }
}

impl PlaybackBackend for SpotifyBackend {
    fn play(&mut self, media: &MediaRef) -> Result<(), BackendError> {
        if media.provider != PROVIDER {
            return Err(BackendError::UnsupportedMedia(media.to_string()));
        }

        let resume = self.snapshot.resume_point_for(media);
        if let Some(point) = &resume {
            info!(media = %media, track = %point.track_id, position_ms = point.position_ms, "Resuming from snapshot");
        }
        self.start(media, resume)
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        let live = match self.client.current_playback() {
            Ok(Some(live)) => {
                self.capture(&live);
                Some(live)
            }
            Ok(None) => {
                debug!("Nothing active on Spotify, nothing to pause");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Cannot read Spotify playback state, snapshot left unchanged");
                None
            }
        };

        // Spotify refuse de mettre en pause une lecture déjà en pause
        if live.as_ref().is_some_and(|l| !l.is_playing) {
            return Ok(());
        }

        info!("Pausing Spotify playback");
        let device_id = self.device_id.clone();
        self.client.pause_playback(device_id.as_deref())?;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        if self.snapshot.is_empty() {
            debug!("Nothing paused, resume ignored");
            return Ok(());
        }

        let live = match self.client.current_playback() {
            Ok(live) => live,
            Err(e) => {
                warn!(error = %e, "Cannot read Spotify playback state");
                None
            }
        };

        if let Some(live) = &live {
            if live.is_playing {
                debug!("Already playing, resume ignored");
                return Ok(());
            }
            if live.track_id().is_some() && live.track_id() == self.snapshot.track.as_deref() {
                info!("Resuming Spotify playback");
                let device_id = self.device_id();
                self.client.resume_playback(device_id.as_deref())?;
                return Ok(());
            }
        }

        // Session perdue ou autre morceau en cours : on resoumet la file
        let media = match (&self.snapshot.context, &self.snapshot.track) {
            (Some(context), _) => context.clone(),
            (None, Some(track)) => MediaRef::track(PROVIDER, track.clone()),
            (None, None) => return Ok(()),
        };
        let resume = self.snapshot.resume_point_for(&media);
        info!(media = %media, "Resubmitting queue from snapshot");
        self.start(&media, resume)
    }
}
