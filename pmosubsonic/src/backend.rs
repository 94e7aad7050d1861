//! Backend "direct-stream" : les morceaux sont résolus par l'API Subsonic
//! puis joués localement depuis des URLs de streaming signées.

use pmoturntable::{
    BackendError, MediaKind, MediaRef, PlaybackBackend, PlaybackSnapshot, ResumePoint,
};
use tracing::{debug, info, warn};

use crate::client::SubsonicClient;
use crate::error::SubsonicError;
use crate::models::Song;
use crate::player::{PlayerState, PlayerStatus, QueuePlayer};

pub const PROVIDER: &str = "subsonic";

/// File actuellement chargée dans le lecteur
#[derive(Debug, Clone)]
struct LoadedQueue {
    media: MediaRef,
    track_ids: Vec<String>,
}

pub struct SubsonicBackend<P> {
    client: SubsonicClient,
    player: P,
    loaded: Option<LoadedQueue>,
    snapshot: PlaybackSnapshot,
}

impl<P: QueuePlayer> SubsonicBackend<P> {
    pub fn new(client: SubsonicClient, player: P) -> Self {
        Self {
            client,
            player,
            loaded: None,
            snapshot: PlaybackSnapshot::default(),
        }
    }

    pub fn client(&self) -> &SubsonicClient {
        &self.client
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn snapshot(&self) -> &PlaybackSnapshot {
        &self.snapshot
    }

    /// Référence actuellement chargée, s'il y en a une
    pub fn loaded_media(&self) -> Option<&MediaRef> {
        self.loaded.as_ref().map(|queue| &queue.media)
    }

    fn live_status(&mut self) -> PlayerStatus {
        match self.player.status() {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Cannot query player status");
                PlayerStatus::idle()
            }
        }
    }

    /// Liste ordonnée des morceaux, relue à chaque appel
    fn resolve(&self, media: &MediaRef) -> Result<Vec<Song>, SubsonicError> {
        match media.kind {
            MediaKind::Track => Ok(vec![self.client.get_song(&media.id)?]),
            MediaKind::Album => Ok(self.client.get_album(&media.id)?.song),
            MediaKind::Playlist => Ok(self.client.get_playlist(&media.id)?.entry),
            MediaKind::Artist => self.client.artist_songs(&media.id),
        }
    }

    /// Charge la file de `media`, au point de reprise s'il figure encore dans
    /// la liste fraîchement résolue
    fn start(&mut self, media: &MediaRef, resume: Option<ResumePoint>) -> Result<(), BackendError> {
        let songs = self.resolve(media)?;
        if songs.is_empty() {
            return Err(BackendError::NothingToPlay(media.to_string()));
        }
        let track_ids: Vec<String> = songs.into_iter().map(|song| song.id).collect();

        let (start_index, position_ms) = resume
            .and_then(|point| {
                track_ids
                    .iter()
                    .position(|id| *id == point.track_id)
                    .map(|index| (index, point.position_ms))
            })
            .unwrap_or((0, 0));

        let urls = track_ids
            .iter()
            .map(|id| self.client.stream_url(id))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            media = %media,
            tracks = track_ids.len(),
            start_index,
            position_ms,
            "Loading queue"
        );
        let result = self.player.load(&urls, start_index, position_ms);
        // Même en erreur, le lecteur a pu basculer sur la nouvelle file
        self.loaded = Some(LoadedQueue {
            media: media.clone(),
            track_ids,
        });
        if let Err(e) = &result {
            warn!(media = %media, error = %e, "Queue load failed");
        }
        Ok(result?)
    }

    /// Met à jour le cache de reprise depuis l'état du lecteur
    fn capture(&mut self, status: &PlayerStatus) {
        let (Some(loaded), Some(index)) = (self.loaded.as_ref(), status.index) else {
            debug!("Nothing loaded, keeping previous snapshot");
            return;
        };
        if status.state == PlayerState::Idle {
            debug!("Player idle, keeping previous snapshot");
            return;
        }

        let context = match loaded.media.kind {
            MediaKind::Track => None,
            _ => Some(loaded.media.clone()),
        };
        self.snapshot = PlaybackSnapshot {
            context,
            track: loaded.track_ids.get(index).cloned(),
            position_ms: status.position_ms,
        };
        debug!(snapshot = ?self.snapshot, "Playback snapshot captured");
    }
}

impl<P: QueuePlayer> PlaybackBackend for SubsonicBackend<P> {
    fn play(&mut self, media: &MediaRef) -> Result<(), BackendError> {
        if media.provider != PROVIDER {
            return Err(BackendError::UnsupportedMedia(media.to_string()));
        }

        if self.loaded_media() == Some(media)
            && self.live_status().state == PlayerState::Playing
        {
            info!(media = %media, "Same media already playing, ignoring");
            return Ok(());
        }

        let resume = self.snapshot.resume_point_for(media);
        if let Some(point) = &resume {
            info!(media = %media, track = %point.track_id, position_ms = point.position_ms, "Resuming from snapshot");
        }
        self.start(media, resume)
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        match self.player.status() {
            Ok(status) => self.capture(&status),
            Err(e) => warn!(error = %e, "Cannot query player, snapshot left unchanged"),
        }
        info!("Pausing playback");
        self.player.pause()?;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        if self.snapshot.is_empty() {
            debug!("Nothing paused, resume ignored");
            return Ok(());
        }

        match self.live_status().state {
            PlayerState::Playing => {
                debug!("Already playing, resume ignored");
                Ok(())
            }
            PlayerState::Paused if self.loaded.is_some() => {
                info!("Resuming playback");
                self.player.resume()?;
                Ok(())
            }
            _ => {
                // File perdue (lecteur relancé, fin de file) : on la reconstruit
                let media = match (&self.snapshot.context, &self.snapshot.track) {
                    (Some(context), _) => context.clone(),
                    (None, Some(track)) => MediaRef::track(PROVIDER, track.clone()),
                    (None, None) => return Ok(()),
                };
                let resume = self.snapshot.resume_point_for(&media);
                info!(media = %media, "Rebuilding queue from snapshot");
                self.start(&media, resume)
            }
        }
    }
}
