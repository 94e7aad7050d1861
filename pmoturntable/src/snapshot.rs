//! Playback position cache used to resume a stopped stream.

use crate::media::{MediaKind, MediaRef};

/// What a backend was playing when the arm was last lifted.
///
/// Owned by one backend instance, overwritten on every successful pause and
/// never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    /// Album, playlist or artist the track was playing as part of.
    pub context: Option<MediaRef>,
    /// Provider-local identifier of the track.
    pub track: Option<String>,
    pub position_ms: u64,
}

/// Where to start a queue instead of its head.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumePoint {
    pub track_id: String,
    pub position_ms: u64,
}

impl PlaybackSnapshot {
    pub fn is_empty(&self) -> bool {
        self.context.is_none() && self.track.is_none()
    }

    /// Resume point for a play request on `media`, if the snapshot belongs to
    /// the same logical session.
    ///
    /// - `track`: the cached track must be the requested one.
    /// - `album`/`playlist`: the cached context must be the requested one.
    /// - `artist`: never, the derived ordering is not stable across calls.
    pub fn resume_point_for(&self, media: &MediaRef) -> Option<ResumePoint> {
        let track_id = self.track.as_ref()?;

        let same_session = match media.kind {
            MediaKind::Track => track_id == &media.id,
            kind if kind.supports_mid_context_resume() => self.context.as_ref() == Some(media),
            _ => false,
        };

        same_session.then(|| ResumePoint {
            track_id: track_id.clone(),
            position_ms: self.position_ms,
        })
    }
}
