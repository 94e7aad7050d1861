//! Structured references to playable units on a remote music service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::MediaRefError;

/// What a [`MediaRef`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Track,
    Album,
    Artist,
    Playlist,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Track => "track",
            MediaKind::Album => "album",
            MediaKind::Artist => "artist",
            MediaKind::Playlist => "playlist",
        }
    }

    /// Album and playlist contexts have a stable track order, so playback can
    /// resume in the middle of them. Artist radio has none.
    pub fn supports_mid_context_resume(&self) -> bool {
        matches!(self, MediaKind::Album | MediaKind::Playlist)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = MediaRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "track" => Ok(MediaKind::Track),
            "album" => Ok(MediaKind::Album),
            "artist" => Ok(MediaKind::Artist),
            "playlist" => Ok(MediaKind::Playlist),
            other => Err(MediaRefError::UnknownKind(other.to_string())),
        }
    }
}

/// Pointer to a track, album, artist or playlist, written
/// `provider:kind:id` (e.g. `subsonic:album:100`, `spotify:track:4uLU6h`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MediaRef {
    pub provider: String,
    pub kind: MediaKind,
    pub id: String,
}

impl MediaRef {
    pub fn new(provider: impl Into<String>, kind: MediaKind, id: impl Into<String>) -> Self {
        Self {
            provider: normalize_provider(&provider.into()),
            kind,
            id: id.into(),
        }
    }

    pub fn track(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(provider, MediaKind::Track, id)
    }

    pub fn album(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(provider, MediaKind::Album, id)
    }

    pub fn artist(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(provider, MediaKind::Artist, id)
    }

    pub fn playlist(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(provider, MediaKind::Playlist, id)
    }
}

/// Navidrome is a Subsonic server; tags written by either tool are the same.
fn normalize_provider(provider: &str) -> String {
    match provider.trim().to_ascii_lowercase().as_str() {
        "navidrome" => "subsonic".to_string(),
        other => other.to_string(),
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.provider, self.kind, self.id)
    }
}

impl FromStr for MediaRef {
    type Err = MediaRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(provider), Some(kind), Some(id))
                if !provider.is_empty() && !id.is_empty() =>
            {
                Ok(MediaRef::new(provider, kind.parse()?, id))
            }
            _ => Err(MediaRefError::Malformed(s.to_string())),
        }
    }
}

impl Serialize for MediaRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MediaRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_ref() {
        let media: MediaRef = "subsonic:album:100".parse().unwrap();
        assert_eq!(media.provider, "subsonic");
        assert_eq!(media.kind, MediaKind::Album);
        assert_eq!(media.id, "100");
        assert_eq!(media.to_string(), "subsonic:album:100");
    }

    #[test]
    fn test_navidrome_alias() {
        let media: MediaRef = "navidrome:playlist:42".parse().unwrap();
        assert_eq!(media, MediaRef::playlist("subsonic", "42"));
    }

    #[test]
    fn test_id_may_contain_colons() {
        let media: MediaRef = "subsonic:track:al-1:tr-2".parse().unwrap();
        assert_eq!(media.id, "al-1:tr-2");
    }

    #[test]
    fn test_invalid_references() {
        assert!(matches!(
            "spotify:album".parse::<MediaRef>(),
            Err(MediaRefError::Malformed(_))
        ));
        assert!(matches!(
            "spotify:show:abc".parse::<MediaRef>(),
            Err(MediaRefError::UnknownKind(kind)) if kind == "show"
        ));
        assert!(matches!(
            ":album:1".parse::<MediaRef>(),
            Err(MediaRefError::Malformed(_))
        ));
    }

    #[test]
    fn test_mid_context_resume_support() {
        assert!(MediaKind::Album.supports_mid_context_resume());
        assert!(MediaKind::Playlist.supports_mid_context_resume());
        assert!(!MediaKind::Artist.supports_mid_context_resume());
        assert!(!MediaKind::Track.supports_mid_context_resume());
    }
}
