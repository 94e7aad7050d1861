//! # pmosubsonic - Backend Subsonic / Navidrome pour le tourne-disque
//!
//! Résolution des références (`subsonic:album:100`, ...) via l'API REST
//! Subsonic, lecture des URLs de streaming signées par un lecteur local.
//!
//! ```no_run
//! use std::time::Duration;
//! use pmosubsonic::{Credentials, MpvPlayer, SubsonicBackend, SubsonicClient};
//! use pmoturntable::{MediaRef, PlaybackBackend};
//!
//! let credentials = Credentials::new("alice", "secret", "RPiPlayer", "1.16.1");
//! let client = SubsonicClient::new("https://music.example.org", credentials, Duration::from_secs(10));
//! let mut backend = SubsonicBackend::new(client, MpvPlayer::new("mpv", "/tmp/mpv.sock"));
//! backend.play(&MediaRef::album("subsonic", "100"))?;
//! # Ok::<(), pmoturntable::BackendError>(())
//! ```

pub mod auth;
pub mod backend;
pub mod client;
pub mod error;
pub mod models;
pub mod player;

pub use auth::Credentials;
pub use backend::SubsonicBackend;
pub use client::SubsonicClient;
pub use error::{PlayerError, Result, SubsonicError};
pub use models::{Album, Artist, Playlist, SearchResult3, Song};
pub use player::{MpvPlayer, PlayerState, PlayerStatus, QueuePlayer};
