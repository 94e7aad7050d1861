//! # pmospotify - Backend Spotify Connect pour le tourne-disque
//!
//! Jeton d'accès rafraîchi à partir d'un refresh token, lecture pilotée
//! par la Web API sur un appareil Spotify Connect.

pub mod auth;
pub mod backend;
pub mod client;
pub mod error;
pub mod models;

pub use auth::TokenManager;
pub use backend::SpotifyBackend;
pub use client::SpotifyClient;
pub use error::{Result, SpotifyError};
pub use models::{CurrentPlayback, Device, PlayOffset, PlayRequest, Track};
