//! Playback capability driven by the tonearm.
//!
//! Each provider (direct-stream Subsonic, token-auth Spotify, ...) is a
//! separate type implementing [`PlaybackBackend`] and owning its own
//! [`PlaybackSnapshot`](crate::PlaybackSnapshot).

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::errors::BackendError;
use crate::media::MediaRef;

/// Play / pause / resume against a remote music service.
///
/// All calls are synchronous and may block on network I/O.
pub trait PlaybackBackend: Send {
    /// Starts `media`, resuming at the cached position when the cached
    /// snapshot belongs to the same context.
    fn play(&mut self, media: &MediaRef) -> Result<(), BackendError>;

    /// Captures the live playback position into the snapshot, then pauses.
    fn pause(&mut self) -> Result<(), BackendError>;

    /// Continues from the snapshot. No-op when nothing was paused or when
    /// something is already playing.
    fn resume(&mut self) -> Result<(), BackendError>;
}

impl<B: PlaybackBackend + ?Sized> PlaybackBackend for Box<B> {
    fn play(&mut self, media: &MediaRef) -> Result<(), BackendError> {
        (**self).play(media)
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        (**self).pause()
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        (**self).resume()
    }
}

/// Bounded retry around another backend.
///
/// Only transient errors are retried; the delay grows linearly with the
/// attempt number. With `attempts == 1` calls are passed through untouched.
pub struct RetryingBackend<B> {
    inner: B,
    attempts: u32,
    backoff: Duration,
}

impl<B: PlaybackBackend> RetryingBackend<B> {
    pub fn new(inner: B, attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn with_retry<F>(&mut self, operation: &str, mut call: F) -> Result<(), BackendError>
    where
        F: FnMut(&mut B) -> Result<(), BackendError>,
    {
        let mut attempt = 1;
        loop {
            match call(&mut self.inner) {
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "Transient backend error, retrying"
                    );
                    thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl<B: PlaybackBackend> PlaybackBackend for RetryingBackend<B> {
    fn play(&mut self, media: &MediaRef) -> Result<(), BackendError> {
        self.with_retry("play", |backend| backend.play(media))
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        self.with_retry("pause", |backend| backend.pause())
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        self.with_retry("resume", |backend| backend.resume())
    }
}
