//! Tonearm state machine.
//!
//! Each poll cycle reads the arm sensor, applies the `Idle`/`Spinning`
//! transitions to the motor and the playback backend, and while spinning
//! watches the tag reader for a new record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backend::PlaybackBackend;
use crate::hardware::{ArmSensor, TagReader};
use crate::motor::Motor;
use crate::tags::{TagId, TagRegistry};

pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TonearmState {
    Idle,
    Spinning,
}

pub struct TonearmController<S, R, M, B> {
    sensor: S,
    reader: R,
    motor: M,
    backend: B,
    registry: TagRegistry,
    state: TonearmState,
    last_seen_tag: Option<TagId>,
}

impl<S, R, M, B> TonearmController<S, R, M, B>
where
    S: ArmSensor,
    R: TagReader,
    M: Motor,
    B: PlaybackBackend,
{
    pub fn new(sensor: S, reader: R, motor: M, backend: B, registry: TagRegistry) -> Self {
        Self {
            sensor,
            reader,
            motor,
            backend,
            registry,
            state: TonearmState::Idle,
            last_seen_tag: None,
        }
    }

    pub fn state(&self) -> TonearmState {
        self.state
    }

    pub fn last_seen_tag(&self) -> Option<&TagId> {
        self.last_seen_tag.as_ref()
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// One evaluation of the state machine.
    pub fn poll(&mut self) {
        let began_spinning = self.state == TonearmState::Spinning;

        match self.sensor.is_arm_down() {
            Ok(true) if self.state == TonearmState::Idle => self.arm_lowered(),
            Ok(false) if self.state == TonearmState::Spinning => self.arm_lifted(),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Cannot read arm sensor, skipping cycle");
                return;
            }
        }

        if began_spinning && self.state == TonearmState::Spinning {
            self.scan_tag();
        }
    }

    fn arm_lowered(&mut self) {
        info!("Arm down");
        self.state = TonearmState::Spinning;
        self.motor.start();
        if let Err(e) = self.backend.resume() {
            warn!(error = %e, "Resume failed");
        }
    }

    fn arm_lifted(&mut self) {
        info!("Arm up");
        self.state = TonearmState::Idle;
        self.last_seen_tag = None;
        self.motor.stop();
        if let Err(e) = self.backend.pause() {
            warn!(error = %e, "Pause failed");
        }
    }

    fn scan_tag(&mut self) {
        let tag = match self.reader.read_tag() {
            Ok(Some(tag)) => tag,
            // Removing the record does not pause, only the arm does
            Ok(None) => return,
            Err(e) => {
                debug!(error = %e, "Tag read failed");
                return;
            }
        };

        if self.last_seen_tag.as_ref() == Some(&tag) {
            return;
        }

        info!(tag = %tag, "New tag detected");
        self.last_seen_tag = Some(tag.clone());

        let Some(media) = self.registry.lookup(&tag) else {
            warn!(tag = %tag, "Unknown tag, nothing to play");
            return;
        };

        info!(tag = %tag, media = %media, "Playing");
        if let Err(e) = self.backend.play(media) {
            warn!(media = %media, error = %e, "Play failed");
        }
    }

    /// Polls every `period` until `shutdown` is raised, then stops the
    /// motor and waits for its outputs to be released.
    pub fn run(&mut self, period: Duration, shutdown: &AtomicBool) {
        info!(period_ms = period.as_millis() as u64, "Tonearm controller running");

        while !shutdown.load(Ordering::Acquire) {
            let started = Instant::now();
            self.poll();
            if let Some(remaining) = period.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }

        self.shutdown();
    }

    /// Stops the platter and returns to `Idle`. Playback is left as is.
    pub fn shutdown(&mut self) {
        info!("Tonearm controller shutting down");
        self.motor.shutdown();
        self.state = TonearmState::Idle;
        self.last_seen_tag = None;
    }
}
