//! Core of the RFID turntable: tonearm state machine, stepper motor, tag
//! registry and the playback capability implemented by the streaming
//! backends (`pmosubsonic`, `pmospotify`).

pub mod backend;
pub mod controller;
pub mod errors;
pub mod hardware;
pub mod media;
pub mod motor;
pub mod sim;
pub mod snapshot;
pub mod tags;

#[cfg(feature = "rpi")]
pub mod rpi;

pub use backend::{PlaybackBackend, RetryingBackend};
pub use controller::{DEFAULT_POLL_PERIOD, TonearmController, TonearmState};
pub use errors::{BackendError, HardwareError, MediaRefError};
pub use hardware::{ArmSensor, HallSensor, TagReader};
pub use media::{MediaKind, MediaRef};
pub use motor::{COMMUTATION_TABLE, DEFAULT_STEP_DELAY, Motor, MotorState, StepperMotor};
pub use snapshot::{PlaybackSnapshot, ResumePoint};
pub use tags::{TagId, TagRegistry};
