//! Desk hardware: sensor, reader and motor driven from software.
//!
//! The handles are cheap clones sharing state with the device given to the
//! controller, so a script (or a test) can move the arm and swap records
//! while the controller polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::errors::HardwareError;
use crate::hardware::{ArmSensor, TagReader};
use crate::motor::{Motor, MotorState};
use crate::tags::TagId;

#[derive(Clone, Default)]
pub struct SimulatedArm {
    down: Arc<AtomicBool>,
}

impl SimulatedArm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lower(&self) {
        info!("[sim] arm lowered");
        self.down.store(true, Ordering::Release);
    }

    pub fn lift(&self) {
        info!("[sim] arm lifted");
        self.down.store(false, Ordering::Release);
    }
}

impl ArmSensor for SimulatedArm {
    fn is_arm_down(&mut self) -> Result<bool, HardwareError> {
        Ok(self.down.load(Ordering::Acquire))
    }
}

#[derive(Clone, Default)]
pub struct SimulatedTagReader {
    tag: Arc<Mutex<Option<TagId>>>,
}

impl SimulatedTagReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn present(&self, tag: TagId) {
        info!(tag = %tag, "[sim] tag placed");
        if let Ok(mut slot) = self.tag.lock() {
            *slot = Some(tag);
        }
    }

    pub fn remove(&self) {
        info!("[sim] tag removed");
        if let Ok(mut slot) = self.tag.lock() {
            *slot = None;
        }
    }
}

impl TagReader for SimulatedTagReader {
    fn read_tag(&mut self) -> Result<Option<TagId>, HardwareError> {
        self.tag
            .lock()
            .map(|slot| slot.clone())
            .map_err(|_| HardwareError::Reader("simulated reader poisoned".to_string()))
    }
}

/// Motor that only logs its transitions.
#[derive(Debug)]
pub struct LoggingMotor {
    state: MotorState,
}

impl LoggingMotor {
    pub fn new() -> Self {
        Self {
            state: MotorState::Stopped,
        }
    }
}

impl Default for LoggingMotor {
    fn default() -> Self {
        Self::new()
    }
}

impl Motor for LoggingMotor {
    fn start(&mut self) {
        if self.state == MotorState::Stopped {
            info!("Motor: starting rotation");
            self.state = MotorState::Running;
        }
    }

    fn stop(&mut self) {
        if self.state == MotorState::Running {
            info!("Motor: stopped");
            self.state = MotorState::Stopped;
        }
    }

    fn state(&self) -> MotorState {
        self.state
    }
}
