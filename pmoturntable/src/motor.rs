//! Stepper motor spinning the platter.
//!
//! The commutation sequence runs on its own thread. The only state shared
//! with the control thread is the run flag; the coil outputs are owned by
//! whoever holds the [`Coils`], which is the worker thread while it runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_hal::digital::{OutputPin, PinState};
use tracing::{debug, error, info, warn};

/// Half-step commutation table for a 4-phase unipolar stepper.
///
/// Traversed top to bottom; the traversal order alone sets the direction.
pub const COMMUTATION_TABLE: [[bool; 4]; 8] = [
    [true, false, false, true],
    [true, false, false, false],
    [true, true, false, false],
    [false, true, false, false],
    [false, true, true, false],
    [false, false, true, false],
    [false, false, true, true],
    [false, false, false, true],
];

pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotorState {
    Stopped,
    Running,
}

/// Rotate/stop actuator capability.
pub trait Motor: Send {
    /// Starts rotating. No-op when already running.
    fn start(&mut self);

    /// Asks the rotation to stop. Returns without waiting for the outputs
    /// to be released. No-op when already stopped.
    fn stop(&mut self);

    fn state(&self) -> MotorState;

    /// Stops and waits until the outputs are de-energized.
    fn shutdown(&mut self) {
        self.stop();
    }
}

impl<M: Motor + ?Sized> Motor for Box<M> {
    fn start(&mut self) {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn state(&self) -> MotorState {
        (**self).state()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}

/// The four coil output lines.
pub struct Coils<P> {
    pins: [P; 4],
}

impl<P: OutputPin> Coils<P> {
    pub fn new(pins: [P; 4]) -> Self {
        Self { pins }
    }

    fn write(&mut self, vector: &[bool; 4]) -> Result<(), P::Error> {
        for (pin, level) in self.pins.iter_mut().zip(vector) {
            pin.set_state(PinState::from(*level))?;
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), P::Error> {
        self.write(&[false; 4])
    }

    pub fn into_pins(self) -> [P; 4] {
        self.pins
    }
}

/// Stepper driven through four [`OutputPin`]s.
pub struct StepperMotor<P: OutputPin + Send + 'static> {
    running: Arc<AtomicBool>,
    step_delay: Duration,
    /// Present while no worker owns the outputs.
    coils: Option<Coils<P>>,
    worker: Option<JoinHandle<Coils<P>>>,
}

impl<P: OutputPin + Send + 'static> StepperMotor<P> {
    pub fn new(pins: [P; 4], step_delay: Duration) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            step_delay,
            coils: Some(Coils::new(pins)),
            worker: None,
        }
    }

    fn worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Joins a finished (or finishing) worker and takes the outputs back.
    fn reclaim(&mut self) {
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(coils) => self.coils = Some(coils),
                Err(_) => error!("Stepper thread panicked, coil outputs are lost"),
            }
        }
    }

    /// Gives the output lines back once the motor is shut down.
    pub fn into_pins(mut self) -> Option<[P; 4]> {
        self.shutdown();
        self.coils.take().map(Coils::into_pins)
    }
}

impl<P: OutputPin + Send + 'static> Motor for StepperMotor<P> {
    fn start(&mut self) {
        if self.running.load(Ordering::Acquire) && self.worker_alive() {
            return;
        }

        // The previous worker may still be finishing its last micro-step
        self.running.store(false, Ordering::Release);
        self.reclaim();

        let Some(coils) = self.coils.take() else {
            error!("Stepper outputs unavailable, cannot start");
            return;
        };

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let step_delay = self.step_delay;

        match thread::Builder::new()
            .name("stepper".to_string())
            .spawn(move || run_commutation(coils, running, step_delay))
        {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                error!(error = %e, "Cannot spawn stepper thread");
            }
        }
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
    }

    fn state(&self) -> MotorState {
        if self.running.load(Ordering::Acquire) && self.worker_alive() {
            MotorState::Running
        } else {
            MotorState::Stopped
        }
    }

    fn shutdown(&mut self) {
        self.stop();
        self.reclaim();

        // After a driver failure the worker leaves the last vector applied;
        // at exit we still try to release the coils.
        if let Some(coils) = self.coils.as_mut() {
            match coils.release() {
                Ok(()) => debug!("Stepper outputs de-energized"),
                Err(e) => error!(error = ?e, "Cannot de-energize stepper outputs"),
            }
        }
    }
}

impl<P: OutputPin + Send + 'static> Drop for StepperMotor<P> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

/// Worker loop: steps through the table until the run flag drops.
///
/// A failed write aborts the loop and leaves the outputs in their last
/// state.
fn run_commutation<P: OutputPin>(
    mut coils: Coils<P>,
    running: Arc<AtomicBool>,
    step_delay: Duration,
) -> Coils<P> {
    info!("Motor: starting rotation");

    'rotation: loop {
        for vector in COMMUTATION_TABLE.iter() {
            if !running.load(Ordering::Acquire) {
                break 'rotation;
            }
            if let Err(e) = coils.write(vector) {
                error!(error = ?e, "Stepper output write failed, aborting rotation");
                running.store(false, Ordering::Release);
                return coils;
            }
            thread::sleep(step_delay);
        }
    }

    if let Err(e) = coils.release() {
        warn!(error = ?e, "Stepper outputs could not be released");
    }
    info!("Motor: stopped");
    coils
}
