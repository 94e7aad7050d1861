//! Sensing capabilities polled by the controller.

use embedded_hal::digital::InputPin;

use crate::errors::HardwareError;
use crate::tags::TagId;

/// Tonearm position sensor.
pub trait ArmSensor: Send {
    /// `true` while the arm rests on the record.
    fn is_arm_down(&mut self) -> Result<bool, HardwareError>;
}

/// Proximity tag reader.
pub trait TagReader: Send {
    /// Non-blocking read: `Ok(None)` when no tag is in range.
    fn read_tag(&mut self) -> Result<Option<TagId>, HardwareError>;
}

impl<S: ArmSensor + ?Sized> ArmSensor for Box<S> {
    fn is_arm_down(&mut self) -> Result<bool, HardwareError> {
        (**self).is_arm_down()
    }
}

impl<R: TagReader + ?Sized> TagReader for Box<R> {
    fn read_tag(&mut self) -> Result<Option<TagId>, HardwareError> {
        (**self).read_tag()
    }
}

/// Hall effect switch on a digital input.
///
/// Most modules pull the line low when the magnet under the arm is close,
/// hence `active_low`.
pub struct HallSensor<P> {
    pin: P,
    active_low: bool,
}

impl<P: InputPin> HallSensor<P> {
    pub fn new(pin: P, active_low: bool) -> Self {
        Self { pin, active_low }
    }
}

impl<P: InputPin + Send> ArmSensor for HallSensor<P> {
    fn is_arm_down(&mut self) -> Result<bool, HardwareError> {
        let high = self
            .pin
            .is_high()
            .map_err(|e| HardwareError::Sensor(format!("{:?}", e)))?;
        Ok(high != self.active_low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::{Error, ErrorKind, ErrorType};

    #[derive(Debug)]
    struct Broken;

    impl Error for Broken {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    struct Level(Result<bool, ()>);

    impl ErrorType for Level {
        type Error = Broken;
    }

    impl InputPin for Level {
        fn is_high(&mut self) -> Result<bool, Broken> {
            self.0.map_err(|_| Broken)
        }

        fn is_low(&mut self) -> Result<bool, Broken> {
            self.0.map(|high| !high).map_err(|_| Broken)
        }
    }

    #[test]
    fn test_active_low_sensor() {
        assert!(HallSensor::new(Level(Ok(false)), true).is_arm_down().unwrap());
        assert!(!HallSensor::new(Level(Ok(true)), true).is_arm_down().unwrap());
    }

    #[test]
    fn test_active_high_sensor() {
        assert!(HallSensor::new(Level(Ok(true)), false).is_arm_down().unwrap());
        assert!(!HallSensor::new(Level(Ok(false)), false).is_arm_down().unwrap());
    }

    #[test]
    fn test_read_failure() {
        let err = HallSensor::new(Level(Err(())), true)
            .is_arm_down()
            .unwrap_err();
        assert!(matches!(err, HardwareError::Sensor(_)));
    }
}
