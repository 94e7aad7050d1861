//! Raspberry Pi wiring: Hall switch and stepper on GPIO, MFRC522 on SPI.

use std::time::Duration;

use mfrc522::comm::Interface;
use mfrc522::comm::blocking::spi::SpiInterface;
use mfrc522::{Initialized, Mfrc522};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::spi::{Bus, Mode, SimpleHalSpiDevice, SlaveSelect, Spi};
use tracing::{debug, info};

use crate::errors::HardwareError;
use crate::hardware::{HallSensor, TagReader};
use crate::motor::StepperMotor;
use crate::tags::TagId;

const SPI_CLOCK_HZ: u32 = 1_000_000;

fn gpio() -> Result<Gpio, HardwareError> {
    Gpio::new().map_err(|e| HardwareError::Gpio(e.to_string()))
}

/// Hall switch on `pin` (BCM numbering), with the internal pull-up enabled.
pub fn hall_sensor(pin: u8, active_low: bool) -> Result<HallSensor<InputPin>, HardwareError> {
    let line = gpio()?
        .get(pin)
        .map_err(|e| HardwareError::Gpio(format!("pin {}: {}", pin, e)))?
        .into_input_pullup();
    info!(pin, active_low, "Hall sensor ready");
    Ok(HallSensor::new(line, active_low))
}

/// Stepper on four output lines, all driven low initially.
pub fn stepper_motor(
    pins: [u8; 4],
    step_delay: Duration,
) -> Result<StepperMotor<OutputPin>, HardwareError> {
    let gpio = gpio()?;
    let mut lines = Vec::with_capacity(4);
    for pin in pins {
        let line = gpio
            .get(pin)
            .map_err(|e| HardwareError::Gpio(format!("pin {}: {}", pin, e)))?
            .into_output_low();
        lines.push(line);
    }
    let lines: [OutputPin; 4] = lines
        .try_into()
        .map_err(|_| HardwareError::Gpio("expected four stepper pins".to_string()))?;

    info!(?pins, step_delay_us = step_delay.as_micros() as u64, "Stepper ready");
    Ok(StepperMotor::new(lines, step_delay))
}

/// MFRC522 reader on the given SPI bus and chip select.
pub fn rfid_reader(bus: u8, chip_select: u8) -> Result<impl TagReader, HardwareError> {
    let bus = match bus {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        2 => Bus::Spi2,
        other => return Err(HardwareError::Reader(format!("unsupported SPI bus {}", other))),
    };
    let slave = match chip_select {
        0 => SlaveSelect::Ss0,
        1 => SlaveSelect::Ss1,
        2 => SlaveSelect::Ss2,
        other => {
            return Err(HardwareError::Reader(format!(
                "unsupported chip select {}",
                other
            )));
        }
    };

    let spi = Spi::new(bus, slave, SPI_CLOCK_HZ, Mode::Mode0)
        .map_err(|e| HardwareError::Reader(e.to_string()))?;
    let interface = SpiInterface::new(SimpleHalSpiDevice::new(spi));
    let chip = Mfrc522::new(interface)
        .init()
        .map_err(|e| HardwareError::Reader(format!("init failed: {:?}", e)))?;

    info!("RFID reader ready");
    Ok(Mfrc522Reader { chip })
}

/// Polls for a single card per read.
pub struct Mfrc522Reader<C: Interface> {
    chip: Mfrc522<C, Initialized>,
}

impl<C> TagReader for Mfrc522Reader<C>
where
    C: Interface + Send,
    C::Error: std::fmt::Debug,
{
    fn read_tag(&mut self) -> Result<Option<TagId>, HardwareError> {
        // A card left on the antenna is halted after each read, WUPA wakes it
        let Ok(atqa) = self.chip.wupa() else {
            return Ok(None);
        };

        let uid = self
            .chip
            .select(&atqa)
            .map_err(|e| HardwareError::Reader(format!("select failed: {:?}", e)))?;

        if let Err(e) = self.chip.hlta() {
            debug!(error = ?e, "HLTA not acknowledged");
        }

        Ok(Some(TagId::from_uid_bytes(uid.as_bytes())))
    }
}
