//! Assemblage des composants à partir de la configuration

use std::time::Duration;

use anyhow::Result;
use pmoconfig::{Config, Provider, TurntableConfig};
use pmospotify::{SpotifyBackend, SpotifyClient};
use pmosubsonic::{MpvPlayer, SubsonicBackend, SubsonicClient};
use pmoturntable::sim::{LoggingMotor, SimulatedArm, SimulatedTagReader};
use pmoturntable::{ArmSensor, Motor, PlaybackBackend, RetryingBackend, TagReader};
use tracing::{info, warn};

/// Capteurs et moteur, réels ou simulés
pub struct Hardware {
    pub sensor: Box<dyn ArmSensor>,
    pub reader: Box<dyn TagReader>,
    pub motor: Box<dyn Motor>,
}

/// Backend du fournisseur configuré, enveloppé dans la politique de retry
pub fn build_backend(config: &Config) -> Result<Box<dyn PlaybackBackend>> {
    let timeout = Duration::from_secs(config.backend.http_timeout_secs);

    let backend: Box<dyn PlaybackBackend> = match config.backend.provider {
        Provider::Subsonic => {
            let client = SubsonicClient::from_config(&config.subsonic, timeout);
            // Le serveur peut démarrer après nous : simple avertissement
            if let Err(e) = client.ping() {
                warn!("⚠️ Subsonic server did not answer ping: {}", e);
            }
            let player = MpvPlayer::from_config(&config.subsonic.player);
            info!("🎵 Subsonic backend ready ({})", client.base_url());
            Box::new(SubsonicBackend::new(client, player))
        }
        Provider::Spotify => {
            let mut client = SpotifyClient::from_config(&config.spotify, timeout);
            if let Err(e) = client.authenticate() {
                warn!("⚠️ Spotify authentication failed: {}", e);
            }
            info!("🎵 Spotify backend ready");
            Box::new(SpotifyBackend::new(
                client,
                config.spotify.device_name().map(str::to_string),
            ))
        }
    };

    let retry = &config.backend.retry;
    let backend: Box<dyn PlaybackBackend> = Box::new(RetryingBackend::new(
        backend,
        retry.attempts,
        Duration::from_millis(retry.backoff_ms),
    ));
    Ok(backend)
}

/// Matériel simulé, avec les poignées pour le piloter
pub fn simulated_hardware() -> (Hardware, SimulatedArm, SimulatedTagReader) {
    let arm = SimulatedArm::new();
    let tags = SimulatedTagReader::new();
    let hardware = Hardware {
        sensor: Box::new(arm.clone()),
        reader: Box::new(tags.clone()),
        motor: Box::new(LoggingMotor::new()),
    };
    (hardware, arm, tags)
}

#[cfg(feature = "rpi")]
pub fn raspberry_pi_hardware(config: &TurntableConfig) -> Result<Hardware> {
    use anyhow::Context;
    use pmoturntable::rpi;

    let pins: [u8; 4] = config
        .stepper
        .pins
        .as_slice()
        .try_into()
        .context("turntable.stepper.pins must name 4 lines")?;

    let sensor = rpi::hall_sensor(config.hall_sensor.pin, config.hall_sensor.active_low)
        .context("Cannot set up the Hall sensor")?;
    let motor = rpi::stepper_motor(pins, Duration::from_micros(config.stepper.step_delay_us))
        .context("Cannot set up the stepper motor")?;
    let reader = rpi::rfid_reader(config.rfid.spi_bus, config.rfid.chip_select)
        .context("Cannot set up the RFID reader")?;

    Ok(Hardware {
        sensor: Box::new(sensor),
        reader: Box::new(reader),
        motor: Box::new(motor),
    })
}

#[cfg(not(feature = "rpi"))]
pub fn raspberry_pi_hardware(_config: &TurntableConfig) -> Result<Hardware> {
    anyhow::bail!("built without the `rpi` feature: run with --simulate <TAG> on this machine")
}
