//! Typed sections of the configuration tree.

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

/// Playback provider selected for the tonearm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Subsonic-compatible server (Navidrome, Airsonic, ...), direct streaming.
    #[serde(alias = "navidrome")]
    Subsonic,
    /// Spotify Connect, OAuth refresh-token authentication.
    Spotify,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    /// Minimum log level when `RUST_LOG` is not set.
    #[serde(deserialize_with = "lenient_string")]
    pub min_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurntableConfig {
    /// Period of the control loop.
    pub poll_interval_ms: u64,
    /// Tag → media mapping file (relative to the config directory).
    #[serde(deserialize_with = "lenient_string")]
    pub tags_file: String,
    pub hall_sensor: HallSensorConfig,
    pub stepper: StepperConfig,
    pub rfid: RfidConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HallSensorConfig {
    /// BCM line number of the arm sensor.
    pub pin: u8,
    /// With the pull-up wiring the magnet pulls the line low.
    pub active_low: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepperConfig {
    /// BCM line numbers of the four coil outputs, in commutation order.
    pub pins: Vec<u8>,
    /// Delay between two micro-steps.
    pub step_delay_us: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RfidConfig {
    pub spi_bus: u8,
    pub chip_select: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub provider: Provider,
    /// Global deadline applied to every HTTP call of the backend.
    pub http_timeout_secs: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts per backend call (1 = no retry).
    pub attempts: u32,
    /// Base delay, multiplied by the attempt number.
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicConfig {
    #[serde(deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(deserialize_with = "lenient_string")]
    pub password: String,
    #[serde(deserialize_with = "lenient_string")]
    pub client_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub api_version: String,
    /// Number of search results requested when expanding an artist.
    pub artist_song_count: u32,
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    #[serde(deserialize_with = "lenient_string")]
    pub mpv_path: String,
    #[serde(deserialize_with = "lenient_string")]
    pub ipc_socket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyConfig {
    #[serde(deserialize_with = "lenient_string")]
    pub client_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub client_secret: String,
    #[serde(deserialize_with = "lenient_string")]
    pub refresh_token: String,
    /// Spotify Connect device to target; empty means the active device.
    #[serde(deserialize_with = "lenient_string")]
    pub device_name: String,
}

impl SpotifyConfig {
    pub fn device_name(&self) -> Option<&str> {
        let name = self.device_name.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// Accepts any YAML scalar as a string.
///
/// Environment overrides are parsed as YAML, so a numeric password such as
/// `0042` arrives as a number.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar, got {:?}",
            other
        ))),
    }
}
