//! # PMOTurntable Configuration Module
//!
//! Configuration management for the turntable, including:
//! - Loading configuration from a YAML file
//! - Merging with the embedded default configuration
//! - Environment variable overrides, including the legacy names the
//!   installation scripts write to a `.env` file
//! - Startup validation of the credentials required by the selected backend
//!
//! There is no global instance: the binary loads one [`Config`] at startup
//! and hands references to the components that need it.
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::Config;
//!
//! let config = Config::load("")?;
//! config.validate()?;
//! println!("tags: {}", config.tags_path().display());
//! # Ok::<(), pmoconfig::ConfigError>(())
//! ```

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};

mod settings;

pub use settings::{
    BackendConfig, HallSensorConfig, LoggerConfig, PlayerConfig, Provider, RetryConfig,
    RfidConfig, SpotifyConfig, StepperConfig, SubsonicConfig, TurntableConfig,
};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmoturntable.yaml");

const CONFIG_FILE: &str = "config.yaml";
const ENV_CONFIG_DIR: &str = "PMOTURNTABLE_CONFIG";
const ENV_PREFIX: &str = "PMOTURNTABLE_CONFIG__";
const DEFAULT_DIR_NAME: &str = ".pmoturntable";
const DOTENV_FILE: &str = ".env";

/// Variables written to `.env` by the installation scripts.
///
/// Applied in table order, so a later name wins over an earlier one for the
/// same setting (`NAVIDROME_*` over `SUBSONIC_*`). They are applied before
/// the prefixed overrides, so an explicit `PMOTURNTABLE_CONFIG__...`
/// variable always wins.
const LEGACY_ENV_ALIASES: &[(&str, &[&str])] = &[
    ("SUBSONIC_URL", &["subsonic", "url"]),
    ("SUBSONIC_USER", &["subsonic", "username"]),
    ("SUBSONIC_PASS", &["subsonic", "password"]),
    ("NAVIDROME_URL", &["subsonic", "url"]),
    ("NAVIDROME_USER", &["subsonic", "username"]),
    ("NAVIDROME_PASS", &["subsonic", "password"]),
    ("SPOTIFY_CLIENT_ID", &["spotify", "client_id"]),
    ("SPOTIFY_CLIENT_SECRET", &["spotify", "client_secret"]),
    ("SPOTIFY_REFRESH_TOKEN", &["spotify", "refresh_token"]),
    ("SPOTIFY_DEVICE_NAME", &["spotify", "device_name"]),
];

/// Errors raised while loading or validating the configuration.
///
/// All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Missing required setting '{0}'")]
    Missing(String),

    #[error("Invalid setting '{key}': {reason}")]
    Invalid { key: String, reason: String },

    #[error("Current node is not a map at '{0}'")]
    NotAMap(String),
}

/// Typed turntable configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(skip)]
    config_dir: PathBuf,
    pub logger: LoggerConfig,
    pub turntable: TurntableConfig,
    pub backend: BackendConfig,
    pub subsonic: SubsonicConfig,
    pub spotify: SpotifyConfig,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    ///
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOTURNTABLE_CONFIG` environment variable
    /// 3. `.pmoturntable` in the current directory
    /// 4. `.pmoturntable` in the user's home directory
    pub fn find_config_dir(directory: &str) -> PathBuf {
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Using config directory from env");
            return PathBuf::from(env_path);
        }

        let local = Path::new(DEFAULT_DIR_NAME);
        if local.exists() {
            return local.to_path_buf();
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(DEFAULT_DIR_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        local.to_path_buf()
    }

    /// Loads the configuration using `./.env` and the process environment
    /// for overrides, the process environment taking precedence.
    pub fn load(directory: &str) -> Result<Self, ConfigError> {
        let config_dir = Self::find_config_dir(directory);
        let vars = read_dotenv(Path::new(DOTENV_FILE))
            .into_iter()
            .chain(env::vars());
        Self::load_from(&config_dir, vars)
    }

    /// Loads the configuration from `config_dir`, applying overrides taken
    /// from `vars` instead of the process environment.
    ///
    /// This method:
    /// 1. Loads the default embedded configuration
    /// 2. Merges it with `config.yaml` from `config_dir` if present
    /// 3. Lower-cases every key
    /// 4. Reads `config_dir/.env`, then `vars` on top of it
    /// 5. Applies the legacy aliases, then the prefixed overrides
    pub fn load_from<I>(config_dir: &Path, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        info!(config_dir = %config_dir.display(), "Using config directory");

        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG).map_err(|source| {
            ConfigError::Parse {
                origin: "embedded defaults".to_string(),
                source,
            }
        })?;

        let config_file = config_dir.join(CONFIG_FILE);
        if config_file.exists() {
            let data = fs::read(&config_file).map_err(|source| ConfigError::Read {
                path: config_file.display().to_string(),
                source,
            })?;
            let external: Value =
                serde_yaml::from_slice(&data).map_err(|source| ConfigError::Parse {
                    origin: config_file.display().to_string(),
                    source,
                })?;
            info!(config_file = %config_file.display(), "Loaded config file");
            merge_yaml(&mut value, &lower_keys_value(external));
        } else {
            info!(config_file = %config_file.display(), "Config file not found, using embedded defaults");
        }

        let mut overrides: BTreeMap<String, String> =
            read_dotenv(&config_dir.join(DOTENV_FILE)).into_iter().collect();
        overrides.extend(vars);

        let mut value = lower_keys_value(value);
        apply_env_overrides(&mut value, &overrides)?;

        let mut config: Config =
            serde_yaml::from_value(value).map_err(|source| ConfigError::Parse {
                origin: "merged configuration".to_string(),
                source,
            })?;
        config.config_dir = config_dir.to_path_buf();
        Ok(config)
    }

    /// Checks that everything the selected backend and the hardware need is
    /// present. Missing credentials are configuration errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.turntable.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "turntable.poll_interval_ms".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.turntable.stepper.pins.len() != 4 {
            return Err(ConfigError::Invalid {
                key: "turntable.stepper.pins".to_string(),
                reason: format!(
                    "expected 4 output lines, got {}",
                    self.turntable.stepper.pins.len()
                ),
            });
        }

        if self.backend.retry.attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "backend.retry.attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        match self.backend.provider {
            Provider::Subsonic => {
                require("subsonic.url", &self.subsonic.url)?;
                require("subsonic.username", &self.subsonic.username)?;
                require("subsonic.password", &self.subsonic.password)?;
            }
            Provider::Spotify => {
                require("spotify.client_id", &self.spotify.client_id)?;
                require("spotify.client_secret", &self.spotify.client_secret)?;
                require("spotify.refresh_token", &self.spotify.refresh_token)?;
            }
        }

        Ok(())
    }

    /// Directory the configuration was loaded from.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the tag mapping file, resolved against the config directory
    /// when relative.
    pub fn tags_path(&self) -> PathBuf {
        let path = Path::new(&self.turntable.tags_file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

fn require(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(key.to_string()))
    } else {
        Ok(())
    }
}

/// Reads a dotenv file. A missing file is not an error; unreadable lines
/// are skipped with a warning.
fn read_dotenv(path: &Path) -> Vec<(String, String)> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read dotenv file");
            return Vec::new();
        }
    };

    let vars: Vec<(String, String)> = iter
        .filter_map(|item| match item {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping dotenv entry");
                None
            }
        })
        .collect();
    info!(path = %path.display(), count = vars.len(), "Loaded dotenv file");
    vars
}

fn apply_env_overrides(
    config: &mut Value,
    vars: &BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for (name, path) in LEGACY_ENV_ALIASES {
        if let Some(value) = vars.get(*name) {
            debug!(env_var = %name, "Applying legacy environment alias");
            // Les secrets restent des chaînes, même s'ils ressemblent à des nombres
            set_value_internal(config, path, Value::String(value.clone()))?;
        }
    }

    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path = rest
            .split("__")
            .map(|s| s.to_lowercase())
            .collect::<Vec<_>>();
        let key_path: Vec<&str> = key_path.iter().map(String::as_str).collect();
        set_value_internal(config, &key_path, convert_env_value(value))?;
    }

    Ok(())
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<(), ConfigError> {
    let Some((head, tail)) = path.split_first() else {
        *data = value;
        return Ok(());
    };

    match data {
        Value::Mapping(map) => {
            let key = Value::String(head.to_lowercase());
            if tail.is_empty() {
                map.insert(key, value);
            } else {
                let entry = map
                    .entry(key)
                    .or_insert(Value::Mapping(Mapping::new()));
                set_value_internal(entry, tail, value)?;
            }
            Ok(())
        }
        _ => Err(ConfigError::NotAMap(path.join("."))),
    }
}

fn convert_env_value(value: &str) -> Value {
    match serde_yaml::from_str::<Value>(value) {
        Ok(Value::Null) | Err(_) => Value::String(value.to_string()),
        Ok(parsed) => parsed,
    }
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(key, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings, keys from `external` are merged recursively
/// - For scalars and sequences, `external` replaces `default`
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(), // pour les scalaires ou séquences, on remplace
    }
}
