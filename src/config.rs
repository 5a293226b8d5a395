//! Persisted tester settings
//!
//! Settings live as a single keyed JSON blob inside a settings file. Other
//! keys in the same file are left untouched when saving.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::model::capture::CaptureSource;
use crate::model::relay::RelaySet;
use crate::session::SignalingSessionConfig;

/// Key of the settings blob inside the settings file.
pub const SETTINGS_KEY: &str = "peer_tester_config";

pub const DEFAULT_HOST: &str = "0.peerjs.com";
pub const DEFAULT_PORT: &str = "443";
pub const DEFAULT_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingSettings {
    pub host: String,
    /// Kept as entered, validated when a session starts.
    pub port: String,
    pub path: String,
    pub secure: bool,
}

impl Default for SignalingSettings {
    fn default() -> Self {
        SignalingSettings {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT.to_string(),
            path: DEFAULT_PATH.to_string(),
            secure: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub signaling: SignalingSettings,
    pub relay_servers: RelaySet,
    pub media_source: CaptureSource,
}

impl Settings {
    /// Validates the settings and freezes them into a session config.
    pub fn session_config(&self) -> Result<SignalingSessionConfig, ConfigError> {
        let host = self.signaling.host.trim();
        if host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        let port_text = self.signaling.port.trim();
        let port = match port_text.parse::<u16>() {
            Ok(p) if p > 0 => p,
            _ => return Err(ConfigError::InvalidPort(port_text.to_string())),
        };

        let path = match self.signaling.path.trim() {
            "" => DEFAULT_PATH,
            p if p.starts_with('/') => p,
            p => return Err(ConfigError::InvalidPath(p.to_string())),
        };

        self.relay_servers.validate()?;

        Ok(SignalingSessionConfig {
            host: host.to_string(),
            port,
            path: path.to_string(),
            use_tls: self.signaling.secure,
            relay_servers: self.relay_servers.descriptors().to_vec(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> ConfigStore {
        ConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the settings, falling back to defaults when the file is missing
    /// or the blob cannot be read.
    pub fn load(&self) -> Settings {
        match self.try_load() {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!("No saved settings in {}, using defaults", self.path.display());
                Settings::default()
            }
            Err(e) => {
                warn!("Ignoring saved settings in {}: {}", self.path.display(), e);
                Settings::default()
            }
        }
    }

    fn try_load(&self) -> Result<Option<Settings>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let root: Value = serde_json::from_str(&fs::read_to_string(&self.path)?)?;
        match root.get(SETTINGS_KEY) {
            Some(blob) => Ok(Some(Settings::deserialize(blob)?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let mut root = match fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            Err(_) => Map::new(),
        };
        root.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);
        fs::write(&self.path, serde_json::to_string_pretty(&Value::Object(root))?)?;
        debug!("Settings saved to {}", self.path.display());
        Ok(())
    }
}
