//! INI persistence for [`DumpConfig`].
//!
//! The file lives at `<user config dir>/dumpmill/config.ini`. A missing
//! file loads as the defaults; a missing key falls back to its default,
//! so upgrading the tool never invalidates an existing file.

use std::io;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use super::DumpConfig;

/// Errors from loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read or parsed.
    #[error("failed to load config {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    /// The file or its directory could not be written.
    #[error("failed to save config {path}: {source}")]
    SaveFailed { path: PathBuf, source: io::Error },

    /// A key holds a value of the wrong type.
    #[error("invalid config value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Result type for config file operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Path of the configuration file.
///
/// `<user config dir>/dumpmill/config.ini`, or `./dumpmill.ini` when the
/// platform has no config directory.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("dumpmill").join("config.ini"))
        .unwrap_or_else(|| PathBuf::from("dumpmill.ini"))
}

impl DumpConfig {
    /// Load the configuration from the default file location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load the configuration from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.is_file() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config = Self::default();

        if let Some(value) = get(&ini, "storage", "data_dir") {
            config.data_dir = PathBuf::from(value);
        }
        if let Some(value) = get(&ini, "download", "segments") {
            config.segments = parse_key("download.segments", value)?;
            config.segments = config.segments.max(1);
        }
        if let Some(value) = get(&ini, "download", "timeout") {
            config.timeout_secs = parse_key("download.timeout", value)?;
        }
        if let Some(value) = get(&ini, "convert", "records_per_chunk") {
            config.records_per_chunk = parse_key("convert.records_per_chunk", value)?;
            config.records_per_chunk = config.records_per_chunk.max(1);
        }

        Ok(config)
    }

    /// Save the configuration to the default file location, creating the
    /// directory when needed.
    pub fn save(&self) -> ConfigResult<PathBuf> {
        let path = config_file_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save the configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let save_err = |source: io::Error| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(save_err)?;
        }

        let mut ini = Ini::new();
        ini.with_section(Some("storage"))
            .set("data_dir", self.data_dir.to_string_lossy().as_ref());
        ini.with_section(Some("download"))
            .set("segments", self.segments.to_string())
            .set("timeout", self.timeout_secs.to_string());
        ini.with_section(Some("convert"))
            .set("records_per_chunk", self.records_per_chunk.to_string());

        ini.write_to_file(path).map_err(save_err)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }
}

fn get<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section)).and_then(|s| s.get(key))
}

fn parse_key<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
