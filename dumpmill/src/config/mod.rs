//! Tool configuration.
//!
//! [`DumpConfig`] carries the handful of knobs the pipeline exposes:
//! where datasets live on disk, how a download is segmented, the HTTP
//! timeout, and how many records go into one chunk file. Values come
//! from built-in defaults, overridden by the INI config file, overridden
//! by CLI flags; [`file`] handles the persistence layer.

mod file;

pub use file::{config_file_path, ConfigError, ConfigResult};

use std::path::PathBuf;
use std::time::Duration;

use crate::convert::DEFAULT_RECORDS_PER_CHUNK;

/// Default number of concurrent download segments per archive.
pub const DEFAULT_SEGMENTS: usize = 4;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for the dump pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpConfig {
    /// Root directory datasets are stored under.
    pub data_dir: PathBuf,

    /// Number of concurrent segments per archive download.
    pub segments: usize,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// Records per chunk file during conversion.
    pub records_per_chunk: usize,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            segments: DEFAULT_SEGMENTS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            records_per_chunk: DEFAULT_RECORDS_PER_CHUNK,
        }
    }
}

impl DumpConfig {
    /// Create a configuration with the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Set the segment count. Values below 1 are clamped to 1.
    pub fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments.max(1);
        self
    }

    /// Set the HTTP timeout in seconds.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the records-per-chunk threshold. Values below 1 are clamped to 1.
    pub fn with_records_per_chunk(mut self, records_per_chunk: usize) -> Self {
        self.records_per_chunk = records_per_chunk.max(1);
        self
    }

    /// The HTTP timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory the rotating log files are written to.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Default storage root: `<user data dir>/dumpmill`, or `./dumpmill-data`
/// when the platform has no data directory.
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("dumpmill"))
        .unwrap_or_else(|| PathBuf::from("dumpmill-data"))
}

/// Format a byte count for display.
///
/// # Example
///
/// ```
/// use dumpmill::config::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(2048), "2.0 KiB");
/// assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DumpConfig::default();
        assert_eq!(config.segments, 4);
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.records_per_chunk, 10_000);
    }

    #[test]
    fn test_builder_pattern() {
        let config = DumpConfig::new("/data/dumps")
            .with_segments(8)
            .with_timeout_secs(60)
            .with_records_per_chunk(500);

        assert_eq!(config.data_dir, PathBuf::from("/data/dumps"));
        assert_eq!(config.segments, 8);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.records_per_chunk, 500);
    }

    #[test]
    fn test_builder_clamps_to_one() {
        let config = DumpConfig::default()
            .with_segments(0)
            .with_records_per_chunk(0);
        assert_eq!(config.segments, 1);
        assert_eq!(config.records_per_chunk, 1);
    }

    #[test]
    fn test_log_dir_under_data_dir() {
        let config = DumpConfig::new("/data/dumps");
        assert_eq!(config.log_dir(), PathBuf::from("/data/dumps/logs"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KiB");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GiB");
        assert_eq!(format_size(u64::MAX).ends_with("TiB"), true);
    }
}
