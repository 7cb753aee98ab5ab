//! Configuration file support for stepgrid
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/stepgrid/config.toml`
//! - macOS: `~/Library/Application Support/stepgrid/config.toml`
//! - Windows: `%APPDATA%\stepgrid\config.toml`

use crate::error::{Error, Result};
use crate::grid::GridShape;
use crate::timing::{
    Tempo, DEFAULT_BPM, DEFAULT_FRAME_INTERVAL, DEFAULT_LOOKAHEAD_SECONDS, DEFAULT_POLL_INTERVAL,
};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Grid and timing configuration
    pub sequencer: SequencerSettings,
    /// Audio output configuration
    pub audio: AudioSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "stepgrid") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        Self::write_default_config_file(&path)?;
        Ok(path)
    }

    /// Write the commented default config to `path`
    pub fn write_default_config_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = r#"# stepgrid configuration file

[sequencer]
# Initial tempo in beats per minute (one grid row = one sixteenth note)
tempo = 120.0

# Pattern length in rows (steps)
rows = 16

# Number of drum voices (columns)
columns = 8

# Multiplier used to encode a cell as row * row_stride + column.
# Defaults to the number of rows, or the number of columns if that is larger;
# must be at least the number of columns.
# row_stride = 16

# How far ahead of the audio clock steps are committed, in milliseconds
lookahead_ms = 100

# How often the scheduler polls the audio clock, in milliseconds
poll_interval_ms = 25

# How often the playing row is reconciled for display, in milliseconds
frame_interval_ms = 16

[audio]
# Output device name (see `stepgrid devices`); default device when unset
# output_device = "default"

# Output sample rate; device default when unset
# sample_rate = 48000

# Master gain applied to every voice
gain = 0.8
"#;

        fs::write(path, content)?;
        Ok(())
    }
}

/// Grid and timing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSettings {
    /// Initial tempo in BPM
    pub tempo: f64,
    /// Pattern length in rows
    pub rows: usize,
    /// Number of voice columns
    pub columns: usize,
    /// Cell encoding stride (defaults to the larger of `rows` and `columns`)
    pub row_stride: Option<usize>,
    /// Lookahead window in milliseconds
    pub lookahead_ms: u64,
    /// Scheduler poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Reconciler frame interval in milliseconds
    pub frame_interval_ms: u64,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            tempo: DEFAULT_BPM,
            rows: 16,
            columns: 8,
            row_stride: None,
            lookahead_ms: (DEFAULT_LOOKAHEAD_SECONDS * 1000.0) as u64,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL.as_millis() as u64,
        }
    }
}

impl SequencerSettings {
    /// The grid described by `rows`, `columns` and `row_stride`
    ///
    /// Without an explicit stride, `rows` is used, raised to `columns` when
    /// the grid is wider than it is long.
    pub fn grid_shape(&self) -> Result<GridShape> {
        let stride = self.row_stride.unwrap_or(self.rows.max(self.columns));
        GridShape::new(self.rows, self.columns, stride)
    }

    /// The configured initial tempo
    pub fn initial_tempo(&self) -> Result<Tempo> {
        Tempo::new(self.tempo)
    }

    /// Lookahead window in seconds
    pub fn lookahead_seconds(&self) -> f64 {
        self.lookahead_ms as f64 / 1000.0
    }

    /// Scheduler poll interval (at least 1ms)
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Reconciler frame interval (at least 1ms)
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Check that the settings describe a usable engine
    pub fn validate(&self) -> Result<()> {
        self.grid_shape()?;
        self.initial_tempo()?;
        if self.lookahead_ms == 0 {
            return Err(Error::Config("lookahead_ms must be positive".to_string()));
        }
        if self.lookahead_ms <= self.poll_interval_ms {
            log::warn!(
                "Lookahead ({}ms) is not longer than the poll interval ({}ms); steps may start late",
                self.lookahead_ms,
                self.poll_interval_ms
            );
        }
        Ok(())
    }
}

/// Audio output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Output device name (None = default)
    pub output_device: Option<String>,
    /// Sample rate (None = device default)
    pub sample_rate: Option<u32>,
    /// Master gain
    pub gain: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            output_device: None,
            sample_rate: None,
            gain: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sequencer.rows, 16);
        assert_eq!(config.sequencer.columns, 8);
        assert_eq!(config.sequencer.lookahead_ms, 100);
        assert_eq!(config.sequencer.poll_interval_ms, 25);
        assert!((config.sequencer.lookahead_seconds() - 0.1).abs() < 1e-12);
        assert!(config.sequencer.validate().is_ok());
    }

    #[test]
    fn test_default_stride_is_rows() {
        let settings = SequencerSettings {
            rows: 32,
            ..Default::default()
        };
        let shape = settings.grid_shape().unwrap();
        assert_eq!(shape.row_stride(), 32);
        assert_eq!(shape.encode(1, 2), Some(34));
    }

    #[test]
    fn test_default_stride_covers_wide_grids() {
        let settings = SequencerSettings {
            rows: 4,
            columns: 8,
            ..Default::default()
        };
        let shape = settings.grid_shape().unwrap();
        assert_eq!(shape.row_stride(), 8);
        assert_eq!(shape.decode(shape.encode(3, 7).unwrap()), Some((3, 7)));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let bad_tempo = SequencerSettings {
            tempo: -1.0,
            ..Default::default()
        };
        assert!(bad_tempo.validate().is_err());

        let bad_stride = SequencerSettings {
            row_stride: Some(4),
            ..Default::default()
        };
        assert!(bad_stride.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[sequencer]\ntempo = 90.0\n").unwrap();
        assert!((parsed.sequencer.tempo - 90.0).abs() < 1e-12);
        assert_eq!(parsed.sequencer.rows, 16);
        assert!((parsed.audio.gain - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_default_config_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::write_default_config_file(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.sequencer.rows = 32;
        config.audio.output_device = Some("pulse".to_string());
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
