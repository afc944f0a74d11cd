//! Engine configuration loading and resolution
//!
//! Configuration file resolution follows this priority order:
//! 1. Explicit path (command-line argument, highest priority)
//! 2. `TRE_CONFIG` environment variable
//! 3. User config file (`<config dir>/tre/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing file at levels 2–4 is not an error: the engine starts on
//! defaults and logs a warning. An explicitly requested file must exist.

use crate::fade_curves::FadeCurve;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming a configuration file
pub const CONFIG_ENV_VAR: &str = "TRE_CONFIG";

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audio: AudioSettings,
    pub paths: PathSettings,
}

/// Audio subsystem settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Output device name (None = first usable / system default)
    pub device: Option<String>,
    /// Frames per streaming buffer
    pub stream_buffer_frames: usize,
    /// Buffers in each streaming ring (at least 2)
    pub stream_buffer_count: usize,
    /// Rate decoded streams are resampled to (None = keep source rate)
    pub stream_sample_rate: Option<u32>,
    /// Sleep between background stream updates
    pub update_interval_ms: u64,
    /// Size of the pooled voice slot set
    pub source_slots: usize,
    /// Listener (master) gain
    pub master_gain: f32,
    /// Curve used for music fades
    pub music_fade_curve: FadeCurve,
    /// Low-pass gain applied while the listener is underwater
    pub underwater_gain: f32,
    /// Low-pass high-frequency gain applied while underwater
    pub underwater_gain_hf: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            device: None,
            stream_buffer_frames: 8192,
            stream_buffer_count: 4,
            stream_sample_rate: Some(44100),
            update_interval_ms: 1,
            source_slots: 32,
            master_gain: 1.0,
            music_fade_curve: FadeCurve::SCurve,
            underwater_gain: 1.0,
            underwater_gain_hf: 0.2,
        }
    }
}

impl AudioSettings {
    /// Validate ranges that cannot be expressed by the types alone.
    pub fn validate(&self) -> Result<()> {
        if self.stream_buffer_count < 2 {
            return Err(Error::Config(format!(
                "stream_buffer_count must be at least 2, got {}",
                self.stream_buffer_count
            )));
        }
        if self.stream_buffer_frames == 0 {
            return Err(Error::Config("stream_buffer_frames must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.underwater_gain_hf) {
            return Err(Error::Config(format!(
                "underwater_gain_hf out of range: {}",
                self.underwater_gain_hf
            )));
        }
        Ok(())
    }
}

/// File system locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory holding level data and audio tracks
    pub data_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from TOML text; missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.audio.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file.
    pub fn load_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Resolve and load configuration using the documented priority order.
    ///
    /// # Arguments
    /// - `cli_path`: Path passed on the command line, if any
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_path {
            return Self::load_file(path);
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Self::load_file(&path);
            }
            warn!(
                "{} points to missing file {}, ignoring",
                CONFIG_ENV_VAR,
                path.display()
            );
        }

        // Priority 3: User config file
        if let Some(path) = user_config_file() {
            if path.exists() {
                return Self::load_file(&path);
            }
        }

        // Priority 4: Compiled defaults
        warn!("No configuration file found, using defaults");
        Ok(Self::default())
    }
}

/// Per-user configuration file location
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tre").join("config.toml"))
}

/// Get OS-dependent default data folder path
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tre"))
        .unwrap_or_else(|| PathBuf::from("./tre_data"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.audio.validate().is_ok());
        assert_eq!(config.audio.stream_buffer_count, 4);
        assert_eq!(config.audio.update_interval_ms, 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [audio]
            device = "Speakers"
            stream_buffer_count = 3
            music_fade_curve = "cosine"
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.device.as_deref(), Some("Speakers"));
        assert_eq!(config.audio.stream_buffer_count, 3);
        assert_eq!(config.audio.music_fade_curve, FadeCurve::SCurve);
        assert_eq!(config.audio.stream_buffer_frames, 8192);
        assert_eq!(config.paths, PathSettings::default());
    }

    #[test]
    fn test_ring_too_small_rejected() {
        let result = EngineConfig::from_toml_str("[audio]\nstream_buffer_count = 1\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = EngineConfig::from_toml_str("[audio\n");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    #[serial]
    fn test_resolve_prefers_cli_path() {
        let dir = tempfile::tempdir().unwrap();
        let cli = dir.path().join("cli.toml");
        let env = dir.path().join("env.toml");
        std::fs::File::create(&cli)
            .unwrap()
            .write_all(b"[audio]\nsource_slots = 8\n")
            .unwrap();
        std::fs::File::create(&env)
            .unwrap()
            .write_all(b"[audio]\nsource_slots = 16\n")
            .unwrap();

        std::env::set_var(CONFIG_ENV_VAR, &env);
        let from_cli = EngineConfig::resolve(Some(&cli)).unwrap();
        let from_env = EngineConfig::resolve(None).unwrap();
        std::env::remove_var(CONFIG_ENV_VAR);

        assert_eq!(from_cli.audio.source_slots, 8);
        assert_eq!(from_env.audio.source_slots, 16);
    }

    #[test]
    #[serial]
    fn test_resolve_missing_env_file_falls_back() {
        std::env::set_var(CONFIG_ENV_VAR, "/nonexistent/tre/config.toml");
        let config = EngineConfig::resolve(None);
        std::env::remove_var(CONFIG_ENV_VAR);
        assert!(config.is_ok());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = EngineConfig::resolve(Some(Path::new("/nonexistent/tre.toml")));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
