use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// How often the player's clock is read
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Speeds the operator may pick from
    #[serde(default = "default_playback_rates")]
    pub playback_rates: Vec<f64>,
    #[serde(default = "default_rate")]
    pub default_rate: f64,
}

const fn default_tick_interval() -> u64 {
    100
}

fn default_playback_rates() -> Vec<f64> {
    vec![0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 2.0]
}

const fn default_rate() -> f64 {
    1.0
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            playback_rates: default_playback_rates(),
            default_rate: default_rate(),
        }
    }
}

impl PlaybackConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Whether `rate` is one of the configured speeds
    #[must_use]
    pub fn allows_rate(&self, rate: f64) -> bool {
        self.playback_rates
            .iter()
            .any(|allowed| (allowed - rate).abs() < f64::EPSILON)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Length given to a newly added grid row
    #[serde(default = "default_new_row_padding")]
    pub new_row_padding_secs: f64,
    /// Decimal places kept when capturing from the clock
    #[serde(default = "default_capture_precision")]
    pub capture_precision: u8,
    /// Length given to a row whose captured start passed its end
    #[serde(default = "default_start_capture_padding")]
    pub start_capture_padding_secs: f64,
}

const fn default_new_row_padding() -> f64 {
    5.0
}

const fn default_capture_precision() -> u8 {
    2
}

const fn default_start_capture_padding() -> f64 {
    3.0
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            new_row_padding_secs: default_new_row_padding(),
            capture_precision: default_capture_precision(),
            start_capture_padding_secs: default_start_capture_padding(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; defaults to `~/.config/lyricloop/lyricloop.db`
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(crate::paths::database_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also append logs to the file at [`crate::paths::log_file_path`]
    #[serde(default)]
    pub enabled: bool,
}

impl Config {
    /// Location of the config file
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from file or create template on first run
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` after writing the template, or an error if the
    /// config file cannot be read, parsed, or holds invalid values.
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(&config_path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a config document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(CoreError::ConfigInvalid {
                message: message.to_string(),
            })
        };

        if self.playback.tick_interval_ms == 0 {
            return invalid("playback.tick_interval_ms must be greater than 0");
        }
        if self.playback.playback_rates.is_empty() {
            return invalid("playback.playback_rates must not be empty");
        }
        if self.playback.playback_rates.iter().any(|rate| *rate <= 0.0) {
            return invalid("playback.playback_rates must all be positive");
        }
        if !self.playback.allows_rate(self.playback.default_rate) {
            return invalid("playback.default_rate must be one of playback.playback_rates");
        }
        if self.editor.new_row_padding_secs <= 0.0 {
            return invalid("editor.new_row_padding_secs must be greater than 0");
        }
        if self.editor.start_capture_padding_secs <= 0.0 {
            return invalid("editor.start_capture_padding_secs must be greater than 0");
        }
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = r#"# Lyricloop Configuration
# Set LYRICLOOP_HOME to keep this file, the database and the log in one directory.

[playback]
# How often the player clock is read, in milliseconds
tick_interval_ms = 100
playback_rates = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 2.0]
default_rate = 1.0

[editor]
# Length of a newly added row, in seconds
new_row_padding_secs = 5.0
# Decimal places kept when capturing a time from the clock
capture_precision = 2
# When a captured start passes the row's end, the end moves to start + this
start_capture_padding_secs = 3.0

[storage]
# Defaults to lyricloop/lyricloop.db under the platform data directory
# database_path = "/path/to/lyricloop.db"

[logging]
# Also append logs to lyricloop/lyricloop.log under the platform cache directory
enabled = false
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config = Config::from_toml_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::from_toml_str("[editor]\ncapture_precision = 3\n").unwrap();
        assert_eq!(config.editor.capture_precision, 3);
        assert!((config.editor.new_row_padding_secs - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.playback.tick_interval(), Duration::from_millis(100));
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_rejects_zero_tick_interval() {
        let err = Config::from_toml_str("[playback]\ntick_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_rejects_default_rate_outside_rates() {
        let err = Config::from_toml_str("[playback]\nplayback_rates = [1.0, 2.0]\ndefault_rate = 0.5\n")
            .unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = Config::from_toml_str("[playback\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigParseError(_)));
    }

    #[test]
    fn test_explicit_database_path() {
        let config = Config::from_toml_str("[storage]\ndatabase_path = \"/tmp/x.db\"\n").unwrap();
        assert_eq!(config.storage.database_path(), PathBuf::from("/tmp/x.db"));
    }
}
