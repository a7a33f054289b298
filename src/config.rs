//! Configuration file support for the frame cache.
//!
//! Settings are stored as a versioned JSON document. Missing fields take
//! their defaults, so older files keep loading as options are added.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BITMAP_CACHE_SIZE, DEFAULT_DIFFERENCE_THRESHOLD, DEFAULT_PREFETCH_WORKERS,
};
use crate::state::PrefetchSettings;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Image cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Number of decoded bitmaps kept in memory
    #[serde(default = "default_bitmap_cache_size")]
    pub bitmap_cache_size: usize,

    /// Decode the next frame in the background while the current one is shown
    #[serde(default = "default_prefetch_enabled")]
    pub prefetch_enabled: bool,

    /// Number of background decode threads
    #[serde(default = "default_prefetch_workers")]
    pub prefetch_workers: usize,

    /// Give up waiting on a background decode after this many milliseconds
    #[serde(default)]
    pub prefetch_wait_timeout_ms: Option<u64>,

    /// Downscale decoded frames wider than this
    #[serde(default)]
    pub decode_width: Option<u32>,

    /// Per-pixel threshold for the combined difference
    #[serde(default = "default_difference_threshold")]
    pub difference_threshold: u8,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_bitmap_cache_size() -> usize {
    DEFAULT_BITMAP_CACHE_SIZE
}

fn default_prefetch_enabled() -> bool {
    true
}

fn default_prefetch_workers() -> usize {
    DEFAULT_PREFETCH_WORKERS
}

fn default_difference_threshold() -> u8 {
    DEFAULT_DIFFERENCE_THRESHOLD
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            bitmap_cache_size: default_bitmap_cache_size(),
            prefetch_enabled: default_prefetch_enabled(),
            prefetch_workers: default_prefetch_workers(),
            prefetch_wait_timeout_ms: None,
            decode_width: None,
            difference_threshold: default_difference_threshold(),
            log_level: LogLevel::default(),
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bitmap_cache_size == 0 {
            return Err(ConfigError::invalid(
                "bitmap_cache_size",
                "must hold at least one bitmap",
            ));
        }
        if self.prefetch_enabled && self.prefetch_workers == 0 {
            return Err(ConfigError::invalid(
                "prefetch_workers",
                "must be at least 1 when prefetch is enabled",
            ));
        }
        Ok(())
    }

    /// Bitmap store capacity.
    pub fn cache_capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.bitmap_cache_size).ok_or_else(|| {
            ConfigError::invalid("bitmap_cache_size", "must hold at least one bitmap")
        })
    }

    /// Prefetcher settings derived from this configuration.
    pub fn prefetch_settings(&self) -> PrefetchSettings {
        PrefetchSettings {
            workers: if self.prefetch_enabled {
                self.prefetch_workers
            } else {
                0
            },
            decode_width: self.decode_width,
            wait_timeout: self.prefetch_wait_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Read configuration from `path` if the file exists.
    ///
    /// Nothing is logged, so this can run before the logger is set up.
    pub fn from_file_if_exists(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::from_file(path).map(Some)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "framecache-config.json"
    }

    /// Get the default config file path for auto-load/save.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("framecache").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("framecache")
                    .join(Self::default_filename())
            })
        }
    }

    /// Try to load configuration from the default path.
    /// Returns `Ok(None)` if there is no config directory or no file in it.
    pub fn load_from_default_path() -> Result<Option<Self>, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::from_file_if_exists(&path),
            None => Ok(None),
        }
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// A setting is out of range
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}
