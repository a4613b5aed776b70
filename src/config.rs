//! Configuration for BlockWAL
//!
//! Centralized configuration with sensible defaults. Loading the values
//! (files, flags, environment) is left to the embedding application; the
//! struct derives serde traits so any format can be used.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WalError};
use crate::wal::{DEFAULT_BLOCK_SIZE, HEADER_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Default extension for segment files
pub const DEFAULT_SEGMENT_EXTENSION: &str = ".seg";

/// Main configuration for a WAL instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Layout Configuration
    // -------------------------------------------------------------------------
    /// Directory where segment files are written and loaded from.
    /// Internal structure:
    ///   {wal_dir}/
    ///     ├── 1.seg
    ///     ├── 2.seg
    ///     └── ...
    pub wal_dir: PathBuf,

    /// File extension of segment files, including the leading dot
    pub file_extension: String,

    /// Maximum size of a single segment file (in bytes)
    pub max_segment_size: u64,

    /// Size of a framing block (in bytes). Must stay fixed for a directory.
    pub block_size: usize,

    // -------------------------------------------------------------------------
    // Sync Configuration
    // -------------------------------------------------------------------------
    /// Number of writes since the last sync that triggers a sync (0 = disabled)
    pub sync_write_threshold: u64,

    /// Interval of the background sync task (zero = disabled)
    pub sync_interval: Duration,

    /// fsync after every write (safest, slowest)
    pub sync_per_write: bool,

    // -------------------------------------------------------------------------
    // Misc
    // -------------------------------------------------------------------------
    /// Sealed segments may be compressed by an external collaborator
    pub compression_enabled: bool,

    /// Emit per-record debug events
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wal_dir: PathBuf::from("./blockwal_data"),
            file_extension: DEFAULT_SEGMENT_EXTENSION.to_string(),
            max_segment_size: 64 * 1024 * 1024, // 64 MB
            block_size: DEFAULT_BLOCK_SIZE,
            sync_write_threshold: 0,
            sync_interval: Duration::ZERO,
            sync_per_write: false,
            compression_enabled: false,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Largest payload a single write may carry
    pub fn max_payload_size(&self) -> u64 {
        self.max_segment_size.saturating_sub(HEADER_SIZE as u64)
    }

    /// Check that the configuration describes a usable WAL
    pub fn validate(&self) -> Result<()> {
        if self.wal_dir.as_os_str().is_empty() {
            return Err(WalError::Config("wal_dir must not be empty".to_string()));
        }

        if self.file_extension.len() < 2 || !self.file_extension.starts_with('.') {
            return Err(WalError::Config(format!(
                "file_extension must start with '.' and name an extension, got {:?}",
                self.file_extension
            )));
        }

        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(WalError::Config(format!(
                "block_size must be within [{}, {}], got {}",
                MIN_BLOCK_SIZE, MAX_BLOCK_SIZE, self.block_size
            )));
        }

        if self.max_segment_size <= HEADER_SIZE as u64 {
            return Err(WalError::Config(format!(
                "max_segment_size must exceed the chunk header size ({}), got {}",
                HEADER_SIZE, self.max_segment_size
            )));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the directory holding the segment files
    pub fn wal_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.wal_dir = path.into();
        self
    }

    /// Set the segment file extension (e.g. ".seg")
    pub fn file_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.file_extension = extension.into();
        self
    }

    /// Set the maximum segment size (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the block size (in bytes)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// Sync after this many writes (0 disables)
    pub fn sync_write_threshold(mut self, count: u64) -> Self {
        self.config.sync_write_threshold = count;
        self
    }

    /// Set the background sync interval (zero disables)
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.sync_interval = interval;
        self
    }

    /// Sync after every write
    pub fn sync_per_write(mut self, enabled: bool) -> Self {
        self.config.sync_per_write = enabled;
        self
    }

    /// Mark sealed segments as eligible for compression
    pub fn compression_enabled(mut self, enabled: bool) -> Self {
        self.config.compression_enabled = enabled;
        self
    }

    /// Enable per-record debug logging
    pub fn verbose_logging(mut self, enabled: bool) -> Self {
        self.config.verbose_logging = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
