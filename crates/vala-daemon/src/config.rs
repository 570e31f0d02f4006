//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use vala_types::geo::BoundingBox;
use vala_types::{DEFAULT_CENTER, REFRESH_INTERVAL_SECS};

/// The operational range for the full-refresh poll interval.
const REFRESH_INTERVAL_MIN_SECS: u64 = 15;
const REFRESH_INTERVAL_MAX_SECS: u64 = 60;

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Map defaults handed to UI clients.
    #[serde(default)]
    pub map: MapConfig,
    /// Synchronization settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Map configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Initial map center latitude.
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,
    /// Initial map center longitude.
    #[serde(default = "default_center_lng")]
    pub center_lng: f64,
    /// Hard viewport bounds [west, south, east, north].
    #[serde(default = "default_bounds")]
    pub bounds: [f64; 4],
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
}

/// Synchronization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Full-refresh poll interval in seconds. Clamped to 15-60.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Event bus buffer capacity.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Audio blob directory. Empty = $data_dir/blobs/.
    #[serde(default)]
    pub blob_dir: String,
    /// Base URL under which stored blobs are publicly reachable.
    #[serde(default = "default_blob_base_url")]
    pub blob_base_url: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log file path. Empty = stderr.
    #[serde(default)]
    pub log_file: String,
}

// Default value functions

fn default_center_lat() -> f64 {
    DEFAULT_CENTER.lat
}

fn default_center_lng() -> f64 {
    DEFAULT_CENTER.lng
}

fn default_bounds() -> [f64; 4] {
    // Albania viewport.
    [18.5, 39.5, 21.5, 43.0]
}

fn default_min_zoom() -> f64 {
    6.0
}

fn default_refresh_interval() -> u64 {
    REFRESH_INTERVAL_SECS
}

fn default_event_buffer() -> usize {
    1000
}

fn default_blob_base_url() -> String {
    "http://127.0.0.1:8787/blobs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: default_center_lat(),
            center_lng: default_center_lng(),
            bounds: default_bounds(),
            min_zoom: default_min_zoom(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            blob_dir: String::new(),
            blob_base_url: default_blob_base_url(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: String::new(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// The refresh interval clamped to the operational range.
    pub fn refresh_interval_secs(&self) -> u64 {
        self.sync
            .refresh_interval_secs
            .clamp(REFRESH_INTERVAL_MIN_SECS, REFRESH_INTERVAL_MAX_SECS)
    }

    /// Viewport bounds as a [`BoundingBox`].
    pub fn map_bounds(&self) -> BoundingBox {
        BoundingBox {
            west: self.map.bounds[0],
            south: self.map.bounds[1],
            east: self.map.bounds[2],
            north: self.map.bounds[3],
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the audio blob directory path.
    pub fn blob_dir(&self) -> PathBuf {
        if self.storage.blob_dir.is_empty() {
            self.data_dir().join("blobs")
        } else {
            PathBuf::from(&self.storage.blob_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        // Check env var override first
        if let Ok(dir) = std::env::var("VALA_DATA_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("VALA_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Vala")
        }
        #[cfg(target_os = "linux")]
        {
            dirs_fallback(".vala")
        }
        #[cfg(target_os = "windows")]
        {
            dirs_fallback("Vala")
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            dirs_fallback(".vala")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/vala"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert!((config.map.center_lat - 41.1533).abs() < 1e-9);
        assert!((config.map.center_lng - 20.1683).abs() < 1e-9);
        assert_eq!(config.sync.refresh_interval_secs, 60);
        assert_eq!(config.advanced.log_level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = DaemonConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let _parsed: DaemonConfig = toml::from_str(&toml_str).expect("parse");
    }

    #[test]
    fn test_refresh_interval_clamped() {
        let mut config = DaemonConfig::default();
        config.sync.refresh_interval_secs = 5;
        assert_eq!(config.refresh_interval_secs(), 15);
        config.sync.refresh_interval_secs = 600;
        assert_eq!(config.refresh_interval_secs(), 60);
        config.sync.refresh_interval_secs = 30;
        assert_eq!(config.refresh_interval_secs(), 30);
    }

    #[test]
    fn test_map_bounds() {
        let config = DaemonConfig::default();
        let bounds = config.map_bounds();
        assert!(bounds.contains(config.map.center_lat, config.map.center_lng));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: DaemonConfig =
            toml::from_str("[sync]\nrefresh_interval_secs = 20\n").expect("parse");
        assert_eq!(config.sync.refresh_interval_secs, 20);
        assert_eq!(config.sync.event_buffer, 1000);
        assert!((config.map.center_lat - 41.1533).abs() < 1e-9);
    }
}
