//! Relay configuration and its persistence.
//!
//! [`RelayConfig`] holds the four relay settings. A [`ConfigProvider`]
//! loads and saves them; [`JsonFileProvider`] keeps them in a JSON file
//! and [`MemoryProvider`] keeps them in memory.
//!
//! # Example
//!
//! ```
//! use ws_relay::RelayConfig;
//!
//! let config = RelayConfig::new()
//!     .with_remote_address("wss://relay.example.com/ws")
//!     .with_reconnect_interval_secs(10);
//!
//! assert!(config.has_remote_address());
//! assert_eq!(config.local_address, "ws://localhost:4455");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default local control API address.
pub const DEFAULT_LOCAL_ADDRESS: &str = "ws://localhost:4455";

/// Default reconnect interval in seconds.
pub const DEFAULT_RECONNECT_INTERVAL_SECS: u64 = 5;

// ============================================================================
// RelayConfig
// ============================================================================

/// Relay settings.
///
/// An empty `remote_address` means the relay is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Local control API WebSocket URL.
    pub local_address: String,

    /// Remote peer WebSocket URL (`ws://` or `wss://`).
    pub remote_address: String,

    /// Minimum seconds between reconnect attempts.
    pub reconnect_interval_secs: u64,

    /// Log every relayed frame.
    pub verbose_logging: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            local_address: DEFAULT_LOCAL_ADDRESS.to_string(),
            remote_address: String::new(),
            reconnect_interval_secs: DEFAULT_RECONNECT_INTERVAL_SECS,
            verbose_logging: false,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl RelayConfig {
    /// Creates a config with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local control API address.
    #[inline]
    #[must_use]
    pub fn with_local_address(mut self, address: impl Into<String>) -> Self {
        self.local_address = address.into();
        self
    }

    /// Sets the remote peer address.
    #[inline]
    #[must_use]
    pub fn with_remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = address.into();
        self
    }

    /// Sets the reconnect interval in seconds.
    #[inline]
    #[must_use]
    pub fn with_reconnect_interval_secs(mut self, secs: u64) -> Self {
        self.reconnect_interval_secs = secs;
        self
    }

    /// Enables or disables per-frame logging.
    #[inline]
    #[must_use]
    pub fn with_verbose_logging(mut self, enabled: bool) -> Self {
        self.verbose_logging = enabled;
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl RelayConfig {
    /// Returns `true` if a local address is set.
    #[inline]
    #[must_use]
    pub fn has_local_address(&self) -> bool {
        !self.local_address.trim().is_empty()
    }

    /// Returns `true` if a remote address is set.
    #[inline]
    #[must_use]
    pub fn has_remote_address(&self) -> bool {
        !self.remote_address.trim().is_empty()
    }

    /// Reconnect interval, falling back to the default when zero.
    #[inline]
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        let secs = if self.reconnect_interval_secs == 0 {
            DEFAULT_RECONNECT_INTERVAL_SECS
        } else {
            self.reconnect_interval_secs
        };
        Duration::from_secs(secs)
    }
}

// ============================================================================
// StoredConfig
// ============================================================================

/// On-disk shape, lenient about missing, empty and non-positive values.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredConfig {
    #[serde(default)]
    local_address: Option<String>,
    #[serde(default)]
    remote_address: Option<String>,
    #[serde(default)]
    reconnect_interval_secs: Option<i64>,
    #[serde(default)]
    verbose_logging: Option<bool>,
}

impl StoredConfig {
    /// Overlays stored values onto defaults.
    fn into_config(self) -> RelayConfig {
        let defaults = RelayConfig::default();

        let local_address = self
            .local_address
            .filter(|address| !address.trim().is_empty())
            .unwrap_or(defaults.local_address);

        let remote_address = self
            .remote_address
            .filter(|address| !address.trim().is_empty())
            .unwrap_or(defaults.remote_address);

        let reconnect_interval_secs = self
            .reconnect_interval_secs
            .filter(|secs| *secs > 0)
            .and_then(|secs| u64::try_from(secs).ok())
            .unwrap_or(defaults.reconnect_interval_secs);

        RelayConfig {
            local_address,
            remote_address,
            reconnect_interval_secs,
            verbose_logging: self.verbose_logging.unwrap_or(defaults.verbose_logging),
        }
    }
}

impl From<&RelayConfig> for StoredConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            local_address: Some(config.local_address.clone()),
            remote_address: Some(config.remote_address.clone()),
            reconnect_interval_secs: i64::try_from(config.reconnect_interval_secs).ok(),
            verbose_logging: Some(config.verbose_logging),
        }
    }
}

// ============================================================================
// ConfigProvider
// ============================================================================

/// Loads and saves relay settings.
pub trait ConfigProvider: Send {
    /// Loads settings; missing or empty values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store exists but cannot be read.
    fn load(&self) -> Result<RelayConfig>;

    /// Persists all four settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn save(&self, config: &RelayConfig) -> Result<()>;
}

// ============================================================================
// JsonFileProvider
// ============================================================================

/// Stores settings as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    /// Creates a provider for the given file path.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the settings file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for JsonFileProvider {
    fn load(&self) -> Result<RelayConfig> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Settings file not found, using defaults");
            return Ok(RelayConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let stored: StoredConfig = serde_json::from_str(&content)?;
        let config = stored.into_config();

        info!(
            local = %config.local_address,
            remote = %config.remote_address,
            reconnect_secs = config.reconnect_interval_secs,
            verbose = config.verbose_logging,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn save(&self, config: &RelayConfig) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, &StoredConfig::from(config))?;
        file.write_all(b"\n")?;
        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        info!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }
}

// ============================================================================
// MemoryProvider
// ============================================================================

/// Keeps settings in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    stored: Mutex<Option<RelayConfig>>,
}

impl MemoryProvider {
    /// Creates a provider pre-loaded with `config`.
    #[must_use]
    pub fn with_config(config: RelayConfig) -> Self {
        Self {
            stored: Mutex::new(Some(config)),
        }
    }

    /// Returns the last saved settings.
    #[must_use]
    pub fn stored(&self) -> Option<RelayConfig> {
        self.stored.lock().clone()
    }
}

impl ConfigProvider for MemoryProvider {
    fn load(&self) -> Result<RelayConfig> {
        Ok(self.stored.lock().clone().unwrap_or_default())
    }

    fn save(&self, config: &RelayConfig) -> Result<()> {
        *self.stored.lock() = Some(config.clone());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.local_address, "ws://localhost:4455");
        assert!(config.remote_address.is_empty());
        assert_eq!(config.reconnect_interval_secs, 5);
        assert!(!config.verbose_logging);
        assert!(config.has_local_address());
        assert!(!config.has_remote_address());
    }

    #[test]
    fn test_builder_methods() {
        let config = RelayConfig::new()
            .with_local_address("ws://127.0.0.1:4455")
            .with_remote_address("wss://example.com/ws")
            .with_reconnect_interval_secs(30)
            .with_verbose_logging(true);

        assert_eq!(config.local_address, "ws://127.0.0.1:4455");
        assert_eq!(config.remote_address, "wss://example.com/ws");
        assert_eq!(config.reconnect_interval(), Duration::from_secs(30));
        assert!(config.verbose_logging);
    }

    #[test]
    fn test_blank_remote_is_unset() {
        let config = RelayConfig::new().with_remote_address("   ");
        assert!(!config.has_remote_address());
    }

    #[test]
    fn test_zero_interval_falls_back() {
        let config = RelayConfig::new().with_reconnect_interval_secs(0);
        assert_eq!(config.reconnect_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_stored_values_fall_back_to_defaults() {
        let stored: StoredConfig = serde_json::from_str(
            r#"{"local_address": "", "remote_address": "wss://r/ws", "reconnect_interval_secs": -3}"#,
        )
        .expect("valid json");
        let config = stored.into_config();

        assert_eq!(config.local_address, DEFAULT_LOCAL_ADDRESS);
        assert_eq!(config.remote_address, "wss://r/ws");
        assert_eq!(config.reconnect_interval_secs, 5);
        assert!(!config.verbose_logging);
    }

    #[test]
    fn test_file_provider_missing_file_loads_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let provider = JsonFileProvider::new(dir.path().join("relay.json"));
        assert_eq!(provider.load().expect("load"), RelayConfig::default());
    }

    #[test]
    fn test_file_provider_save_then_load() {
        let dir = TempDir::new().expect("temp dir");
        let provider = JsonFileProvider::new(dir.path().join("nested/relay.json"));
        let config = RelayConfig::new()
            .with_remote_address("wss://example.com:8080/ws")
            .with_reconnect_interval_secs(12)
            .with_verbose_logging(true);

        provider.save(&config).expect("save");
        assert!(provider.path().exists());
        assert_eq!(provider.load().expect("load"), config);
    }

    #[test]
    fn test_file_provider_rejects_malformed_json() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("relay.json");
        fs::write(&path, "{not json").expect("write");

        let result = JsonFileProvider::new(path).load();
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_memory_provider() {
        let provider = MemoryProvider::default();
        assert_eq!(provider.load().expect("load"), RelayConfig::default());

        let config = RelayConfig::new().with_remote_address("ws://r");
        provider.save(&config).expect("save");
        assert_eq!(provider.stored(), Some(config.clone()));
        assert_eq!(provider.load().expect("load"), config);
    }
}
