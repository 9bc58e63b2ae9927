//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                           │
//! │                                                                     │
//! │  1. Environment Variables (highest priority)                        │
//! │     ALMACEN_STORE_ID=store-001                                      │
//! │     ALMACEN_SYNC_BATCH_SIZE=50                                      │
//! │                                                                     │
//! │  2. TOML Config File                                                │
//! │     ~/.config/almacen-pos/sync.toml (Linux)                         │
//! │     ~/Library/Application Support/com.almacen.pos/sync.toml (macOS) │
//! │                                                                     │
//! │  3. Default Values (lowest priority)                                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [store]
//! id = "store-001"
//! name = "Downtown Branch"
//!
//! [remote]
//! products_collection = "products"
//! invoices_collection = "invoices"
//!
//! [sync]
//! batch_size = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Store Configuration
// =============================================================================

/// Configuration for the store this till belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Unique store identifier.
    pub id: String,

    /// Human-readable store name.
    #[serde(default)]
    pub name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            id: "default-store".to_string(),
            name: "Default Store".to_string(),
        }
    }
}

// =============================================================================
// Remote Collections
// =============================================================================

/// Names of the remote document collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Collection holding product documents.
    #[serde(default = "default_products_collection")]
    pub products_collection: String,

    /// Collection holding invoice documents.
    #[serde(default = "default_invoices_collection")]
    pub invoices_collection: String,
}

fn default_products_collection() -> String {
    "products".to_string()
}

fn default_invoices_collection() -> String {
    "invoices".to_string()
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            products_collection: default_products_collection(),
            invoices_collection: default_invoices_collection(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Number of outbox markers pushed per remote batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    100
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            batch_size: default_batch_size(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Remote collection names.
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.store.id.is_empty() {
            return Err(SyncError::InvalidConfig("store id must not be empty".into()));
        }

        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.remote.products_collection.is_empty() || self.remote.invoices_collection.is_empty()
        {
            return Err(SyncError::InvalidConfig(
                "collection names must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("ALMACEN_STORE_ID") {
            debug!(store_id = %id, "Overriding store ID from environment");
            self.store.id = id;
        }

        if let Ok(name) = std::env::var("ALMACEN_STORE_NAME") {
            self.store.name = name;
        }

        if let Ok(size) = std::env::var("ALMACEN_SYNC_BATCH_SIZE") {
            if let Ok(parsed) = size.parse::<usize>() {
                debug!(batch_size = parsed, "Overriding batch size from environment");
                self.sync.batch_size = parsed;
            }
        }

        if let Ok(name) = std::env::var("ALMACEN_PRODUCTS_COLLECTION") {
            self.remote.products_collection = name;
        }

        if let Ok(name) = std::env::var("ALMACEN_INVOICES_COLLECTION") {
            self.remote.invoices_collection = name;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "almacen", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    /// Returns the store ID.
    pub fn store_id(&self) -> &str {
        &self.store.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.sync.batch_size, 100);
        assert_eq!(config.remote.products_collection, "products");
        assert_eq!(config.remote.invoices_collection, "invoices");
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_ok());

        config.sync.batch_size = 0;
        assert!(config.validate().is_err());

        config.sync.batch_size = 10;
        config.store.id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[sync]"));

        let parsed: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.sync.batch_size, config.sync.batch_size);
    }
}
