//! Configuration System
//!
//! Layered configuration for the context and pagination components: a global
//! XDG file under a workspace file, with serde defaults underneath. Loaded
//! values typically end up in a [`crate::context::ScopedContext`] at
//! application setup.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StrataConfig {
    /// Pagination settings
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pagination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when neither the request nor the model declares one
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
}

fn default_page_size() -> u64 {
    1000
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
        }
    }
}

impl StrataConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pagination.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "pagination.default_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration by layering sources: defaults, then the global XDG
/// file, then workspace files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace root.
    pub fn load(workspace_root: &Path) -> Result<StrataConfig, ConfigError> {
        let mut builder = config::Config::builder();
        builder = sources::global_file::add_to_builder(builder)?;
        builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let loaded = builder.build()?;
        Ok(loaded.try_deserialize()?)
    }

    /// Load configuration from a single file, ignoring the layered sources.
    pub fn load_from_file(path: &Path) -> Result<StrataConfig, ConfigError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigError::LoadFailed(format!("non-UTF8 path: {:?}", path)))?;
        let loaded = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .build()?;
        Ok(loaded.try_deserialize()?)
    }
}

/// Configuration manager for runtime updates
pub struct ConfigManager {
    config: RwLock<StrataConfig>,
}

impl ConfigManager {
    /// Create a new configuration manager with the given config
    pub fn new(config: StrataConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Reload configuration from files
    pub fn reload(&self, workspace_root: &Path) -> Result<(), ConfigError> {
        let new_config = ConfigLoader::load(workspace_root)?;
        new_config.validate()?;
        *self.config.write() = new_config;
        Ok(())
    }

    /// Get current configuration (read-only)
    pub fn get(&self) -> StrataConfig {
        self.config.read().clone()
    }
}
