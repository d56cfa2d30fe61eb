//! Plugin manager configuration

use crate::plugin::GraylistConfig;
use crate::server::PLUGIN_API_VERSION;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings the plugin manager is built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManagerConfig {
    /// Directory scanned for plugins
    #[serde(default = "default_plugin_path")]
    pub plugin_path: PathBuf,
    /// Root of the per-plugin data folders, next to each plugin when unset
    #[serde(default)]
    pub data_path: Option<PathBuf>,
    /// Plugin API version implemented by the server
    #[serde(default = "default_api_version")]
    pub api_version: Version,
    #[serde(default)]
    pub graylist: Option<GraylistConfig>,
}

fn default_plugin_path() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_api_version() -> Version {
    Version::parse(PLUGIN_API_VERSION).unwrap_or_else(|_| Version::new(1, 0, 0))
}

impl Default for PluginManagerConfig {
    fn default() -> Self {
        Self {
            plugin_path: default_plugin_path(),
            data_path: Some(PathBuf::from("plugin_data")),
            api_version: default_api_version(),
            graylist: None,
        }
    }
}

impl PluginManagerConfig {
    /// Load configuration from file with format detection
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let config: PluginManagerConfig = match ConfigFormat::from_extension(path) {
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseFailed(format!("JSON parse error: {}", e)))?,
            ConfigFormat::Toml => toml::from_str(&content)
                .map_err(|e| ConfigError::ParseFailed(format!("TOML parse error: {}", e)))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = match ConfigFormat::from_extension(path) {
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| ConfigError::ParseFailed(format!("JSON serialize error: {}", e)))?,
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| ConfigError::ParseFailed(format!("TOML serialize error: {}", e)))?,
        };

        std::fs::write(path, content)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.plugin_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Plugin path cannot be empty".to_owned()));
        }

        // Data folders inside the plugin path would be picked up as plugin candidates
        if self.data_path.as_deref() == Some(self.plugin_path.as_path()) {
            return Err(ConfigError::Invalid(
                "Plugin data path must differ from the plugin path".to_owned(),
            ));
        }

        if let Some(graylist) = &self.graylist {
            let whitelist = graylist.mode == crate::plugin::GraylistMode::Whitelist;
            if whitelist && graylist.plugins.is_empty() {
                tracing::warn!("Plugin whitelist is empty, no plugins will be loaded");
            }
        }

        Ok(())
    }
}

/// Configuration file format detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_extension(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
