//! Allow-list or deny-list of plugin names

use crate::config::{ConfigError, ConfigFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraylistMode {
    /// Only listed plugins may load
    Whitelist,
    /// Every plugin except the listed ones may load
    #[default]
    Blacklist,
}

/// Serialized form of a graylist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraylistConfig {
    #[serde(default)]
    pub mode: GraylistMode,
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// Filter applied to plugin names before they are loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginGraylist {
    plugins: HashSet<String>,
    is_whitelist: bool,
}

impl PluginGraylist {
    pub fn new<I, S>(plugins: I, is_whitelist: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            plugins: plugins.into_iter().map(Into::into).collect(),
            is_whitelist,
        }
    }

    /// Load a graylist from a TOML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let config: GraylistConfig = match ConfigFormat::from_extension(path) {
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseFailed(format!("JSON parse error: {}", e)))?,
            ConfigFormat::Toml => toml::from_str(&content)
                .map_err(|e| ConfigError::ParseFailed(format!("TOML parse error: {}", e)))?,
        };
        Ok(Self::from(config))
    }

    pub fn plugins(&self) -> &HashSet<String> {
        &self.plugins
    }

    pub fn is_whitelist(&self) -> bool {
        self.is_whitelist
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.is_whitelist == self.plugins.contains(name)
    }
}

impl From<GraylistConfig> for PluginGraylist {
    fn from(config: GraylistConfig) -> Self {
        Self::new(config.plugins, config.mode == GraylistMode::Whitelist)
    }
}
