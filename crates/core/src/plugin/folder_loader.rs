//! Loader for plugins laid out as a directory with a `plugin.toml` manifest

use super::loader::{EntryPointRegistry, PluginConstructor, PluginLoader};
use super::{DescriptionError, PluginDescription};
use std::path::Path;

/// Manifest file name expected at the root of a plugin directory
pub const MANIFEST_FILE: &str = "plugin.toml";

/// Loads plugins from plain directories
#[derive(Debug, Default)]
pub struct FolderPluginLoader {
    entry_points: EntryPointRegistry,
}

impl FolderPluginLoader {
    pub fn new(entry_points: EntryPointRegistry) -> Self {
        Self { entry_points }
    }
}

impl PluginLoader for FolderPluginLoader {
    fn kind(&self) -> &str {
        "folder"
    }

    fn can_load_plugin(&self, path: &Path) -> bool {
        path.is_dir() && path.join(MANIFEST_FILE).is_file()
    }

    fn plugin_description(
        &self,
        path: &Path,
    ) -> Result<Option<PluginDescription>, DescriptionError> {
        let manifest = path.join(MANIFEST_FILE);
        if !manifest.is_file() {
            return Ok(None);
        }

        PluginDescription::from_file(&manifest).map(Some)
    }

    fn load_plugin(&self, path: &str) -> anyhow::Result<()> {
        let path = Path::new(path);
        if !path.is_dir() {
            anyhow::bail!("Plugin directory {} does not exist", path.display());
        }

        tracing::debug!("Loading plugin sources from {}", path.display());
        Ok(())
    }

    fn entry_point(&self, main: &str) -> Option<PluginConstructor> {
        self.entry_points.get(main)
    }
}
