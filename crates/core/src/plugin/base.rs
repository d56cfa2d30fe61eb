//! Shared state every plugin is constructed with

use super::{PluginDescription, PluginLoader, ResourceProvider};
use crate::server::Server;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bundle of the constructor arguments handed to every plugin
///
/// Plugins usually keep one of these as a field and build it straight from
/// their constructor arguments.
pub struct PluginBase {
    loader: Arc<dyn PluginLoader>,
    server: Arc<dyn Server>,
    description: PluginDescription,
    data_folder: PathBuf,
    file: String,
    resources: Arc<dyn ResourceProvider>,
}

impl PluginBase {
    pub fn new(
        loader: Arc<dyn PluginLoader>,
        server: Arc<dyn Server>,
        description: PluginDescription,
        data_folder: PathBuf,
        file: String,
        resources: Arc<dyn ResourceProvider>,
    ) -> Self {
        Self {
            loader,
            server,
            description,
            data_folder,
            file,
            resources,
        }
    }

    pub fn loader(&self) -> &Arc<dyn PluginLoader> {
        &self.loader
    }

    pub fn server(&self) -> &Arc<dyn Server> {
        &self.server
    }

    pub fn description(&self) -> &PluginDescription {
        &self.description
    }

    pub fn name(&self) -> &str {
        self.description.name()
    }

    /// Directory owned by this plugin for its own files
    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    /// Path the plugin was loaded from, prefixed with the loader's access protocol
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Open a bundled resource
    pub fn resource(&self, name: &str) -> Option<File> {
        self.resources.resource(name)
    }

    /// Names of all bundled resources
    pub fn resources(&self) -> Vec<String> {
        self.resources.resources()
    }

    /// Copy a bundled resource into the data folder
    ///
    /// Returns `false` when the resource does not exist or when the target is
    /// already present and `replace` is not set.
    pub fn save_resource(&self, name: &str, replace: bool) -> std::io::Result<bool> {
        let name = name.replace('\\', "/");
        let name = name.trim_start_matches('/');
        if name.is_empty() {
            return Ok(false);
        }

        let target = self.data_folder.join(name);
        if target.exists() && !replace {
            return Ok(false);
        }

        let Some(mut source) = self.resources.resource(name) else {
            return Ok(false);
        };

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut source, &mut out)?;
        Ok(true)
    }
}

impl std::fmt::Debug for PluginBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginBase")
            .field("name", &self.description.name())
            .field("loader", &self.loader.kind())
            .field("data_folder", &self.data_folder)
            .field("file", &self.file)
            .finish()
    }
}
