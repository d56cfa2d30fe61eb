//! Plugin loaders and entry point resolution

use super::{DescriptionError, Plugin, PluginDescription, ResourceProvider};
use crate::server::Server;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Constructor of a plugin's main type
///
/// Called with the loader, the server, the description, the data folder, the
/// prefixed plugin path and the resource provider, in that order.
pub type PluginConstructor = fn(
    Arc<dyn PluginLoader>,
    Arc<dyn Server>,
    PluginDescription,
    PathBuf,
    String,
    Arc<dyn ResourceProvider>,
) -> Box<dyn Plugin>;

/// Strategy for recognizing and loading one packaging format
pub trait PluginLoader: Send + Sync {
    /// Unique identifier of this loader type
    fn kind(&self) -> &str;

    /// Whether `path` looks like a plugin this loader understands
    fn can_load_plugin(&self, path: &Path) -> bool;

    /// Read the description of the plugin at `path`
    ///
    /// `Ok(None)` means the candidate carries no description and is silently
    /// skipped.
    fn plugin_description(
        &self,
        path: &Path,
    ) -> Result<Option<PluginDescription>, DescriptionError>;

    /// Make the plugin's code available, `path` is prefixed with [`Self::access_protocol`]
    fn load_plugin(&self, path: &str) -> anyhow::Result<()>;

    /// Resolve the constructor named by a description's `main`
    fn entry_point(&self, main: &str) -> Option<PluginConstructor>;

    /// Prefix prepended to plugin paths handed out by this loader
    fn access_protocol(&self) -> &str {
        ""
    }
}

/// Table of plugin constructors keyed by their `main` identifier
#[derive(Default, Clone)]
pub struct EntryPointRegistry {
    entries: HashMap<String, PluginConstructor>,
}

impl EntryPointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constructor
    pub fn with(mut self, main: impl Into<String>, constructor: PluginConstructor) -> Self {
        self.register(main, constructor);
        self
    }

    pub fn register(&mut self, main: impl Into<String>, constructor: PluginConstructor) {
        self.entries.insert(main.into(), constructor);
    }

    pub fn get(&self, main: &str) -> Option<PluginConstructor> {
        self.entries.get(main).copied()
    }

    pub fn contains(&self, main: &str) -> bool {
        self.entries.contains_key(main)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for EntryPointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
