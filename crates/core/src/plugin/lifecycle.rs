//! Plugin lifecycle management for Mirai

use super::{Plugin, PluginDescription, PluginLoader, PluginState, TaskScheduler};
use crate::event::{EventBus, EventError, Listener, RegisteredListener};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared identity of a loaded plugin
///
/// Listeners keep a reference to their owner, so the enabled flag lives here
/// rather than in the [`PluginHandle`]. Owners are compared by pointer.
pub struct PluginOwner {
    description: PluginDescription,
    enabled: AtomicBool,
}

impl PluginOwner {
    pub fn new(description: PluginDescription) -> Self {
        Self {
            description,
            enabled: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        self.description.name()
    }

    pub fn full_name(&self) -> String {
        self.description.full_name()
    }

    pub fn description(&self) -> &PluginDescription {
        &self.description
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl std::fmt::Debug for PluginOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginOwner")
            .field("name", &self.name())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Lifecycle hook being run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hook {
    Load,
    Enable,
    Disable,
}

/// Plugin handle for managing plugin lifecycle
pub struct PluginHandle {
    owner: Arc<PluginOwner>,
    plugin: Box<dyn Plugin>,
    scheduler: TaskScheduler,
    loader: Arc<dyn PluginLoader>,
    data_folder: PathBuf,
    file: String,
    state: PluginState,
}

impl PluginHandle {
    /// Create a new plugin handle
    pub(crate) fn new(
        description: PluginDescription,
        plugin: Box<dyn Plugin>,
        loader: Arc<dyn PluginLoader>,
        data_folder: PathBuf,
        file: String,
    ) -> Self {
        let scheduler = TaskScheduler::new(description.name());
        Self {
            owner: Arc::new(PluginOwner::new(description)),
            plugin,
            scheduler,
            loader,
            data_folder,
            file,
            state: PluginState::Loaded,
        }
    }

    /// Get plugin name
    pub fn name(&self) -> &str {
        self.owner.name()
    }

    pub fn description(&self) -> &PluginDescription {
        self.owner.description()
    }

    pub fn owner(&self) -> &Arc<PluginOwner> {
        &self.owner
    }

    pub fn is_enabled(&self) -> bool {
        self.owner.is_enabled()
    }

    /// Get plugin state
    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn loader(&self) -> &Arc<dyn PluginLoader> {
        &self.loader
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut TaskScheduler {
        &mut self.scheduler
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.owner.set_enabled(enabled);
        self.state = if enabled {
            PluginState::Enabled
        } else {
            PluginState::Disabled
        };
    }

    /// Run one lifecycle hook of the plugin
    pub(crate) fn call(
        &mut self,
        hook: Hook,
        events: &Arc<EventBus>,
        loaders: &mut Vec<Arc<dyn PluginLoader>>,
    ) -> anyhow::Result<()> {
        let mut ctx = PluginContext {
            owner: &self.owner,
            events,
            scheduler: &mut self.scheduler,
            data_folder: &self.data_folder,
            loaders,
        };

        match hook {
            Hook::Load => self.plugin.on_load(&mut ctx),
            Hook::Enable => self.plugin.on_enable(&mut ctx),
            Hook::Disable => self.plugin.on_disable(&mut ctx),
        }
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name())
            .field("state", &self.state)
            .field("loader", &self.loader.kind())
            .field("data_folder", &self.data_folder)
            .finish()
    }
}

/// What a plugin can reach from inside its lifecycle hooks
pub struct PluginContext<'a> {
    owner: &'a Arc<PluginOwner>,
    events: &'a Arc<EventBus>,
    scheduler: &'a mut TaskScheduler,
    data_folder: &'a Path,
    loaders: &'a mut Vec<Arc<dyn PluginLoader>>,
}

impl<'a> PluginContext<'a> {
    pub fn owner(&self) -> &Arc<PluginOwner> {
        self.owner
    }

    pub fn name(&self) -> &str {
        self.owner.name()
    }

    pub fn description(&self) -> &PluginDescription {
        self.owner.description()
    }

    pub fn is_enabled(&self) -> bool {
        self.owner.is_enabled()
    }

    pub fn data_folder(&self) -> &Path {
        self.data_folder
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        self.events
    }

    /// Register every handler declared by `listener` on behalf of this plugin
    pub fn register_events<L: Listener>(
        &self,
        listener: Arc<L>,
    ) -> Result<Vec<Arc<RegisteredListener>>, EventError> {
        self.events.register_listener(listener, self.owner)
    }

    pub fn scheduler(&mut self) -> &mut TaskScheduler {
        self.scheduler
    }

    /// Make a new packaging format available to the plugin manager
    ///
    /// Loaders added while plugins are being loaded are used to rescan the
    /// plugin directory once the current pass is over.
    pub fn register_loader(&mut self, loader: Arc<dyn PluginLoader>) {
        self.loaders.push(loader);
    }

    /// Turn this plugin off
    ///
    /// Meant to be called from `on_enable` when the plugin cannot run. The
    /// manager tears down whatever was registered once the hook returns.
    pub fn disable_self(&mut self) {
        if self.owner.is_enabled() {
            tracing::info!("Plugin {} disabled itself", self.owner.name());
            self.owner.set_enabled(false);
        }
    }
}
