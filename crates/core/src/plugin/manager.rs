//! Plugin discovery, loading and enable/disable orchestration

use super::lifecycle::Hook;
use super::triage::DependencyGraph;
use super::{
    DiskResourceProvider, PluginDisableEvent, PluginEnableEvent, PluginError, PluginGraylist,
    PluginHandle, PluginLoadOrder, PluginLoadabilityChecker, PluginLoader, PluginDescription,
};
use crate::config::PluginManagerConfig;
use crate::event::{Event, EventBus};
use crate::permission::PermissionManager;
use crate::server::Server;
use indexmap::{IndexMap, IndexSet};
use rand::seq::SliceRandom;
use semver::Version;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owns every loaded plugin and drives their lifecycle
///
/// Plugins are discovered with [`PluginManager::load_plugins`], which asks
/// every registered [`PluginLoader`] about every entry of a directory, and
/// enabled with [`PluginManager::enable_plugins`] in dependency order.
pub struct PluginManager {
    server: Arc<dyn Server>,
    events: Arc<EventBus>,
    permissions: PermissionManager,
    api_version: Version,
    plugin_directory: Option<PathBuf>,
    data_directory: Option<PathBuf>,
    graylist: Option<PluginGraylist>,
    loaders: IndexMap<String, Arc<dyn PluginLoader>>,
    pending_loaders: Vec<Arc<dyn PluginLoader>>,
    plugins: IndexMap<String, PluginHandle>,
    enabled: IndexSet<String>,
    busy: Arc<AtomicBool>,
}

impl PluginManager {
    /// Create a new plugin manager
    ///
    /// The data directory is created when missing.
    pub fn new(
        server: Arc<dyn Server>,
        events: Arc<EventBus>,
        data_directory: Option<PathBuf>,
        graylist: Option<PluginGraylist>,
    ) -> Result<Self, PluginError> {
        if let Some(directory) = &data_directory {
            if !directory.exists() {
                create_directory(directory)?;
            } else if !directory.is_dir() {
                return Err(PluginError::BadDataDirectory(directory.clone()));
            }
        }

        Ok(Self {
            api_version: server.api_version().clone(),
            server,
            events,
            permissions: PermissionManager::new(),
            plugin_directory: None,
            data_directory,
            graylist,
            loaders: IndexMap::new(),
            pending_loaders: Vec::new(),
            plugins: IndexMap::new(),
            enabled: IndexSet::new(),
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Create a plugin manager from its configuration
    ///
    /// The configured API version replaces the one reported by `server` when
    /// checking plugin compatibility.
    pub fn from_config(
        server: Arc<dyn Server>,
        events: Arc<EventBus>,
        config: &PluginManagerConfig,
    ) -> Result<Self, PluginError> {
        config.validate()?;

        let mut manager = Self::new(
            server,
            events,
            config.data_path.clone(),
            config.graylist.clone().map(PluginGraylist::from),
        )?;
        manager.api_version = config.api_version.clone();
        manager.plugin_directory = Some(config.plugin_path.clone());
        Ok(manager)
    }

    pub fn server(&self) -> &Arc<dyn Server> {
        &self.server
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn permissions(&self) -> &PermissionManager {
        &self.permissions
    }

    pub fn permissions_mut(&mut self) -> &mut PermissionManager {
        &mut self.permissions
    }

    /// Plugin API version plugins are checked against
    pub fn api_version(&self) -> &Version {
        &self.api_version
    }

    /// Directory scanned by [`PluginManager::load_plugin_directory`]
    pub fn plugin_directory(&self) -> Option<&Path> {
        self.plugin_directory.as_deref()
    }

    pub fn data_directory(&self) -> Option<&Path> {
        self.data_directory.as_deref()
    }

    pub fn graylist(&self) -> Option<&PluginGraylist> {
        self.graylist.as_ref()
    }

    /// Register a loader, replacing any loader of the same kind
    pub fn register_loader(&mut self, loader: Arc<dyn PluginLoader>) {
        tracing::debug!("Registered plugin loader: {}", loader.kind());
        self.loaders.insert(loader.kind().to_owned(), loader);
    }

    pub fn loaders(&self) -> impl Iterator<Item = &Arc<dyn PluginLoader>> {
        self.loaders.values()
    }

    pub fn plugin(&self, name: &str) -> Option<&PluginHandle> {
        self.plugins.get(name)
    }

    pub fn plugin_mut(&mut self, name: &str) -> Option<&mut PluginHandle> {
        self.plugins.get_mut(name)
    }

    /// Every loaded plugin, in load order
    pub fn plugins(&self) -> impl Iterator<Item = &PluginHandle> {
        self.plugins.values()
    }

    pub fn is_plugin_enabled(&self, name: &str) -> bool {
        self.plugins
            .get(name)
            .map(PluginHandle::is_enabled)
            .unwrap_or(false)
    }

    /// Names of the enabled plugins, in the order they were enabled
    pub fn enabled_plugins(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }

    /// Load every plugin of the given phase found at `path`
    ///
    /// `path` is either a directory whose entries are the candidates or a
    /// single candidate file. Loaders registered by plugins during the pass
    /// trigger another pass over `path` with only those loaders. Returns the
    /// names of the plugins loaded.
    pub fn load_plugins(
        &mut self,
        path: &Path,
        phase: PluginLoadOrder,
    ) -> Result<Vec<String>, PluginError> {
        let _guard = PassGuard::acquire(&self.busy, "load_plugins()")?;

        let mut loaded = Vec::new();
        let mut only: Option<Vec<String>> = None;
        loop {
            let known: HashSet<String> = self.loaders.keys().cloned().collect();
            let found = self.load_pass(path, phase, only.as_deref());
            if only.is_some() {
                tracing::debug!("New loaders found plugins: {}", found.join(", "));
            }
            loaded.extend(found);

            let new: Vec<String> = self
                .loaders
                .keys()
                .filter(|kind| !known.contains(*kind))
                .cloned()
                .collect();
            if new.is_empty() {
                break;
            }
            only = Some(new);
        }

        Ok(loaded)
    }

    /// Load the plugins of the configured plugin directory
    ///
    /// Managers created without a configuration have no plugin directory and
    /// load nothing here.
    pub fn load_plugin_directory(
        &mut self,
        phase: PluginLoadOrder,
    ) -> Result<Vec<String>, PluginError> {
        match self.plugin_directory.clone() {
            Some(directory) => self.load_plugins(&directory, phase),
            None => Ok(Vec::new()),
        }
    }

    fn load_pass(
        &mut self,
        path: &Path,
        phase: PluginLoadOrder,
        only: Option<&[String]>,
    ) -> Vec<String> {
        let loaders: Vec<Arc<dyn PluginLoader>> = match only {
            Some(kinds) => kinds
                .iter()
                .filter_map(|kind| self.loaders.get(kind).cloned())
                .collect(),
            None => self.loaders.values().cloned().collect(),
        };

        let candidates = match candidates(path) {
            Ok(candidates) => candidates,
            Err(error) => {
                tracing::error!("Could not scan {} for plugins: {}", path.display(), error);
                return Vec::new();
            }
        };

        let checker = PluginLoadabilityChecker::new(self.api_version.clone());
        let mut loaded = Vec::new();

        for loader in &loaders {
            for file in &candidates {
                if !loader.can_load_plugin(file) {
                    continue;
                }

                let description = match loader.plugin_description(file) {
                    Ok(Some(description)) => description,
                    Ok(None) => continue,
                    Err(error) => {
                        tracing::error!(
                            "Could not load plugin '{}': Invalid plugin manifest: {}",
                            file.display(),
                            error
                        );
                        continue;
                    }
                };
                if description.order() != phase {
                    continue;
                }

                let name = description.name().to_owned();

                if let Err(reason) = checker.check(&description) {
                    tracing::error!("Could not load plugin '{}': {}", name, reason);
                    continue;
                }

                if self.plugins.contains_key(&name) {
                    tracing::error!("Could not load plugin '{}': plugin exists", name);
                    continue;
                }

                if name.contains(' ') {
                    tracing::warn!(
                        "Plugin '{}' uses spaces in its name, this is discouraged",
                        name
                    );
                }

                if let Some(graylist) = &self.graylist {
                    if !graylist.is_allowed(&name) {
                        tracing::info!(
                            "Could not load plugin '{}': Disallowed by {}",
                            name,
                            if graylist.is_whitelist() { "whitelist" } else { "blacklist" }
                        );
                        continue;
                    }
                }

                if self.load_plugin(file, loader, description) {
                    loaded.push(name);
                }
            }
        }

        loaded
    }

    fn plugin_data_folder(&self, file: &Path, name: &str) -> PathBuf {
        match &self.data_directory {
            Some(directory) => directory.join(name),
            None => file.parent().unwrap_or_else(|| Path::new(".")).join(name),
        }
    }

    fn load_plugin(
        &mut self,
        file: &Path,
        loader: &Arc<dyn PluginLoader>,
        description: PluginDescription,
    ) -> bool {
        let name = description.name().to_owned();
        tracing::info!("Loading {}", description.full_name());

        let data_folder = self.plugin_data_folder(file, &name);
        if data_folder.exists() && !data_folder.is_dir() {
            tracing::error!(
                "Could not load plugin '{}': Projected data folder '{}' already exists and is not a directory",
                name,
                data_folder.display()
            );
            return false;
        }
        if !data_folder.exists() {
            if let Err(error) = create_directory(&data_folder) {
                tracing::error!("Could not load plugin '{}': {}", name, error);
                return false;
            }
        }

        let prefixed = format!("{}{}", loader.access_protocol(), file.display());
        if let Err(error) = loader.load_plugin(&prefixed) {
            tracing::error!("Could not load plugin '{}': {:#}", name, error);
            return false;
        }

        let Some(constructor) = loader.entry_point(description.main()) else {
            tracing::error!(
                "Could not load plugin '{}': Entry point {} not found",
                name,
                description.main()
            );
            return false;
        };

        let mut declared = HashSet::new();
        for permission in description.permissions().values().flatten() {
            if self.permissions.has_registered(permission.name())
                || !declared.insert(permission.name())
            {
                tracing::error!(
                    "Could not load plugin '{}': Permission '{}' is already registered",
                    name,
                    permission.name()
                );
                return false;
            }
        }

        let resources = Arc::new(DiskResourceProvider::new(format!("{}/resources/", prefixed)));
        let plugin = constructor(
            Arc::clone(loader),
            Arc::clone(&self.server),
            description.clone(),
            data_folder.clone(),
            prefixed.clone(),
            resources,
        );

        let mut handle =
            PluginHandle::new(description, plugin, Arc::clone(loader), data_folder, prefixed);
        if let Err(error) = handle.call(Hook::Load, &self.events, &mut self.pending_loaders) {
            tracing::error!("Could not load plugin '{}': {:#}", name, error);
            self.pending_loaders.clear();
            return false;
        }

        for (default, permissions) in handle.description().permissions() {
            for permission in permissions {
                let registered = self.permissions.add_with_default(permission.clone(), *default);
                if let Err(error) = registered {
                    tracing::error!(
                        "Failed to register permission of plugin '{}': {}",
                        name,
                        error
                    );
                }
            }
        }

        self.plugins.insert(name, handle);
        self.register_pending_loaders();
        true
    }

    /// Enable every loaded plugin whose dependencies can be satisfied
    ///
    /// Plugins with missing, failed or circular hard dependencies are logged
    /// and left disabled.
    pub fn enable_plugins(&mut self) -> Result<(), PluginError> {
        let _guard = PassGuard::acquire(&self.busy, "enable_plugins()")?;

        let descriptions = self.plugins.values().map(PluginHandle::description);
        let order = DependencyGraph::new(descriptions).enable_order();
        for name in order {
            if !self.is_plugin_enabled(&name) {
                self.enable_plugin(&name)?;
            }
        }
        Ok(())
    }

    /// Enable a single plugin, regardless of its dependencies
    pub fn enable_plugin(&mut self, name: &str) -> Result<(), PluginError> {
        let handle = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| PluginError::NotFound(name.to_owned()))?;
        if handle.is_enabled() {
            return Ok(());
        }

        tracing::info!("Enabling {}", handle.description().full_name());
        handle.scheduler_mut().set_enabled(true);
        handle.set_enabled(true);

        if let Err(error) = handle.call(Hook::Enable, &self.events, &mut self.pending_loaders) {
            tracing::error!("Error occurred while enabling {}: {:#}", name, error);
            handle.owner().set_enabled(false);
        }

        let owner = Arc::clone(handle.owner());
        if owner.is_enabled() {
            self.enabled.insert(name.to_owned());
            self.register_pending_loaders();
            self.publish(PluginEnableEvent::new(owner));
        } else {
            // Turned off during its own enable hook; undo what it registered
            let disabled = handle.call(Hook::Disable, &self.events, &mut self.pending_loaders);
            if let Err(error) = disabled {
                tracing::error!("Error occurred while disabling {}: {:#}", name, error);
            }
            handle.set_enabled(false);
            handle.scheduler_mut().shutdown();
            self.events.unregister_all(&owner);
            self.register_pending_loaders();
        }

        Ok(())
    }

    /// Disable a single plugin
    pub fn disable_plugin(&mut self, name: &str) -> Result<(), PluginError> {
        let handle = self
            .plugins
            .get(name)
            .ok_or_else(|| PluginError::NotFound(name.to_owned()))?;
        if !handle.is_enabled() {
            return Ok(());
        }

        tracing::info!("Disabling {}", handle.description().full_name());
        let owner = Arc::clone(handle.owner());
        self.publish(PluginDisableEvent::new(Arc::clone(&owner)));

        self.enabled.shift_remove(name);

        if let Some(handle) = self.plugins.get_mut(name) {
            handle.set_enabled(false);
            let disabled = handle.call(Hook::Disable, &self.events, &mut self.pending_loaders);
            if let Err(error) = disabled {
                tracing::error!("Error occurred while disabling {}: {:#}", name, error);
            }
            handle.scheduler_mut().shutdown();
        }
        self.events.unregister_all(&owner);
        self.register_pending_loaders();

        Ok(())
    }

    /// Disable every plugin, in load order
    pub fn disable_plugins(&mut self) {
        let names: Vec<String> = self.plugins.keys().cloned().collect();
        for name in names {
            if let Err(error) = self.disable_plugin(&name) {
                tracing::error!("Failed to disable {}: {}", name, error);
            }
        }
    }

    /// Disable and forget every plugin and loader
    ///
    /// Permissions declared by plugins are dropped too, so the same plugins
    /// can be loaded again afterwards.
    pub fn clear_plugins(&mut self) {
        self.disable_plugins();
        self.plugins.clear();
        self.enabled.clear();
        self.loaders.clear();
        self.pending_loaders.clear();
        self.permissions.clear_permissions();
    }

    /// Run the schedulers of every enabled plugin
    pub fn tick(&mut self, current_tick: u64) {
        for name in &self.enabled {
            if let Some(handle) = self.plugins.get_mut(name) {
                handle.scheduler_mut().heartbeat(current_tick);
            }
        }
    }

    fn register_pending_loaders(&mut self) {
        for loader in std::mem::take(&mut self.pending_loaders) {
            self.register_loader(loader);
        }
    }

    fn publish<E: Event>(&self, mut event: E) {
        if let Err(error) = self.events.publish(&mut event) {
            tracing::error!("Failed to publish {}: {}", crate::event::EventType::of::<E>(), error);
        }
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("loaders", &self.loaders.keys().collect::<Vec<_>>())
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("enabled", &self.enabled)
            .field("data_directory", &self.data_directory)
            .finish()
    }
}

/// Candidate paths below `path`, shuffled so plugins cannot rely on directory order
fn candidates(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    if path.is_dir() {
        let mut entries = std::fs::read_dir(path)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .collect::<Vec<_>>();
        entries.shuffle(&mut rand::thread_rng());
        Ok(entries)
    } else if path.is_file() {
        Ok(vec![path.canonicalize()?])
    } else {
        Ok(Vec::new())
    }
}

fn create_directory(path: &Path) -> Result<(), PluginError> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }

    builder.create(path).map_err(|source| PluginError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })
}

/// Marks a load or enable pass as running until dropped
struct PassGuard {
    busy: Arc<AtomicBool>,
}

impl PassGuard {
    fn acquire(busy: &Arc<AtomicBool>, operation: &'static str) -> Result<Self, PluginError> {
        if busy.swap(true, Ordering::AcqRel) {
            return Err(PluginError::Reentrant(operation));
        }
        Ok(Self {
            busy: Arc::clone(busy),
        })
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
