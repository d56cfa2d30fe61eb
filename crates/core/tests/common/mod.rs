//! Shared fixtures for the plugin manager integration tests
//!
//! Plugins write what happens to them into a per-thread journal; every test
//! runs on its own thread, so journals never mix.

#![allow(dead_code)]

use mirai_core::event::{EventPriority, HandlerTable, Listener};
use mirai_core::plugin::{
    ClosureTask, EntryPointRegistry, FolderPluginLoader, Plugin, PluginBase, PluginContext,
    PluginDescription, PluginDisableEvent, PluginEnableEvent, PluginGraylist, PluginLoader,
    PluginManager, ResourceProvider, ScriptPluginLoader,
};
use mirai_core::server::{Server, ServerInfo};
use mirai_core::EventBus;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

thread_local! {
    static JOURNAL: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub fn record(entry: impl Into<String>) {
    JOURNAL.with(|journal| journal.borrow_mut().push(entry.into()));
}

pub fn journal() -> Vec<String> {
    JOURNAL.with(|journal| journal.borrow().clone())
}

/// Journal entries starting with `prefix`, with the prefix removed
pub fn entries(prefix: &str) -> Vec<String> {
    journal()
        .into_iter()
        .filter_map(|entry| entry.strip_prefix(prefix).map(str::to_owned))
        .collect()
}

/// Event published by the tests; every listening plugin adds its name
#[derive(Debug, Default)]
pub struct Ping {
    pub hits: Vec<String>,
}

mirai_core::impl_event!(Ping);

pub struct PingListener {
    plugin: String,
}

impl PingListener {
    fn on_ping(&self, event: &mut Ping) -> anyhow::Result<()> {
        event.hits.push(self.plugin.clone());
        Ok(())
    }
}

impl Listener for PingListener {
    fn handlers(table: &mut HandlerTable<Self>) {
        table.handle("on_ping", Self::on_ping);
    }
}

/// Listens to [`Ping`] and ticks while enabled
pub struct Recorder {
    base: PluginBase,
}

impl Plugin for Recorder {
    fn on_load(&mut self, _ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        record(format!("load:{}", self.base.name()));
        Ok(())
    }

    fn on_enable(&mut self, ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        record(format!("enable:{}", self.base.name()));
        ctx.register_events(Arc::new(PingListener {
            plugin: self.base.name().to_owned(),
        }))?;

        let name = self.base.name().to_owned();
        ctx.scheduler().schedule_repeating_task(
            ClosureTask::new(move |tick| {
                record(format!("tick:{}:{}", name, tick));
                Ok(())
            }),
            1,
        )?;
        Ok(())
    }

    fn on_disable(&mut self, _ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        record(format!("disable:{}", self.base.name()));
        Ok(())
    }
}

/// Watches plugins being enabled and disabled
pub struct Observer {
    base: PluginBase,
}

impl Plugin for Observer {
    fn on_enable(&mut self, ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        record(format!("enable:{}", self.base.name()));
        ctx.event_bus().register(
            |event: &mut PluginEnableEvent| {
                record(format!("enabled-event:{}", event.plugin().name()));
                Ok(())
            },
            EventPriority::Monitor,
            ctx.owner(),
            false,
        )?;
        ctx.event_bus().register(
            |event: &mut PluginDisableEvent| {
                record(format!("disabled-event:{}", event.plugin().name()));
                Ok(())
            },
            EventPriority::Monitor,
            ctx.owner(),
            false,
        )?;
        Ok(())
    }
}

/// Registers a listener and then gives up during its own enable hook
pub struct Quitter {
    base: PluginBase,
}

impl Plugin for Quitter {
    fn on_enable(&mut self, ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        ctx.register_events(Arc::new(PingListener {
            plugin: self.base.name().to_owned(),
        }))?;
        ctx.disable_self();
        Ok(())
    }

    fn on_disable(&mut self, _ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        record(format!("disable:{}", self.base.name()));
        Ok(())
    }
}

/// Fails its enable hook
pub struct Failing {
    _base: PluginBase,
}

impl Plugin for Failing {
    fn on_enable(&mut self, _ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        anyhow::bail!("missing configuration")
    }
}

/// Fails its load hook
pub struct BrokenLoad {
    _base: PluginBase,
}

impl Plugin for BrokenLoad {
    fn on_load(&mut self, _ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        anyhow::bail!("cannot initialize")
    }
}

/// Provides the script plugin format while loading
pub struct LoaderProvider {
    _base: PluginBase,
}

impl Plugin for LoaderProvider {
    fn on_load(&mut self, ctx: &mut PluginContext<'_>) -> anyhow::Result<()> {
        ctx.register_loader(Arc::new(ScriptPluginLoader::new(entry_points())));
        Ok(())
    }
}

macro_rules! constructor {
    ($name:ident, $plugin:ident, $field:ident) => {
        fn $name(
            loader: Arc<dyn PluginLoader>,
            server: Arc<dyn Server>,
            description: PluginDescription,
            data_folder: PathBuf,
            file: String,
            resources: Arc<dyn ResourceProvider>,
        ) -> Box<dyn Plugin> {
            Box::new($plugin {
                $field: PluginBase::new(loader, server, description, data_folder, file, resources),
            })
        }
    };
}

constructor!(new_recorder, Recorder, base);
constructor!(new_observer, Observer, base);
constructor!(new_quitter, Quitter, base);
constructor!(new_failing, Failing, _base);
constructor!(new_broken_load, BrokenLoad, _base);
constructor!(new_loader_provider, LoaderProvider, _base);

pub fn entry_points() -> EntryPointRegistry {
    EntryPointRegistry::new()
        .with("test::Recorder", new_recorder)
        .with("test::Observer", new_observer)
        .with("test::Quitter", new_quitter)
        .with("test::Failing", new_failing)
        .with("test::BrokenLoad", new_broken_load)
        .with("test::LoaderProvider", new_loader_provider)
}

/// Write `<root>/<dir>/plugin.toml`
pub fn write_plugin(root: &Path, dir: &str, name: &str, main: &str, extra: &str) {
    let folder = root.join(dir);
    std::fs::create_dir_all(&folder).expect("Failed to create plugin folder");
    std::fs::write(
        folder.join("plugin.toml"),
        format!(
            "name = \"{}\"\nversion = \"1.0.0\"\nmain = \"{}\"\napi = \"1.0.0\"\n{}",
            name, main, extra
        ),
    )
    .expect("Failed to write manifest");
}

/// Write a `Recorder` plugin whose directory is named after it
pub fn write_recorder(root: &Path, name: &str, extra: &str) {
    write_plugin(root, name, name, "test::Recorder", extra);
}

pub fn manager_with(data: &Path, graylist: Option<PluginGraylist>) -> PluginManager {
    let mut manager = PluginManager::new(
        Arc::new(ServerInfo::default()),
        Arc::new(EventBus::new()),
        Some(data.to_path_buf()),
        graylist,
    )
    .expect("Failed to create plugin manager");
    manager.register_loader(Arc::new(FolderPluginLoader::new(entry_points())));
    manager
}

pub fn manager(data: &Path) -> PluginManager {
    manager_with(data, None)
}

/// Publish a [`Ping`] and return the plugins that received it
pub fn ping(manager: &PluginManager) -> Vec<String> {
    let mut event = Ping::default();
    manager
        .event_bus()
        .publish(&mut event)
        .expect("Failed to publish ping");
    event.hits
}
