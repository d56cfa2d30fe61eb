//! Plugin system for Mirai server
//!
//! Plugins are discovered by [`PluginLoader`]s, described by a
//! [`PluginDescription`] and instantiated through the constructor registered
//! for their `main` entry. The [`PluginManager`] owns the instances and moves
//! them between the enabled and disabled states.

pub mod base;
pub mod description;
pub mod error;
pub mod events;
pub mod folder_loader;
pub mod graylist;
pub mod lifecycle;
pub mod loadability;
pub mod loader;
pub mod manager;
pub mod plugin;
pub mod resource;
pub mod scheduler;
pub mod script_loader;
mod triage;

pub use base::PluginBase;
pub use description::{DescriptionError, PluginDescription, PluginLoadOrder};
pub use error::PluginError;
pub use events::{PluginDisableEvent, PluginEnableEvent};
pub use folder_loader::FolderPluginLoader;
pub use graylist::{GraylistConfig, GraylistMode, PluginGraylist};
pub use lifecycle::{PluginContext, PluginHandle, PluginOwner};
pub use loadability::{Incompatibility, PluginLoadabilityChecker};
pub use loader::{EntryPointRegistry, PluginConstructor, PluginLoader};
pub use manager::PluginManager;
pub use plugin::{Plugin, PluginState};
pub use resource::{DiskResourceProvider, ResourceProvider};
pub use scheduler::{ClosureTask, SchedulerError, Task, TaskId, TaskScheduler};
pub use script_loader::ScriptPluginLoader;
