//! Core plugin trait and types for Mirai

use super::PluginContext;
use anyhow::Result;

/// Core trait that all Mirai plugins must implement
///
/// Instances are produced by the constructor registered for the description's
/// `main` entry, see [`super::PluginConstructor`]. Every hook receives a
/// [`PluginContext`] giving access to the event bus and the plugin's own
/// scheduler.
pub trait Plugin: Send {
    /// Called once, right after the plugin was constructed
    ///
    /// The plugin is not enabled yet, so listeners cannot be registered here.
    /// Returning an error aborts loading of this plugin.
    fn on_load(&mut self, _ctx: &mut PluginContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called every time the plugin is enabled
    ///
    /// Returning an error, or calling [`PluginContext::disable_self`], leaves
    /// the plugin disabled.
    fn on_enable(&mut self, _ctx: &mut PluginContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called every time the plugin is disabled
    fn on_disable(&mut self, _ctx: &mut PluginContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle state of a loaded plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginState {
    /// Constructed but never enabled
    Loaded,
    /// Enabled and receiving events
    Enabled,
    /// Enabled before, disabled now
    Disabled,
}

impl PluginState {
    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }
}
