//! Events published by the plugin manager

use super::PluginOwner;
use std::sync::Arc;

/// Published after a plugin was enabled and is still enabled
#[derive(Debug, Clone)]
pub struct PluginEnableEvent {
    plugin: Arc<PluginOwner>,
}

impl PluginEnableEvent {
    pub fn new(plugin: Arc<PluginOwner>) -> Self {
        Self { plugin }
    }

    pub fn plugin(&self) -> &Arc<PluginOwner> {
        &self.plugin
    }
}

crate::impl_event!(PluginEnableEvent);

/// Published before a plugin is disabled
#[derive(Debug, Clone)]
pub struct PluginDisableEvent {
    plugin: Arc<PluginOwner>,
}

impl PluginDisableEvent {
    pub fn new(plugin: Arc<PluginOwner>) -> Self {
        Self { plugin }
    }

    pub fn plugin(&self) -> &Arc<PluginOwner> {
        &self.plugin
    }
}

crate::impl_event!(PluginDisableEvent);
