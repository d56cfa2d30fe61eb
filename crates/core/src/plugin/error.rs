//! Plugin system errors

use super::description::DescriptionError;
use super::scheduler::SchedulerError;
use crate::config::ConfigError;
use crate::event::EventError;
use crate::permission::PermissionError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the plugin manager
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin manager {0} cannot be called from within itself")]
    Reentrant(&'static str),

    #[error("Plugin not found: {0}")]
    NotFound(String),

    #[error("Plugin data path {0} exists and is not a directory")]
    BadDataDirectory(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Description(#[from] DescriptionError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
