//! Plugin lifecycle and event dispatch core of the Mirai server
//!
//! The [`plugin::PluginManager`] discovers plugins through its registered
//! [`plugin::PluginLoader`]s, enables them in dependency order and drives their
//! schedulers. Plugins talk to each other and to the server through the shared
//! [`event::EventBus`].

pub mod config;
pub mod event;
pub mod permission;
pub mod plugin;
pub mod server;
pub mod timings;

pub use config::{ConfigError, PluginManagerConfig};
pub use event::{Cancellable, Event, EventBus, EventPriority, Listener};
pub use permission::PermissionManager;
pub use plugin::{Plugin, PluginContext, PluginDescription, PluginError, PluginManager};
pub use server::{Server, ServerInfo};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`, defaulting to `info`
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging() -> bool {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
