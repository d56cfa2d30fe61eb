//! Permission registry used by plugins
//!
//! Plugins declare permissions in their manifest. On load every declared
//! permission is registered here and attached to one of the root group nodes
//! according to its default tier.

pub mod manager;
pub mod parser;
pub mod permission;

pub use manager::PermissionManager;
pub use parser::{ChildEntry, PermissionDefault, PermissionEntry};
pub use permission::Permission;

use thiserror::Error;

/// Names of the root permission nodes
pub struct DefaultPermissions;

impl DefaultPermissions {
    /// Granted to every player
    pub const ROOT_USER: &'static str = "mirai.group.user";
    /// Granted to server operators, includes [`Self::ROOT_USER`]
    pub const ROOT_OPERATOR: &'static str = "mirai.group.operator";
}

/// Permission registry errors
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("Permission '{0}' is already registered")]
    Duplicate(String),

    #[error("Permission '{0}' is not registered")]
    NotFound(String),

    #[error("Invalid default \"{value}\" for permission '{permission}'")]
    InvalidDefault { permission: String, value: String },
}
