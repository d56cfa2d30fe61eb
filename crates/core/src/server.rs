//! Host server handle given to plugins

use semver::Version;

/// API version of the plugin system exposed by this crate
pub const PLUGIN_API_VERSION: &str = "1.0.0";

/// The parts of the host server that the plugin core depends on
pub trait Server: Send + Sync {
    /// Name of the server software
    fn name(&self) -> &str;

    /// Version of the server software
    fn version(&self) -> &str;

    /// Plugin API version implemented by the server
    fn api_version(&self) -> &Version;
}

/// Static server description, sufficient for embedding and tests
#[derive(Debug, Clone)]
pub struct ServerInfo {
    name: String,
    version: String,
    api_version: Version,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>, api_version: Version) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            api_version,
        }
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "Mirai".to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            api_version: Version::new(1, 0, 0),
        }
    }
}

impl Server for ServerInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn api_version(&self) -> &Version {
        &self.api_version
    }
}
