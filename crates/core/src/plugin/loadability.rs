//! Checks deciding whether a described plugin can run on this server

use super::PluginDescription;
use semver::Version;
use thiserror::Error;

/// Why a plugin cannot be loaded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Incompatibility {
    #[error("Incompatible API version: plugin requires {required:?}, server provides {server}")]
    Api { required: Vec<String>, server: String },

    #[error("Invalid API version \"{0}\"")]
    InvalidApi(String),

    #[error("Incompatible operating system: plugin supports {supported:?}, server is {current}")]
    OperatingSystem { supported: Vec<String>, current: String },
}

/// Checks plugin descriptions against the running server
#[derive(Debug, Clone)]
pub struct PluginLoadabilityChecker {
    api_version: Version,
    os: String,
}

impl PluginLoadabilityChecker {
    /// Create a checker for the current operating system
    pub fn new(api_version: Version) -> Self {
        Self {
            api_version,
            os: std::env::consts::OS.to_owned(),
        }
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    /// `Ok` when the plugin can be loaded
    pub fn check(&self, description: &PluginDescription) -> Result<(), Incompatibility> {
        let mut compatible = false;
        for api in description.compatible_apis() {
            let version =
                parse_lenient(api).ok_or_else(|| Incompatibility::InvalidApi(api.clone()))?;
            if self.is_compatible(&version) {
                compatible = true;
            }
        }
        if !compatible {
            return Err(Incompatibility::Api {
                required: description.compatible_apis().to_vec(),
                server: self.api_version.to_string(),
            });
        }

        let supported = description.compatible_operating_systems();
        if !supported.is_empty() && !supported.iter().any(|os| os.eq_ignore_ascii_case(&self.os)) {
            return Err(Incompatibility::OperatingSystem {
                supported: supported.to_vec(),
                current: self.os.clone(),
            });
        }

        Ok(())
    }

    /// Same major version and no newer than the server
    fn is_compatible(&self, required: &Version) -> bool {
        if required.major != self.api_version.major {
            return false;
        }
        // A pre-release API is only compatible with exactly itself
        if !required.pre.is_empty() || !self.api_version.pre.is_empty() {
            return *required == self.api_version;
        }
        (required.minor, required.patch) <= (self.api_version.minor, self.api_version.patch)
    }
}

/// Parse `1`, `1.2` or `1.2.3` style versions
fn parse_lenient(version: &str) -> Option<Version> {
    let version = version.trim();
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let mut parts = version.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = parts.next().map(str::parse::<u64>).transpose().ok()?.unwrap_or(0);
    let patch = parts.next().map(str::parse::<u64>).transpose().ok()?.unwrap_or(0);
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, patch))
}
