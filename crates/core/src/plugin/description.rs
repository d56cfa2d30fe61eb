//! Plugin descriptions parsed from manifests

use crate::permission::parser::parse_permissions;
use crate::permission::{Permission, PermissionDefault, PermissionEntry};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Namespace reserved for the server's own code
const RESERVED_MAIN_PREFIXES: [&str; 2] = ["mirai::", "mirai_core::"];

/// Errors raised while parsing a plugin manifest
#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("Manifest syntax error: {0}")]
    Syntax(String),

    #[error("Missing required field \"{0}\"")]
    MissingField(&'static str),

    #[error("Invalid plugin name \"{0}\"")]
    InvalidName(String),

    #[error("Invalid plugin main \"{0}\", cannot start within the Mirai namespace")]
    ReservedMain(String),

    #[error("Invalid plugin \"load\" {0}")]
    InvalidLoadOrder(String),

    #[error(transparent)]
    Permission(#[from] crate::permission::PermissionError),

    #[error("Failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// Server stage at which a plugin is loaded and enabled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginLoadOrder {
    /// Before any world is loaded
    #[serde(rename = "STARTUP")]
    Startup,
    /// After the default worlds are loaded
    #[default]
    #[serde(rename = "POSTWORLD")]
    PostWorld,
}

impl PluginLoadOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "STARTUP",
            Self::PostWorld => "POSTWORLD",
        }
    }
}

impl FromStr for PluginLoadOrder {
    type Err = DescriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STARTUP" => Ok(Self::Startup),
            "POSTWORLD" => Ok(Self::PostWorld),
            _ => Err(DescriptionError::InvalidLoadOrder(s.to_owned())),
        }
    }
}

impl std::fmt::Display for PluginLoadOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable metadata describing a plugin
#[derive(Debug, Clone, PartialEq)]
pub struct PluginDescription {
    name: String,
    version: String,
    main: String,
    api: Vec<String>,
    compatible_os: Vec<String>,
    depend: Vec<String>,
    soft_depend: Vec<String>,
    load_before: Vec<String>,
    description: String,
    authors: Vec<String>,
    website: String,
    prefix: String,
    order: PluginLoadOrder,
    permissions: IndexMap<PermissionDefault, Vec<Permission>>,
}

impl PluginDescription {
    /// Create a description with the required fields only
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        main: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            main: main.into(),
            api: Vec::new(),
            compatible_os: Vec::new(),
            depend: Vec::new(),
            soft_depend: Vec::new(),
            load_before: Vec::new(),
            description: String::new(),
            authors: Vec::new(),
            website: String::new(),
            prefix: String::new(),
            order: PluginLoadOrder::default(),
            permissions: IndexMap::new(),
        }
    }

    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api.push(api.into());
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.depend.push(name.into());
        self
    }

    pub fn with_soft_dependency(mut self, name: impl Into<String>) -> Self {
        self.soft_depend.push(name.into());
        self
    }

    pub fn with_load_before(mut self, name: impl Into<String>) -> Self {
        self.load_before.push(name.into());
        self
    }

    pub fn with_order(mut self, order: PluginLoadOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_permission(mut self, default: PermissionDefault, permission: Permission) -> Self {
        self.permissions.entry(default).or_default().push(permission);
        self
    }

    /// Parse a TOML manifest
    pub fn from_toml(content: &str) -> Result<Self, DescriptionError> {
        let document: ManifestDocument =
            toml::from_str(content).map_err(|e| DescriptionError::Syntax(e.to_string()))?;
        Self::from_document(document)
    }

    /// Parse a TOML manifest file
    pub fn from_file(path: &Path) -> Result<Self, DescriptionError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Validate a raw manifest and turn it into a description
    pub(crate) fn from_document(document: ManifestDocument) -> Result<Self, DescriptionError> {
        let raw_name = document.name.ok_or(DescriptionError::MissingField("name"))?;
        let name: String = raw_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-'))
            .collect();
        if name.is_empty() {
            return Err(DescriptionError::InvalidName(raw_name));
        }

        let version = document.version.ok_or(DescriptionError::MissingField("version"))?;

        let main = document.main.ok_or(DescriptionError::MissingField("main"))?;
        if RESERVED_MAIN_PREFIXES.iter().any(|prefix| main.starts_with(prefix)) {
            return Err(DescriptionError::ReservedMain(main));
        }

        let api = document.api.ok_or(DescriptionError::MissingField("api"))?.into_vec();

        let order = match document.load.as_deref() {
            Some(load) => load.parse()?,
            None => PluginLoadOrder::default(),
        };

        let mut authors = Vec::new();
        if let Some(author) = document.author {
            authors.push(author);
        }
        authors.extend(document.authors.into_vec());

        Ok(Self {
            name,
            version,
            main,
            api,
            compatible_os: document.os.into_vec(),
            depend: document.depend.into_vec(),
            soft_depend: document.softdepend.into_vec(),
            load_before: document.loadbefore.into_vec(),
            description: document.description.unwrap_or_default(),
            authors,
            website: document.website.unwrap_or_default(),
            prefix: document.prefix.unwrap_or_default(),
            order,
            permissions: parse_permissions(&document.permissions)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `"<name> v<version>"`
    pub fn full_name(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }

    /// Identifier of the entry point constructor
    pub fn main(&self) -> &str {
        &self.main
    }

    /// API versions this plugin was written against
    pub fn compatible_apis(&self) -> &[String] {
        &self.api
    }

    /// Operating systems this plugin supports, empty means all
    pub fn compatible_operating_systems(&self) -> &[String] {
        &self.compatible_os
    }

    /// Hard dependencies
    pub fn depend(&self) -> &[String] {
        &self.depend
    }

    /// Soft dependencies
    pub fn soft_depend(&self) -> &[String] {
        &self.soft_depend
    }

    /// Plugins that should be enabled after this one
    pub fn load_before(&self) -> &[String] {
        &self.load_before
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    pub fn website(&self) -> &str {
        &self.website
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn order(&self) -> PluginLoadOrder {
        self.order
    }

    /// Declared permissions grouped by default tier
    pub fn permissions(&self) -> &IndexMap<PermissionDefault, Vec<Permission>> {
        &self.permissions
    }
}

/// A manifest value that may be written as a single string or a list
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub(crate) fn into_vec(self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// Raw manifest document before validation
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) struct ManifestDocument {
    pub name: Option<String>,
    pub version: Option<String>,
    pub main: Option<String>,
    pub api: Option<OneOrMany>,
    pub load: Option<String>,
    #[serde(default)]
    pub depend: OneOrMany,
    #[serde(default)]
    pub softdepend: OneOrMany,
    #[serde(default)]
    pub loadbefore: OneOrMany,
    #[serde(default)]
    pub os: OneOrMany,
    pub author: Option<String>,
    #[serde(default)]
    pub authors: OneOrMany,
    pub description: Option<String>,
    pub website: Option<String>,
    pub prefix: Option<String>,
    #[serde(default)]
    pub permissions: IndexMap<String, PermissionEntry>,
}
