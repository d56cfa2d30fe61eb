//! Loader for single-file script plugins
//!
//! A script plugin is a `.mirai` file starting with a comment header:
//!
//! ```text
//! # @name HelloScript
//! # @version 1.0.0
//! # @main hello::Script
//! # @api 1.0.0
//! # @depend Core, Economy
//! ```
//!
//! List valued keys are separated by commas. The header ends at the first
//! line that is neither blank nor a comment.

use super::description::{ManifestDocument, OneOrMany};
use super::loader::{EntryPointRegistry, PluginConstructor, PluginLoader};
use super::{DescriptionError, PluginDescription};
use indexmap::IndexMap;
use std::path::Path;

/// File extension of script plugins
pub const SCRIPT_EXTENSION: &str = "mirai";

/// Loads plugins from single script files
#[derive(Debug, Default)]
pub struct ScriptPluginLoader {
    entry_points: EntryPointRegistry,
}

impl ScriptPluginLoader {
    pub fn new(entry_points: EntryPointRegistry) -> Self {
        Self { entry_points }
    }

    /// Collect the `@key value` pairs of a script header
    fn parse_header(content: &str) -> IndexMap<String, String> {
        let mut header = IndexMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(comment) = line.strip_prefix('#') else {
                break;
            };

            let Some(tag) = comment.trim().strip_prefix('@') else {
                continue;
            };
            let (key, value) = match tag.split_once(char::is_whitespace) {
                Some((key, value)) => (key, value.trim()),
                None => (tag, ""),
            };
            header.insert(key.to_ascii_lowercase(), value.to_owned());
        }
        header
    }

    fn list(header: &mut IndexMap<String, String>, key: &str) -> OneOrMany {
        match header.shift_remove(key) {
            Some(value) => OneOrMany::Many(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_owned)
                    .collect(),
            ),
            None => OneOrMany::None,
        }
    }
}

impl PluginLoader for ScriptPluginLoader {
    fn kind(&self) -> &str {
        "script"
    }

    fn can_load_plugin(&self, path: &Path) -> bool {
        path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some(SCRIPT_EXTENSION)
    }

    fn plugin_description(
        &self,
        path: &Path,
    ) -> Result<Option<PluginDescription>, DescriptionError> {
        let content = std::fs::read_to_string(path)?;
        let mut header = Self::parse_header(&content);
        if !header.contains_key("name") {
            return Ok(None);
        }

        let api = match Self::list(&mut header, "api") {
            OneOrMany::None => None,
            api => Some(api),
        };

        let document = ManifestDocument {
            api,
            depend: Self::list(&mut header, "depend"),
            softdepend: Self::list(&mut header, "softdepend"),
            loadbefore: Self::list(&mut header, "loadbefore"),
            os: Self::list(&mut header, "os"),
            authors: Self::list(&mut header, "authors"),
            name: header.shift_remove("name"),
            version: header.shift_remove("version"),
            main: header.shift_remove("main"),
            load: header.shift_remove("load"),
            author: header.shift_remove("author"),
            description: header.shift_remove("description"),
            website: header.shift_remove("website"),
            prefix: header.shift_remove("prefix"),
            permissions: IndexMap::new(),
        };

        PluginDescription::from_document(document).map(Some)
    }

    fn load_plugin(&self, path: &str) -> anyhow::Result<()> {
        let path = Path::new(path);
        if !path.is_file() {
            anyhow::bail!("Script {} does not exist", path.display());
        }

        tracing::debug!("Loading script plugin {}", path.display());
        Ok(())
    }

    fn entry_point(&self, main: &str) -> Option<PluginConstructor> {
        self.entry_points.get(main)
    }
}
