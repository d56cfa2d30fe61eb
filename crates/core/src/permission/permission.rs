//! A single permission node

use indexmap::IndexMap;

/// Named permission with child grants
///
/// Each child maps to a polarity: `true` grants the child together with this
/// permission, `false` denies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    name: String,
    description: String,
    children: IndexMap<String, bool>,
}

impl Permission {
    /// Create a permission without children
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            children: IndexMap::new(),
        }
    }

    /// Add a child grant
    pub fn with_child(mut self, name: impl Into<String>, value: bool) -> Self {
        self.add_child(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn children(&self) -> &IndexMap<String, bool> {
        &self.children
    }

    pub fn add_child(&mut self, name: impl Into<String>, value: bool) {
        self.children.insert(name.into(), value);
    }

    pub fn remove_child(&mut self, name: &str) -> Option<bool> {
        self.children.shift_remove(name)
    }
}
