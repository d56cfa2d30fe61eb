//! Parsing of the `permissions` section of plugin manifests

use super::{Permission, PermissionError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Who receives a permission when nothing else says otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDefault {
    /// Granted to operators only
    Op,
    /// Granted to everyone except operators
    NotOp,
    /// Granted to everyone
    True,
    /// Granted to nobody
    False,
}

impl PermissionDefault {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Op => "op",
            Self::NotOp => "notop",
            Self::True => "true",
            Self::False => "false",
        }
    }
}

impl FromStr for PermissionDefault {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "op" | "isop" | "operator" | "isoperator" | "admin" | "isadmin" => Ok(Self::Op),
            "!op" | "notop" | "!operator" | "notoperator" | "!admin" | "notadmin" => {
                Ok(Self::NotOp)
            }
            "true" => Ok(Self::True),
            "false" => Ok(Self::False),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PermissionDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A permission as written in a manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionEntry {
    /// Default tier, `op` when omitted
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub children: IndexMap<String, ChildEntry>,
}

/// Child of a manifest permission: either a plain grant or a nested declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildEntry {
    Grant(bool),
    Nested(Box<PermissionEntry>),
}

/// Turn manifest permissions into registrable permissions grouped by default tier
///
/// Nested children are declared as permissions of their own, inheriting the
/// parent's default tier unless they set one, and granted by their parent.
pub fn parse_permissions(
    entries: &IndexMap<String, PermissionEntry>,
) -> Result<IndexMap<PermissionDefault, Vec<Permission>>, PermissionError> {
    let mut grouped: IndexMap<PermissionDefault, Vec<Permission>> = IndexMap::new();
    for (name, entry) in entries {
        parse_entry(name, entry, PermissionDefault::Op, &mut grouped)?;
    }
    Ok(grouped)
}

fn parse_entry(
    name: &str,
    entry: &PermissionEntry,
    inherited: PermissionDefault,
    grouped: &mut IndexMap<PermissionDefault, Vec<Permission>>,
) -> Result<(), PermissionError> {
    let default = match entry.default.as_deref() {
        Some(value) => value.parse().map_err(|_| PermissionError::InvalidDefault {
            permission: name.to_owned(),
            value: value.to_owned(),
        })?,
        None => inherited,
    };

    let mut permission = Permission::new(name, entry.description.clone().unwrap_or_default());
    for (child, value) in &entry.children {
        match value {
            ChildEntry::Grant(grant) => permission.add_child(child.as_str(), *grant),
            ChildEntry::Nested(nested) => {
                parse_entry(child, nested, default, grouped)?;
                permission.add_child(child.as_str(), true);
            }
        }
    }

    grouped.entry(default).or_default().push(permission);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_aliases() {
        assert_eq!("isadmin".parse::<PermissionDefault>(), Ok(PermissionDefault::Op));
        assert_eq!("!OP".parse::<PermissionDefault>(), Ok(PermissionDefault::NotOp));
        assert_eq!("notoperator".parse::<PermissionDefault>(), Ok(PermissionDefault::NotOp));
        assert_eq!("TRUE".parse::<PermissionDefault>(), Ok(PermissionDefault::True));
        assert_eq!("false".parse::<PermissionDefault>(), Ok(PermissionDefault::False));
        assert_eq!("maybe".parse::<PermissionDefault>(), Err(()));
    }

    #[test]
    fn test_parse_nested_children() {
        let manifest = r#"
            ["guard.bypass"]
            default = "op"
            description = "Bypass all protections"

            ["guard.bypass".children]
            "guard.bypass.build" = true
            "guard.bypass.pvp" = { default = "false", description = "PvP" }
            "guard.bypass.chat" = { description = "Chat" }

            ["guard.info"]
            default = "true"
        "#;
        let entries: IndexMap<String, PermissionEntry> = toml::from_str(manifest).unwrap();
        let grouped = parse_permissions(&entries).unwrap();

        let op: Vec<&str> = grouped[&PermissionDefault::Op].iter().map(Permission::name).collect();
        assert_eq!(op, vec!["guard.bypass.chat", "guard.bypass"]);

        let bypass = &grouped[&PermissionDefault::Op][1];
        assert_eq!(bypass.children().get("guard.bypass.build"), Some(&true));
        assert_eq!(bypass.children().get("guard.bypass.pvp"), Some(&true));

        assert_eq!(grouped[&PermissionDefault::False][0].name(), "guard.bypass.pvp");
        assert_eq!(grouped[&PermissionDefault::True][0].name(), "guard.info");
    }

    #[test]
    fn test_invalid_default() {
        let mut entries = IndexMap::new();
        entries.insert(
            "broken".to_owned(),
            PermissionEntry {
                default: Some("sometimes".to_owned()),
                ..Default::default()
            },
        );

        let err = parse_permissions(&entries).unwrap_err();
        assert!(matches!(
            err,
            PermissionError::InvalidDefault { ref value, .. } if value == "sometimes"
        ));
    }
}
