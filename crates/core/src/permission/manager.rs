//! Registry of every known permission

use super::{DefaultPermissions, Permission, PermissionDefault, PermissionError};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Owns all registered permissions, keyed by name
///
/// A name can only be registered once. The registry always contains the two
/// root group nodes from [`DefaultPermissions`].
#[derive(Debug, Clone)]
pub struct PermissionManager {
    permissions: IndexMap<String, Permission>,
}

impl PermissionManager {
    /// Create a registry holding only the root nodes
    pub fn new() -> Self {
        let mut manager = Self {
            permissions: IndexMap::new(),
        };
        manager.register_roots();
        manager
    }

    fn register_roots(&mut self) {
        self.permissions.insert(
            DefaultPermissions::ROOT_USER.to_owned(),
            Permission::new(DefaultPermissions::ROOT_USER, "Grants all user permissions"),
        );
        self.permissions.insert(
            DefaultPermissions::ROOT_OPERATOR.to_owned(),
            Permission::new(DefaultPermissions::ROOT_OPERATOR, "Grants all operator permissions")
                .with_child(DefaultPermissions::ROOT_USER, true),
        );
    }

    /// Register a new permission
    pub fn add_permission(&mut self, permission: Permission) -> Result<(), PermissionError> {
        if self.permissions.contains_key(permission.name()) {
            return Err(PermissionError::Duplicate(permission.name().to_owned()));
        }

        tracing::debug!("Registered permission: {}", permission.name());
        self.permissions.insert(permission.name().to_owned(), permission);
        Ok(())
    }

    /// Register a permission and wire it to the root nodes according to `default`
    pub fn add_with_default(
        &mut self,
        permission: Permission,
        default: PermissionDefault,
    ) -> Result<(), PermissionError> {
        let name = permission.name().to_owned();
        self.add_permission(permission)?;

        match default {
            PermissionDefault::True => {
                self.add_child(DefaultPermissions::ROOT_USER, &name, true)?;
            }
            PermissionDefault::Op => {
                self.add_child(DefaultPermissions::ROOT_OPERATOR, &name, true)?;
            }
            PermissionDefault::NotOp => {
                // The operator root is applied after the user root, so its denial wins
                self.add_child(DefaultPermissions::ROOT_USER, &name, true)?;
                self.add_child(DefaultPermissions::ROOT_OPERATOR, &name, false)?;
            }
            PermissionDefault::False => {}
        }
        Ok(())
    }

    /// Add a child grant to an already registered permission
    pub fn add_child(
        &mut self,
        parent: &str,
        child: &str,
        value: bool,
    ) -> Result<(), PermissionError> {
        let parent = self
            .permissions
            .get_mut(parent)
            .ok_or_else(|| PermissionError::NotFound(parent.to_owned()))?;
        parent.add_child(child, value);
        Ok(())
    }

    pub fn permission(&self, name: &str) -> Option<&Permission> {
        self.permissions.get(name)
    }

    pub fn has_registered(&self, name: &str) -> bool {
        self.permissions.contains_key(name)
    }

    /// Remove a permission and every child grant pointing at it
    pub fn remove_permission(&mut self, name: &str) -> Option<Permission> {
        let removed = self.permissions.shift_remove(name)?;
        for permission in self.permissions.values_mut() {
            permission.remove_child(name);
        }
        Some(removed)
    }

    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.values()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Drop every permission except the root nodes, which are reset
    pub fn clear_permissions(&mut self) {
        self.permissions.clear();
        self.register_roots();
    }

    /// Resolve the effective grants of a holder of `roots`
    ///
    /// Roots are applied in order so a later root overrides an earlier one. A
    /// child granted with `false` inverts the polarity of its own children.
    pub fn effective_permissions(&self, roots: &[&str]) -> HashMap<String, bool> {
        let mut effective = HashMap::new();
        for root in roots {
            effective.insert((*root).to_owned(), true);
            self.apply_children(root, false, &mut effective, 0);
        }
        effective
    }

    /// Whether a holder of `roots` is granted `permission`
    pub fn is_granted(&self, roots: &[&str], permission: &str) -> bool {
        self.effective_permissions(roots)
            .get(permission)
            .copied()
            .unwrap_or(false)
    }

    fn apply_children(
        &self,
        name: &str,
        invert: bool,
        effective: &mut HashMap<String, bool>,
        depth: usize,
    ) {
        // Guards against child cycles between plugin permissions
        if depth > self.permissions.len() {
            return;
        }

        let Some(permission) = self.permissions.get(name) else {
            return;
        };

        for (child, value) in permission.children() {
            effective.insert(child.clone(), *value != invert);
            self.apply_children(child, !*value != invert, effective, depth + 1);
        }
    }
}

impl Default for PermissionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &[&str] = &[DefaultPermissions::ROOT_USER];
    const OPERATOR: &[&str] = &[DefaultPermissions::ROOT_USER, DefaultPermissions::ROOT_OPERATOR];

    #[test]
    fn test_duplicate_rejected() {
        let mut manager = PermissionManager::new();
        manager.add_permission(Permission::new("test.a", "")).unwrap();

        let err = manager.add_permission(Permission::new("test.a", "")).unwrap_err();
        assert!(matches!(err, PermissionError::Duplicate(ref name) if name == "test.a"));
    }

    #[test]
    fn test_default_wiring() {
        let mut manager = PermissionManager::new();
        manager.add_with_default(Permission::new("t.op", ""), PermissionDefault::Op).unwrap();
        manager.add_with_default(Permission::new("t.true", ""), PermissionDefault::True).unwrap();
        manager.add_with_default(Permission::new("t.notop", ""), PermissionDefault::NotOp).unwrap();
        manager.add_with_default(Permission::new("t.false", ""), PermissionDefault::False).unwrap();

        assert!(!manager.is_granted(USER, "t.op"));
        assert!(manager.is_granted(OPERATOR, "t.op"));

        assert!(manager.is_granted(USER, "t.true"));
        assert!(manager.is_granted(OPERATOR, "t.true"));

        assert!(manager.is_granted(USER, "t.notop"));
        assert!(!manager.is_granted(OPERATOR, "t.notop"));

        assert!(!manager.is_granted(OPERATOR, "t.false"));
    }

    #[test]
    fn test_negated_child_inverts_grandchildren() {
        let mut manager = PermissionManager::new();
        manager
            .add_permission(Permission::new("t.parent", "").with_child("t.child", false))
            .unwrap();
        manager
            .add_permission(Permission::new("t.child", "").with_child("t.grandchild", true))
            .unwrap();

        let effective = manager.effective_permissions(&["t.parent"]);
        assert_eq!(effective.get("t.child"), Some(&false));
        assert_eq!(effective.get("t.grandchild"), Some(&false));
    }

    #[test]
    fn test_clear_keeps_roots() {
        let mut manager = PermissionManager::new();
        manager.add_with_default(Permission::new("t.op", ""), PermissionDefault::Op).unwrap();
        assert_eq!(manager.len(), 3);

        manager.clear_permissions();
        assert_eq!(manager.len(), 2);
        assert!(manager.has_registered(DefaultPermissions::ROOT_OPERATOR));
        let operator = manager.permission(DefaultPermissions::ROOT_OPERATOR).unwrap();
        assert!(operator.children().get("t.op").is_none());

        manager.add_with_default(Permission::new("t.op", ""), PermissionDefault::Op).unwrap();
        assert!(manager.remove_permission("t.op").is_some());
        assert!(!manager.is_granted(OPERATOR, "t.op"));
    }
}
