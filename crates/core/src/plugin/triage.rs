//! Dependency resolution deciding the order plugins are enabled in
//!
//! Resolution runs in two steps. Hard dependencies are walked depth first with
//! three-color marking: a plugin with a missing, failed or circular hard
//! dependency fails, and so does everything depending on it. The surviving
//! plugins are then ordered topologically over their hard dependencies plus
//! every soft dependency and `loadbefore` hint that does not contradict the
//! edges already accepted.

use super::PluginDescription;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Triage {
    InProgress,
    Succeeded,
    Failed,
}

/// Dependency graph over the loaded plugins
pub(crate) struct DependencyGraph<'a> {
    plugins: IndexMap<&'a str, &'a PluginDescription>,
}

impl<'a> DependencyGraph<'a> {
    pub(crate) fn new(descriptions: impl IntoIterator<Item = &'a PluginDescription>) -> Self {
        Self {
            plugins: descriptions
                .into_iter()
                .map(|description| (description.name(), description))
                .collect(),
        }
    }

    /// Names of every plugin that can be enabled, dependencies first
    pub(crate) fn enable_order(&self) -> Vec<String> {
        let mut states = HashMap::new();
        let mut stack = Vec::new();
        let mut cyclic = HashSet::new();
        for name in self.plugins.keys().copied() {
            self.triage(name, &mut states, &mut stack, &mut cyclic);
        }

        let succeeded: Vec<&'a str> = self
            .plugins
            .keys()
            .copied()
            .filter(|name| states.get(name) == Some(&Triage::Succeeded))
            .collect();

        let after = self.ordering_edges(&succeeded);

        let mut order = Vec::with_capacity(succeeded.len());
        let mut visited = HashSet::new();
        for &name in &succeeded {
            Self::visit(name, &after, &mut visited, &mut order);
        }
        order
    }

    fn triage(
        &self,
        name: &'a str,
        states: &mut HashMap<&'a str, Triage>,
        stack: &mut Vec<&'a str>,
        cyclic: &mut HashSet<&'a str>,
    ) -> bool {
        match states.get(name) {
            Some(Triage::Succeeded) => return true,
            Some(Triage::Failed) => return false,
            Some(Triage::InProgress) => {
                if let Some(position) = stack.iter().position(|entry| *entry == name) {
                    cyclic.extend(stack[position..].iter().copied());
                }
                return false;
            }
            None => {}
        }

        let Some(description) = self.plugins.get(name) else {
            return false;
        };

        states.insert(name, Triage::InProgress);
        stack.push(name);

        let mut ok = true;
        for dependency in description.depend() {
            let Some((&dependency, _)) = self.plugins.get_key_value(dependency.as_str()) else {
                tracing::error!(
                    "Could not load plugin '{}': Unknown dependency: {}",
                    name,
                    dependency
                );
                ok = false;
                break;
            };

            if !self.triage(dependency, states, stack, cyclic) {
                if !cyclic.contains(name) {
                    tracing::error!(
                        "Could not load plugin '{}': Dependency {} failed to load",
                        name,
                        dependency
                    );
                }
                ok = false;
                break;
            }
        }

        stack.pop();
        if cyclic.contains(name) {
            tracing::error!("Could not load plugin '{}': Circular dependency detected", name);
            ok = false;
        }

        states.insert(name, if ok { Triage::Succeeded } else { Triage::Failed });
        ok
    }

    /// For every plugin, the plugins that must be enabled before it
    fn ordering_edges(&self, succeeded: &[&'a str]) -> HashMap<&'a str, Vec<&'a str>> {
        let enabled: HashSet<&str> = succeeded.iter().copied().collect();
        let mut after: HashMap<&'a str, Vec<&'a str>> = HashMap::new();

        for &name in succeeded {
            let hard = self.plugins[name]
                .depend()
                .iter()
                .filter_map(|dependency| self.plugins.get_key_value(dependency.as_str()))
                .map(|(&dependency, _)| dependency);
            after.entry(name).or_default().extend(hard);
        }

        for &name in succeeded {
            for soft in self.plugins[name].soft_depend() {
                let Some((&soft, _)) = self.plugins.get_key_value(soft.as_str()) else {
                    continue;
                };
                if enabled.contains(soft) {
                    Self::add_edge(&mut after, name, soft);
                }
            }
        }

        for &name in succeeded {
            for target in self.plugins[name].load_before() {
                let Some((&target, _)) = self.plugins.get_key_value(target.as_str()) else {
                    continue;
                };
                if enabled.contains(target) {
                    Self::add_edge(&mut after, target, name);
                }
            }
        }

        after
    }

    /// Order `later` after `earlier` unless `earlier` already depends on `later`
    fn add_edge(after: &mut HashMap<&'a str, Vec<&'a str>>, later: &'a str, earlier: &'a str) {
        if later == earlier {
            return;
        }
        if Self::reaches(after, earlier, later) {
            tracing::debug!(
                "Ignoring ordering hint: {} cannot be enabled after {} without breaking its dependencies",
                later,
                earlier
            );
            return;
        }

        let edges = after.entry(later).or_default();
        if !edges.contains(&earlier) {
            edges.push(earlier);
        }
    }

    fn reaches(after: &HashMap<&'a str, Vec<&'a str>>, from: &'a str, to: &'a str) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![from];
        while let Some(current) = pending.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(edges) = after.get(current) {
                pending.extend(edges.iter().copied());
            }
        }
        false
    }

    fn visit(
        name: &'a str,
        after: &HashMap<&'a str, Vec<&'a str>>,
        visited: &mut HashSet<&'a str>,
        order: &mut Vec<String>,
    ) {
        if !visited.insert(name) {
            return;
        }
        if let Some(edges) = after.get(name) {
            for &earlier in edges {
                Self::visit(earlier, after, visited, order);
            }
        }
        order.push(name.to_owned());
    }
}
