//! Enable/disable behavior of the plugin manager

mod common;

use common::*;
use mirai_core::plugin::{PluginLoadOrder, PluginState};

fn position(entries: &[String], name: &str) -> usize {
    entries
        .iter()
        .position(|entry| entry == name)
        .unwrap_or_else(|| panic!("{} missing from {:?}", name, entries))
}

#[test]
fn test_missing_dependency_scenario() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_recorder(plugins.path(), "A", "");
    write_recorder(plugins.path(), "B", "depend = [\"A\"]");
    write_recorder(plugins.path(), "C", "depend = [\"D\"]");

    let mut manager = manager(data.path());
    let mut loaded = manager
        .load_plugins(plugins.path(), PluginLoadOrder::PostWorld)
        .expect("Failed to load plugins");
    loaded.sort();
    assert_eq!(loaded, vec!["A", "B", "C"]);

    manager.enable_plugins().expect("Failed to enable plugins");

    let enabled = entries("enable:");
    assert_eq!(enabled.len(), 2);
    assert!(position(&enabled, "A") < position(&enabled, "B"));
    assert!(!manager.is_plugin_enabled("C"));
    assert_eq!(manager.plugin("C").unwrap().state(), PluginState::Loaded);
    assert_eq!(manager.enabled_plugins().collect::<Vec<_>>(), vec!["A", "B"]);
}

#[test]
fn test_every_plugin_enabled_once_after_its_dependencies() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_recorder(plugins.path(), "Core", "");
    write_recorder(plugins.path(), "Economy", "depend = [\"Core\"]");
    write_recorder(
        plugins.path(),
        "Shop",
        "depend = [\"Economy\", \"Core\"]\nsoftdepend = [\"Chat\"]",
    );
    write_recorder(plugins.path(), "Chat", "softdepend = [\"Core\"]");
    write_recorder(plugins.path(), "Spawn", "loadbefore = [\"Core\"]");

    let mut manager = manager(data.path());
    manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    manager.enable_plugins().unwrap();
    // A second pass finds nothing left to enable
    manager.enable_plugins().unwrap();

    let enabled = entries("enable:");
    assert_eq!(enabled.len(), 5);
    assert!(position(&enabled, "Core") < position(&enabled, "Economy"));
    assert!(position(&enabled, "Economy") < position(&enabled, "Shop"));
    assert!(position(&enabled, "Chat") < position(&enabled, "Shop"));
    assert!(position(&enabled, "Core") < position(&enabled, "Chat"));
    assert!(position(&enabled, "Spawn") < position(&enabled, "Core"));
}

#[test]
fn test_circular_dependency() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_recorder(plugins.path(), "A", "depend = [\"B\"]");
    write_recorder(plugins.path(), "B", "depend = [\"A\"]");
    write_recorder(plugins.path(), "Independent", "");

    let mut manager = manager(data.path());
    manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    manager.enable_plugins().unwrap();

    assert!(!manager.is_plugin_enabled("A"));
    assert!(!manager.is_plugin_enabled("B"));
    assert!(manager.is_plugin_enabled("Independent"));
    assert_eq!(entries("enable:"), vec!["Independent"]);
}

#[test]
fn test_missing_hard_dependency_cascades() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_recorder(plugins.path(), "A", "depend = [\"Ghost\"]");
    write_recorder(plugins.path(), "C", "depend = [\"A\"]");
    write_recorder(plugins.path(), "Soft", "softdepend = [\"Ghost\"]");

    let mut manager = manager(data.path());
    manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    manager.enable_plugins().unwrap();

    assert!(!manager.is_plugin_enabled("A"));
    assert!(!manager.is_plugin_enabled("C"));
    assert!(manager.is_plugin_enabled("Soft"));
}

#[test]
fn test_disable_removes_listeners_and_stops_ticking() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_recorder(plugins.path(), "A", "");
    write_recorder(plugins.path(), "B", "");

    let mut manager = manager(data.path());
    manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    manager.enable_plugins().unwrap();

    let mut hits = ping(&manager);
    hits.sort();
    assert_eq!(hits, vec!["A", "B"]);

    manager.tick(1);
    manager.disable_plugin("A").expect("Failed to disable A");
    manager.tick(2);

    assert_eq!(ping(&manager), vec!["B"]);
    assert_eq!(entries("disable:"), vec!["A"]);
    assert_eq!(entries("tick:A:"), vec!["1"]);
    assert_eq!(entries("tick:B:"), vec!["1", "2"]);
    assert_eq!(manager.plugin("A").unwrap().state(), PluginState::Disabled);
    assert!(manager.plugin("A").unwrap().scheduler().is_empty());

    // Disabling twice is a no-op
    manager.disable_plugin("A").unwrap();
    assert_eq!(entries("disable:"), vec!["A"]);

    assert!(manager.disable_plugin("Nobody").is_err());
}

#[test]
fn test_reenable_registers_listeners_once() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_recorder(plugins.path(), "A", "");

    let mut manager = manager(data.path());
    manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    manager.enable_plugins().unwrap();
    manager.disable_plugin("A").unwrap();
    manager.enable_plugin("A").unwrap();

    assert!(manager.is_plugin_enabled("A"));
    assert_eq!(ping(&manager), vec!["A"]);
    assert_eq!(manager.event_bus().handler_list::<Ping>().len(), 1);
    assert_eq!(entries("enable:"), vec!["A", "A"]);
    assert_eq!(entries("load:"), vec!["A"]);

    manager.tick(5);
    assert_eq!(entries("tick:A:"), vec!["5"]);
}

#[test]
fn test_enable_and_disable_events() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_plugin(plugins.path(), "Observer", "Observer", "test::Observer", "");
    write_recorder(plugins.path(), "A", "softdepend = [\"Observer\"]");

    let mut manager = manager(data.path());
    manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    manager.enable_plugins().unwrap();
    manager.disable_plugin("A").unwrap();

    assert_eq!(entries("enabled-event:"), vec!["Observer", "A"]);
    assert_eq!(entries("disabled-event:"), vec!["A"]);
}

#[test]
fn test_plugin_disabling_itself_while_enabling() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_plugin(plugins.path(), "Observer", "Observer", "test::Observer", "");
    write_plugin(
        plugins.path(),
        "Quitter",
        "Quitter",
        "test::Quitter",
        "softdepend = [\"Observer\"]",
    );

    let mut manager = manager(data.path());
    manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    manager.enable_plugins().unwrap();

    assert!(!manager.is_plugin_enabled("Quitter"));
    assert_eq!(manager.plugin("Quitter").unwrap().state(), PluginState::Disabled);
    assert_eq!(entries("disable:"), vec!["Quitter"]);
    assert!(ping(&manager).is_empty());
    assert_eq!(entries("enabled-event:"), vec!["Observer"]);
    assert!(entries("disabled-event:").is_empty());
    assert_eq!(manager.enabled_plugins().collect::<Vec<_>>(), vec!["Observer"]);
}

#[test]
fn test_failing_enable_hook_leaves_plugin_disabled() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_plugin(plugins.path(), "Failing", "Failing", "test::Failing", "");
    write_recorder(plugins.path(), "Dependent", "depend = [\"Failing\"]");

    let mut manager = manager(data.path());
    manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    manager.enable_plugins().unwrap();

    assert!(!manager.is_plugin_enabled("Failing"));
    // Dependency resolution only looks at what was loaded
    assert!(manager.is_plugin_enabled("Dependent"));
}

#[test]
fn test_clear_plugins_allows_reload() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_recorder(
        plugins.path(),
        "Guard",
        "[permissions.\"guard.use\"]\ndefault = \"true\"",
    );

    let mut manager = manager(data.path());
    manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    manager.enable_plugins().unwrap();

    manager.clear_plugins();
    assert_eq!(entries("disable:"), vec!["Guard"]);
    assert_eq!(manager.plugins().count(), 0);
    assert_eq!(manager.loaders().count(), 0);
    assert!(ping(&manager).is_empty());

    manager.register_loader(std::sync::Arc::new(mirai_core::plugin::FolderPluginLoader::new(
        entry_points(),
    )));
    let loaded = manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    assert_eq!(loaded, vec!["Guard"]);
    assert!(manager.permissions().has_registered("guard.use"));
}

#[test]
fn test_owner_of_enabled_plugin_registers_handlers() {
    let plugins = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_recorder(plugins.path(), "A", "");

    let mut manager = manager(data.path());
    manager.load_plugins(plugins.path(), PluginLoadOrder::PostWorld).unwrap();
    manager.enable_plugins().unwrap();

    let owner = std::sync::Arc::clone(manager.plugin("A").unwrap().owner());
    let handler = manager
        .event_bus()
        .register(
            |event: &mut Ping| {
                event.hits.push("direct".to_owned());
                Ok(())
            },
            mirai_core::EventPriority::Monitor,
            &owner,
            false,
        )
        .expect("Enabled plugin should be able to register handlers");
    assert_eq!(handler.handler_name(), "A::Ping#2");
    assert_eq!(ping(&manager), vec!["A", "direct"]);

    manager.disable_plugin("A").unwrap();
    let refused = manager.event_bus().register(
        |_: &mut Ping| Ok(()),
        mirai_core::EventPriority::Normal,
        &owner,
        false,
    );
    assert!(matches!(
        refused,
        Err(mirai_core::event::EventError::OwnerNotEnabled { .. })
    ));
}
