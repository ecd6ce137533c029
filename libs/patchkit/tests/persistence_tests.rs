#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Configuration survives a host restart.

mod common;

use std::sync::Arc;

use common::{LabelSuffix, draw_label, host_catalog};
use patchkit::{
    FileStore, InterceptionEngine, PatchRegistry, SettingsKeys, SettingsStore, TargetResolver,
};

fn registry_over(store: Arc<dyn SettingsStore>) -> PatchRegistry {
    let mut registry = PatchRegistry::new(
        Arc::new(InterceptionEngine::new()),
        Arc::new(TargetResolver::new(Arc::new(host_catalog()))),
        store,
        SettingsKeys::new("Editor"),
    );
    let mut mode = LabelSuffix::new("Mode");
    mode.descriptor = mode.descriptor.single_choice(["off", "soft", "strong"], 0);
    registry.register(Arc::new(mode));
    registry.register(Arc::new(LabelSuffix::new("Plain")));
    registry
}

#[test]
fn enabled_modules_and_selection_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs").join("settings.json");

    {
        let mut first = registry_over(Arc::new(FileStore::open(&path)));
        first.apply("Mode").unwrap();
        first.update_single_choice("Mode", 2).unwrap();
        assert_eq!(draw_label(first.engine(), "x"), "x[Mode2]");
    }

    let mut second = registry_over(Arc::new(FileStore::open(&path)));
    assert!(!second.is_active("Mode"));
    let report = second.apply_enabled();

    assert_eq!(report.applied, vec!["Mode"]);
    assert!(!second.is_active("Plain"));
    assert_eq!(second.describe("Mode").unwrap().selected_option(), Some(2));
    assert_eq!(draw_label(second.engine(), "x"), "x[Mode2]");
}

#[test]
fn kill_switch_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    {
        let mut first = registry_over(Arc::new(FileStore::open(&path)));
        first.apply("Plain").unwrap();
        first.set_global_enabled(false).unwrap();
    }

    let mut second = registry_over(Arc::new(FileStore::open(&path)));
    assert!(!second.global_enabled());
    assert!(second.apply_enabled().applied.is_empty());

    second.set_global_enabled(true).unwrap();
    assert!(second.is_active("Plain"));
}

#[test]
fn corrupt_settings_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let mut registry = registry_over(Arc::new(FileStore::open(&path)));
    assert!(registry.global_enabled());
    assert_eq!(registry.describe("Mode").unwrap().selected_option(), Some(0));

    // The next write replaces the unreadable document.
    registry.apply("Plain").unwrap();
    let reopened = FileStore::open(&path);
    assert!(reopened.get_bool("Editor_Plain", false));
}

#[test]
fn reset_all_clears_persisted_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let mut registry = registry_over(Arc::new(FileStore::open(&path)));
    registry.apply("Mode").unwrap();
    registry.update_single_choice("Mode", 1).unwrap();
    registry.reset_all().unwrap();

    let reopened = FileStore::open(&path);
    for key in registry.all_settings_keys() {
        assert!(!reopened.contains(&key), "{key} still persisted");
    }
    assert!(!registry.is_active("Mode"));
}

fn opt_in_registry(store: Arc<dyn SettingsStore>) -> PatchRegistry {
    let mut registry = PatchRegistry::new(
        Arc::new(InterceptionEngine::new()),
        Arc::new(TargetResolver::new(Arc::new(host_catalog()))),
        store,
        SettingsKeys::new("Editor"),
    )
    .with_global_default(false);
    let mut auto = LabelSuffix::new("Auto");
    auto.descriptor = auto.descriptor.enabled_by_default();
    registry.register(Arc::new(auto));
    registry
}

#[test]
fn reset_all_restores_configured_kill_switch_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let mut registry = opt_in_registry(Arc::new(FileStore::open(&path)));
    registry.set_global_enabled(true).unwrap();
    assert!(registry.is_active("Auto"));

    let report = registry.reset_all().unwrap();
    assert!(report.applied.is_empty());
    assert!(!registry.global_enabled());
    assert!(!registry.is_active("Auto"));
    assert_eq!(draw_label(registry.engine(), "x"), "x");

    let mut restarted = opt_in_registry(Arc::new(FileStore::open(&path)));
    assert_eq!(restarted.global_enabled(), registry.global_enabled());
    restarted.apply_enabled();
    assert_eq!(restarted.is_active("Auto"), registry.is_active("Auto"));
}
