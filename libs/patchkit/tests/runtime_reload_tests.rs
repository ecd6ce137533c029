#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Host code reload and concurrent invocation while modules change.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use common::{LabelSuffix, draw_label, host_catalog, label_signature};
use patchkit::{
    BehaviorModule, CodeUnit, Discovery, HostCatalog, MemoryStore, ModuleFactory, PatchRuntime,
    SettingsKeys, SettingsStore, TypeEntry,
};

fn tint() -> anyhow::Result<Arc<dyn BehaviorModule>> {
    Ok(Arc::new(LabelSuffix::new("Tint")))
}

fn runtime(store: MemoryStore) -> PatchRuntime {
    PatchRuntime::new(
        Arc::new(host_catalog()),
        Arc::new(store),
        SettingsKeys::default(),
        Discovery::explicit([("Tint", tint as ModuleFactory)]),
    )
}

#[test]
fn reload_restores_enabled_modules_against_new_catalog() {
    let store = MemoryStore::new();
    let mut rt = runtime(store.clone());
    rt.boot();
    rt.registry_mut().apply("Tint").unwrap();
    assert_eq!(draw_label(rt.engine(), "x"), "x[Tint]");

    let report = rt.on_code_reload(Arc::new(host_catalog()));

    assert_eq!(report.applied.applied, vec!["Tint"]);
    assert_eq!(rt.engine().hooks_on(&common::draw_label_id()).len(), 1);
    assert_eq!(draw_label(rt.engine(), "x"), "x[Tint]");
    assert!(store.get_bool("Patchkit_Tint", false));
}

#[test]
fn reload_without_target_leaves_module_unresolved() {
    let mut rt = runtime(MemoryStore::new());
    rt.boot();
    rt.registry_mut().apply("Tint").unwrap();

    let stripped = HostCatalog::new().with_unit(
        CodeUnit::new("Editor.Core")
            .with_type(TypeEntry::new("Editor.Core.LabelRenderer").with_member("Measure", label_signature())),
    );
    let report = rt.on_code_reload(Arc::new(stripped));

    assert_eq!(report.unresolved, vec!["Tint"]);
    assert_eq!(report.applied.failed.len(), 1);
    assert!(!rt.registry().is_active("Tint"));
    assert_eq!(draw_label(rt.engine(), "x"), "x");
}

#[test]
fn invocations_stay_consistent_while_toggling() {
    let mut rt = runtime(MemoryStore::new());
    rt.boot();
    let engine = Arc::clone(rt.engine());
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let out = draw_label(&engine, "x");
                    assert!(out == "x" || out == "x[Tint]", "torn chain: {out}");
                }
            })
        })
        .collect();

    for _ in 0..200 {
        rt.registry_mut().apply("Tint").unwrap();
        rt.registry_mut().remove("Tint").unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    for r in readers {
        r.join().unwrap();
    }
    assert!(engine.hooks_on(&common::draw_label_id()).is_empty());
}
