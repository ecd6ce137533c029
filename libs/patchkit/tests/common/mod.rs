#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! Shared host fixture: a tiny editor with a label renderer and an inspector.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use patchkit::{
    BehaviorModule, CallFrame, CodeUnit, HookSet, HostCatalog, InterceptKinds, InterceptionEngine,
    MemoryStore, ModuleConfig, ModuleDescriptor, PatchRegistry, SettingsKeys, Signature,
    TargetId, TargetQuery, TargetResolver, TypeEntry,
};
use serde_json::{Value, json};

pub fn label_signature() -> Signature {
    Signature::new(["string"], Some("string"))
}

pub fn host_catalog() -> HostCatalog {
    HostCatalog::new()
        .with_unit(
            CodeUnit::new("Editor.Core").with_type(
                TypeEntry::new("Editor.Core.LabelRenderer")
                    .with_member("DrawLabel", label_signature())
                    .with_member("Measure", Signature::new(["string"], Some("int"))),
            ),
        )
        .with_unit(
            CodeUnit::new("Editor.Inspector").with_type(
                TypeEntry::new("Editor.Inspector.TransformPanel")
                    .with_member("OnGUI", Signature::nullary(None)),
            ),
        )
}

pub fn draw_label_id() -> TargetId {
    TargetId::new("Editor.Core.LabelRenderer", "DrawLabel", &label_signature())
}

/// Calls `DrawLabel` through the engine; the original echoes its argument.
pub fn draw_label(engine: &InterceptionEngine, text: &str) -> String {
    engine
        .invoke(&draw_label_id(), vec![json!(text)], |f: &mut CallFrame| {
            Ok(f.args[0].clone())
        })
        .unwrap()
        .as_str()
        .unwrap()
        .to_owned()
}

/// Appends a suffix to every label and counts how often its after hook fires.
pub struct LabelSuffix {
    pub name: &'static str,
    pub descriptor: ModuleDescriptor,
    pub calls: Arc<AtomicUsize>,
}

impl LabelSuffix {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            descriptor: ModuleDescriptor::binary(name, "Hierarchy", InterceptKinds::AFTER),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl BehaviorModule for LabelSuffix {
    fn descriptor(&self) -> ModuleDescriptor {
        self.descriptor.clone()
    }

    fn target(&self) -> TargetQuery {
        TargetQuery::new().exact("Editor.Core.LabelRenderer", "DrawLabel", Some(&["string"][..]))
    }

    fn hooks(&self, config: &ModuleConfig) -> HookSet {
        let calls = Arc::clone(&self.calls);
        let mut suffix = format!("[{}", self.name);
        if let Some(bits) = config.selection() {
            for (i, on) in bits.iter().enumerate() {
                if *on {
                    suffix.push_str(&i.to_string());
                }
            }
        }
        if let Some(i) = config.selected_option() {
            suffix.push_str(&i.to_string());
        }
        suffix.push(']');

        HookSet::new().after(move |_: &mut CallFrame, out: &mut Value| {
            calls.fetch_add(1, Ordering::SeqCst);
            let text = out.as_str().unwrap_or_default();
            *out = json!(format!("{text}{suffix}"));
        })
    }
}

pub struct Fixture {
    pub registry: PatchRegistry,
    pub store: MemoryStore,
}

pub fn fixture() -> Fixture {
    fixture_with_store(MemoryStore::new())
}

pub fn fixture_with_store(store: MemoryStore) -> Fixture {
    let registry = PatchRegistry::new(
        Arc::new(InterceptionEngine::new()),
        Arc::new(TargetResolver::new(Arc::new(host_catalog()))),
        Arc::new(store.clone()),
        SettingsKeys::default(),
    );
    Fixture { registry, store }
}
