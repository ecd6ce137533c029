//! Sample behavior modules shipped with the demo editor.

use patchkit::{
    BehaviorModule, CallFrame, Flow, HookSet, InterceptKinds, Marker, ModuleConfig,
    ModuleDescriptor, Recovery, SignatureShape, TargetFault, TargetQuery,
};
use serde_json::{Value, json};

use crate::host::{HIERARCHY_WINDOW, INSPECTOR_WINDOW};

/// Colors hierarchy rows by depth.
#[derive(Default)]
pub struct HierarchyTint;

const TINTS: [&str; 3] = ["none", "soft", "strong"];

impl BehaviorModule for HierarchyTint {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::binary("HierarchyTint", "Hierarchy", InterceptKinds::AFTER)
            .with_description("Tints hierarchy rows by nesting depth")
            .single_choice(TINTS, 1)
            .enabled_by_default()
    }

    fn target(&self) -> TargetQuery {
        TargetQuery::new()
            .exact(HIERARCHY_WINDOW, "DrawItem", Some(&["string", "int"]))
            .in_units(&["SceneHierarchy"])
            .type_like(&["HierarchyWindow"])
            .member(&["DrawItem"])
    }

    fn hooks(&self, config: &ModuleConfig) -> HookSet {
        let tint = config
            .selected_option()
            .and_then(|i| TINTS.get(i).copied())
            .unwrap_or("none");
        HookSet::new().after(move |frame: &mut CallFrame, row: &mut Value| {
            if tint == "none" {
                return;
            }
            let depth = frame.arg(1).and_then(Value::as_i64).unwrap_or_default();
            let text = row.as_str().unwrap_or_default();
            *row = json!(format!("{text}  <{tint}:{depth}>"));
        })
    }
}

/// Decorates component headers; found structurally because the header type
/// gets renamed between editor releases.
#[derive(Default)]
pub struct ComponentBadges;

const BADGES: [&str; 3] = ["physics", "rendering", "scripts"];

fn badge_for(component: &str) -> Option<usize> {
    match component {
        "Rigidbody" | "Collider" => Some(0),
        "MeshRenderer" | "Light" | "Camera" => Some(1),
        c if c.ends_with("Controller") => Some(2),
        _ => None,
    }
}

impl BehaviorModule for ComponentBadges {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::binary(
            "ComponentBadges",
            "Inspector",
            InterceptKinds::BEFORE | InterceptKinds::REWRITE,
        )
        .with_description("Adds category badges to component headers; hides Transform")
        .multi_choice(BADGES, &[true, true, false])
    }

    fn target(&self) -> TargetQuery {
        TargetQuery::new()
            .exact("Editor.Inspector.ComponentHeader", "Title", None)
            .member(&["Title"])
            .shaped(SignatureShape::arity(1).returning(Some("string")))
            .marked(Marker::new("DrawsHeaderFor", Some("Component")))
    }

    fn hooks(&self, config: &ModuleConfig) -> HookSet {
        let enabled: Vec<bool> = config.selection().map(<[bool]>::to_vec).unwrap_or_default();
        HookSet::new()
            .before(|frame: &mut CallFrame| {
                if frame.arg(0).and_then(Value::as_str) == Some("Transform") {
                    Flow::Bypass(json!("Transform (pinned)"))
                } else {
                    Flow::Continue
                }
            })
            .rewrite(move |frame, next| {
                let component = frame.arg(0).and_then(Value::as_str).unwrap_or_default().to_owned();
                let title = next(frame)?;
                let badge = badge_for(&component)
                    .filter(|i| enabled.get(*i).copied().unwrap_or(false))
                    .and_then(|i| BADGES.get(i));
                Ok(match badge {
                    Some(b) => json!(format!("[{b}] {}", title.as_str().unwrap_or_default())),
                    None => title,
                })
            })
    }
}

/// Keeps the inspector alive when the stock repaint throws.
#[derive(Default)]
pub struct SafeInspector;

impl BehaviorModule for SafeInspector {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::binary("SafeInspector", "Inspector", InterceptKinds::ON_EXCEPTION)
            .with_description("Recovers from inspector repaint failures")
            .with_action("Report last repaint", |config| {
                tracing::info!(enabled = config.enabled, "SafeInspector status requested");
            })
    }

    fn target(&self) -> TargetQuery {
        TargetQuery::new().exact(INSPECTOR_WINDOW, "Repaint", None)
    }

    fn hooks(&self, _: &ModuleConfig) -> HookSet {
        HookSet::new().on_exception(|frame: &mut CallFrame, fault: &TargetFault| {
            tracing::warn!(target_id = %frame.target, fault = %fault, "Repaint failed, painting placeholder");
            Recovery::Recover(json!(0))
        })
    }
}

patchkit::register_behavior_module!(HierarchyTint);
patchkit::register_behavior_module!(ComponentBadges);
patchkit::register_behavior_module!(SafeInspector);
