//! A simulated editor that routes a few of its drawing routines through the
//! interception engine.

use patchkit::{
    CallFrame, CodeUnit, HostCatalog, InterceptKinds, InterceptionEngine, Marker, Outcome,
    Signature, TargetFault, TargetId, TypeEntry,
};
use serde_json::{Value, json};

pub const HIERARCHY_WINDOW: &str = "Editor.SceneHierarchy.HierarchyWindow";
pub const COMPONENT_HEADER: &str = "Editor.Inspector.Internal.ComponentHeaderV3";
pub const INSPECTOR_WINDOW: &str = "Editor.Inspector.InspectorWindow";

fn draw_item_signature() -> Signature {
    Signature::new(["string", "int"], Some("string"))
}

fn title_signature() -> Signature {
    Signature::new(["string"], Some("string"))
}

fn repaint_signature() -> Signature {
    Signature::new(["int"], Some("int"))
}

/// What this editor build exposes. The component header was renamed in this
/// release, so only structural lookups still find it.
pub fn catalog() -> HostCatalog {
    HostCatalog::new()
        .with_unit(
            CodeUnit::new("Editor.SceneHierarchyModule").with_type(
                TypeEntry::new(HIERARCHY_WINDOW).with_member("DrawItem", draw_item_signature()),
            ),
        )
        .with_unit(
            CodeUnit::new("Editor.InspectorModule")
                .with_type(
                    TypeEntry::new(COMPONENT_HEADER)
                        .with_marker(Marker::new("DrawsHeaderFor", Some("Component")))
                        .with_member("Title", title_signature()),
                )
                .with_type(
                    TypeEntry::new(INSPECTOR_WINDOW)
                        .with_guarded_member("Repaint", repaint_signature(), InterceptKinds::REWRITE),
                ),
        )
}

/// Name, hierarchy depth, components.
type SceneObject = (&'static str, i64, &'static [&'static str]);

const SAMPLE_SCENE: &[SceneObject] = &[
    ("Main Camera", 0, &["Transform", "Camera", "AudioListener"]),
    ("Player", 0, &["Transform", "Rigidbody", "PlayerController"]),
    ("Weapon", 1, &["Transform", "MeshRenderer"]),
    ("Directional Light", 0, &["Transform", "Light"]),
];

pub struct Scene {
    pub objects: Vec<SceneObject>,
}

impl Scene {
    pub fn sample() -> Self {
        Self {
            objects: SAMPLE_SCENE.to_vec(),
        }
    }
}

/// Renders the scene the way the editor would, one engine call per routine.
pub fn render(engine: &InterceptionEngine, scene: &Scene) -> Result<Vec<String>, TargetFault> {
    let draw_item = TargetId::new(HIERARCHY_WINDOW, "DrawItem", &draw_item_signature());
    let title = TargetId::new(COMPONENT_HEADER, "Title", &title_signature());
    let repaint = TargetId::new(INSPECTOR_WINDOW, "Repaint", &repaint_signature());

    let mut lines = vec!["Hierarchy".to_owned()];
    for (name, depth, _) in &scene.objects {
        let row = engine.invoke(&draw_item, vec![json!(name), json!(depth)], draw_item_original)?;
        lines.push(text(&row));
    }

    if let Some((name, _, components)) = scene.objects.get(1) {
        lines.push(format!("Inspector: {name}"));
        for component in *components {
            let row = engine.invoke(&title, vec![json!(component)], title_original)?;
            lines.push(format!("  {}", text(&row)));
        }
        let painted = engine.invoke(&repaint, vec![json!(components.len())], repaint_original)?;
        lines.push(format!("  ({} rows painted)", painted.as_i64().unwrap_or_default()));
    }
    Ok(lines)
}

fn text(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_owned)
}

fn draw_item_original(frame: &mut CallFrame) -> Outcome {
    let name = frame.arg(0).and_then(Value::as_str).unwrap_or_default();
    let depth = frame.arg(1).and_then(Value::as_i64).unwrap_or_default();
    let indent = "  ".repeat(usize::try_from(depth).unwrap_or_default() + 1);
    Ok(json!(format!("{indent}{name}")))
}

fn title_original(frame: &mut CallFrame) -> Outcome {
    Ok(frame.arg(0).cloned().unwrap_or(Value::Null))
}

/// The stock repaint chokes on tall inspectors.
fn repaint_original(frame: &mut CallFrame) -> Outcome {
    match frame.arg(0).and_then(Value::as_i64) {
        Some(rows) if rows <= 2 => Ok(json!(rows)),
        Some(rows) => Err(TargetFault::new(format!("layout overflow at {rows} rows"))),
        None => Err(TargetFault::new("missing row count")),
    }
}
