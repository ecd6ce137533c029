use crate::catalog::{HostCatalog, TargetHandle};

use super::{ResolveError, TargetQuery};

/// One lookup strategy in the resolver's fallback chain.
///
/// A tier only walks the already-loaded catalog; it must not block.
pub trait ResolveTier: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means "not found by this strategy"; errors are treated the
    /// same way by the resolver.
    ///
    /// # Errors
    /// Implementations may return [`ResolveError`] for malformed catalog data.
    fn attempt(
        &self,
        query: &TargetQuery,
        catalog: &HostCatalog,
    ) -> Result<Option<TargetHandle>, ResolveError>;
}

/// Tier 1: fully-qualified type name plus exact member name and signature.
pub struct ExactTier;

impl ResolveTier for ExactTier {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn attempt(
        &self,
        query: &TargetQuery,
        catalog: &HostCatalog,
    ) -> Result<Option<TargetHandle>, ResolveError> {
        let Some(path) = &query.exact else {
            return Ok(None);
        };
        let Some(ty) = catalog.find_type(&path.type_name) else {
            return Ok(None);
        };
        Ok(ty
            .members()
            .iter()
            .find(|m| {
                m.name == path.member
                    && path
                        .params
                        .as_ref()
                        .is_none_or(|p| *p == m.signature.params)
            })
            .cloned())
    }
}

/// Tier 2: scan units whose name contains a filter, then types whose name
/// contains a fragment. Only an unambiguous match counts.
pub struct UnitScanTier;

impl ResolveTier for UnitScanTier {
    fn name(&self) -> &'static str {
        "unit_scan"
    }

    fn attempt(
        &self,
        query: &TargetQuery,
        catalog: &HostCatalog,
    ) -> Result<Option<TargetHandle>, ResolveError> {
        if query.unit_filters.is_empty() && query.type_fragments.is_empty() {
            return Ok(None);
        }

        let mut found: Vec<&TargetHandle> = catalog
            .units()
            .iter()
            .filter(|u| contains_any(&u.name, &query.unit_filters))
            .flat_map(|u| u.types.iter())
            .filter(|t| contains_any(&t.full_name, &query.type_fragments))
            .flat_map(|t| t.members().iter())
            .filter(|m| query.member_matches(m))
            .collect();

        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop().cloned()),
            n => {
                tracing::debug!(
                    candidates = n,
                    query = %query.cache_key(),
                    "Unit scan ambiguous, deferring to structural match"
                );
                Ok(None)
            }
        }
    }
}

/// Tier 3: any type exposing a member with a matching name and shape,
/// narrowed by a declarative marker when the query carries one.
pub struct StructuralTier;

impl ResolveTier for StructuralTier {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn attempt(
        &self,
        query: &TargetQuery,
        catalog: &HostCatalog,
    ) -> Result<Option<TargetHandle>, ResolveError> {
        if query.member_names.is_empty() && query.shape.is_none() {
            return Ok(None);
        }
        Ok(catalog
            .types()
            .filter(|t| query.marker.as_ref().is_none_or(|m| t.has_marker(m)))
            .flat_map(|t| t.members().iter())
            .find(|m| query.member_matches(m))
            .cloned())
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.is_empty() || needles.iter().any(|n| haystack.contains(n.as_str()))
}

/// The default fallback chain: exact, unit scan, structural.
#[must_use]
pub fn default_tiers() -> Vec<Box<dyn ResolveTier>> {
    vec![
        Box::new(ExactTier),
        Box::new(UnitScanTier),
        Box::new(StructuralTier),
    ]
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::catalog::{CodeUnit, Marker, Signature, TypeEntry};
    use crate::resolver::SignatureShape;

    fn catalog() -> HostCatalog {
        HostCatalog::new()
            .with_unit(
                CodeUnit::new("Host.GraphModule").with_type(
                    TypeEntry::new("Host.Graphs.GraphGUI")
                        .with_member("DrawNode", Signature::new(["Node", "bool"], None)),
                ),
            )
            .with_unit(
                CodeUnit::new("Host.EditorModule")
                    .with_type(
                        TypeEntry::new("Host.Inspectors.MeshInspector")
                            .with_marker(Marker::new("EditsType", Some("Mesh")))
                            .with_member("OnInspectorGUI", Signature::nullary(None)),
                    )
                    .with_type(
                        TypeEntry::new("Host.Inspectors.TransformInspector")
                            .with_marker(Marker::new("EditsType", Some("Transform")))
                            .with_member("OnInspectorGUI", Signature::nullary(None)),
                    ),
            )
    }

    #[test]
    fn exact_tier_requires_matching_params() {
        let cat = catalog();
        let q = TargetQuery::new().exact("Host.Graphs.GraphGUI", "DrawNode", Some(&["Node", "bool"]));
        assert!(ExactTier.attempt(&q, &cat).unwrap().is_some());

        let q = TargetQuery::new().exact("Host.Graphs.GraphGUI", "DrawNode", Some(&["Node"]));
        assert!(ExactTier.attempt(&q, &cat).unwrap().is_none());
    }

    #[test]
    fn unit_scan_finds_drifted_type_name() {
        let cat = catalog();
        let q = TargetQuery::new()
            .in_units(&["Graph"])
            .type_like(&["GraphGUI"])
            .member(&["DrawNode"]);
        let t = UnitScanTier.attempt(&q, &cat).unwrap().unwrap();
        assert_eq!(t.owner, "Host.Graphs.GraphGUI");
    }

    #[test]
    fn unit_scan_rejects_ambiguous_match() {
        let cat = catalog();
        let q = TargetQuery::new()
            .in_units(&["Editor"])
            .type_like(&["Inspector"])
            .member(&["OnInspectorGUI"]);
        assert!(UnitScanTier.attempt(&q, &cat).unwrap().is_none());
    }

    #[test]
    fn structural_tier_uses_marker_to_disambiguate() {
        let cat = catalog();
        let q = TargetQuery::new()
            .member(&["OnInspectorGUI"])
            .shaped(SignatureShape::arity(0))
            .marked(Marker::new("EditsType", Some("Transform")));
        let t = StructuralTier.attempt(&q, &cat).unwrap().unwrap();
        assert_eq!(t.owner, "Host.Inspectors.TransformInspector");
    }

    #[test]
    fn member_names_do_not_match_by_prefix() {
        let cat = HostCatalog::new()
            .with_unit(
                CodeUnit::new("A").with_type(
                    TypeEntry::new("A.Panel").with_member("OnGUIInternal", Signature::nullary(None)),
                ),
            )
            .with_unit(
                CodeUnit::new("B")
                    .with_type(TypeEntry::new("B.Panel").with_member("OnGUI", Signature::nullary(None))),
            );
        let q = TargetQuery::new().member(&["OnGUI"]);
        let t = StructuralTier.attempt(&q, &cat).unwrap().unwrap();
        assert_eq!(t.owner, "B.Panel");
        assert_eq!(t.name, "OnGUI");

        let q = TargetQuery::new().type_like(&["Panel"]).member(&["OnGUI"]);
        let t = UnitScanTier.attempt(&q, &cat).unwrap().unwrap();
        assert_eq!(t.owner, "B.Panel");
    }
}
