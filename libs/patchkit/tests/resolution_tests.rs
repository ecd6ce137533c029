#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Tier ordering and drift tolerance of the target resolver.

use std::sync::Arc;

use parking_lot::Mutex;
use patchkit::catalog::Marker;
use patchkit::resolver::{ExactTier, ResolveTier, StructuralTier, UnitScanTier};
use patchkit::{
    CodeUnit, HostCatalog, ResolveError, Signature, SignatureShape, TargetHandle, TargetQuery,
    TargetResolver, TypeEntry,
};

/// Wraps a real tier and records every attempt.
struct Recording {
    inner: Box<dyn ResolveTier>,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl ResolveTier for Recording {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn attempt(
        &self,
        query: &TargetQuery,
        catalog: &HostCatalog,
    ) -> Result<Option<TargetHandle>, ResolveError> {
        self.log.lock().push(self.inner.name());
        self.inner.attempt(query, catalog)
    }
}

fn recording_resolver(catalog: HostCatalog) -> (TargetResolver, Arc<Mutex<Vec<&'static str>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let tiers: Vec<Box<dyn ResolveTier>> = vec![
        Box::new(Recording {
            inner: Box::new(ExactTier),
            log: Arc::clone(&log),
        }),
        Box::new(Recording {
            inner: Box::new(UnitScanTier),
            log: Arc::clone(&log),
        }),
        Box::new(Recording {
            inner: Box::new(StructuralTier),
            log: Arc::clone(&log),
        }),
    ];
    (TargetResolver::with_tiers(Arc::new(catalog), tiers), log)
}

/// A later host release: the inspector type was renamed and moved.
fn drifted_catalog() -> HostCatalog {
    HostCatalog::new()
        .with_unit(
            CodeUnit::new("Editor.CoreModule").with_type(
                TypeEntry::new("Editor.Internal.TransformInspectorV2")
                    .with_marker(Marker::new("EditsType", Some("Transform")))
                    .with_member("OnInspectorGUI", Signature::nullary(None)),
            ),
        )
        .with_unit(
            CodeUnit::new("Editor.Physics").with_type(
                TypeEntry::new("Editor.Physics.RigidbodyInspector")
                    .with_marker(Marker::new("EditsType", Some("Rigidbody")))
                    .with_member("OnInspectorGUI", Signature::nullary(None)),
            ),
        )
}

fn transform_query() -> TargetQuery {
    TargetQuery::new()
        .exact("Editor.Inspector.TransformInspector", "OnInspectorGUI", None)
        .in_units(&["CoreModule"])
        .type_like(&["TransformInspector"])
        .member(&["OnInspectorGUI"])
        .shaped(SignatureShape::arity(0))
        .marked(Marker::new("EditsType", Some("Transform")))
}

#[test]
fn exact_miss_falls_back_to_unit_scan() {
    let (resolver, log) = recording_resolver(drifted_catalog());
    let target = resolver.resolve(&transform_query()).unwrap();

    assert_eq!(target.owner, "Editor.Internal.TransformInspectorV2");
    assert_eq!(*log.lock(), vec!["exact", "unit_scan"]);
}

#[test]
fn structural_tier_uses_marker_when_names_are_gone() {
    let (resolver, log) = recording_resolver(drifted_catalog());
    let query = TargetQuery::new()
        .member(&["OnInspectorGUI"])
        .marked(Marker::new("EditsType", Some("Rigidbody")));

    let target = resolver.resolve(&query).unwrap();
    assert_eq!(target.owner, "Editor.Physics.RigidbodyInspector");
    assert_eq!(*log.lock(), vec!["exact", "unit_scan", "structural"]);
}

#[test]
fn hit_is_memoized() {
    let (resolver, log) = recording_resolver(drifted_catalog());
    let first = resolver.resolve(&transform_query()).unwrap();
    log.lock().clear();

    let second = resolver.resolve(&transform_query()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(log.lock().is_empty());
}

#[test]
fn total_miss_tries_every_tier_and_returns_none() {
    let (resolver, log) = recording_resolver(HostCatalog::new());
    assert!(resolver.resolve(&transform_query()).is_none());
    assert_eq!(*log.lock(), vec!["exact", "unit_scan", "structural"]);

    // Misses are not cached: a retry walks the tiers again.
    log.lock().clear();
    assert!(resolver.resolve(&transform_query()).is_none());
    assert_eq!(log.lock().len(), 3);
}
