//! Target Resolver - tiered, fault-tolerant lookup of host targets.
//!
//! Tiers are tried in order and the first hit wins. A tier that errors or
//! panics is treated as a miss. Not finding a target is an expected outcome:
//! callers get `None`, the miss is logged once per query, and the feature is
//! simply unavailable for this session.

mod query;
mod tiers;

pub use query::{ExactPath, SignatureShape, TargetQuery};
pub use tiers::{default_tiers, ExactTier, ResolveTier, StructuralTier, UnitScanTier};

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::catalog::{HostCatalog, TargetHandle};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("tier '{tier}' failed: {reason}")]
    TierFailed { tier: &'static str, reason: String },
    #[error("tier '{tier}' panicked")]
    TierPanicked { tier: &'static str },
}

/// Resolves [`TargetQuery`]s against the current [`HostCatalog`].
pub struct TargetResolver {
    catalog: ArcSwap<HostCatalog>,
    tiers: Vec<Box<dyn ResolveTier>>,
    cache: DashMap<String, TargetHandle>,
    reported_misses: Mutex<HashSet<String>>,
}

impl TargetResolver {
    /// Resolver with the default exact / unit-scan / structural chain.
    #[must_use]
    pub fn new(catalog: Arc<HostCatalog>) -> Self {
        Self::with_tiers(catalog, default_tiers())
    }

    #[must_use]
    pub fn with_tiers(catalog: Arc<HostCatalog>, tiers: Vec<Box<dyn ResolveTier>>) -> Self {
        Self {
            catalog: ArcSwap::new(catalog),
            tiers,
            cache: DashMap::new(),
            reported_misses: Mutex::new(HashSet::new()),
        }
    }

    /// Returns the first target any tier finds, or `None`.
    pub fn resolve(&self, query: &TargetQuery) -> Option<TargetHandle> {
        let key = query.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            return Some(Arc::clone(&hit));
        }

        let catalog = self.catalog.load_full();
        for tier in &self.tiers {
            match Self::attempt(tier.as_ref(), query, &catalog) {
                Ok(Some(target)) => {
                    tracing::debug!(tier = tier.name(), target = %target.id, "Target resolved");
                    self.cache.insert(key, Arc::clone(&target));
                    return Some(target);
                }
                Ok(None) => {
                    tracing::trace!(tier = tier.name(), query = %key, "Tier found nothing");
                }
                Err(err) => {
                    tracing::debug!(tier = tier.name(), error = %err, "Tier failed");
                }
            }
        }

        if self.reported_misses.lock().insert(key.clone()) {
            tracing::warn!(query = %key, "Target not found; feature unavailable this session");
        }
        None
    }

    fn attempt(
        tier: &dyn ResolveTier,
        query: &TargetQuery,
        catalog: &HostCatalog,
    ) -> Result<Option<TargetHandle>, ResolveError> {
        catch_unwind(AssertUnwindSafe(|| tier.attempt(query, catalog)))
            .unwrap_or(Err(ResolveError::TierPanicked { tier: tier.name() }))
    }

    /// Forgets memoized results and reported misses.
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.reported_misses.lock().clear();
    }

    /// Swaps in the catalog of freshly reloaded code and clears the cache.
    pub fn replace_catalog(&self, catalog: Arc<HostCatalog>) {
        self.catalog.store(catalog);
        self.clear_cache();
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<HostCatalog> {
        self.catalog.load_full()
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
