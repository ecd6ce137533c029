//! Host-facing entry point that wires discovery, resolver, engine, store and
//! registry together, and rebuilds them when host code is reloaded.

use std::sync::Arc;

use crate::catalog::HostCatalog;
use crate::config::{ConfigError, PatchkitConfig};
use crate::discovery::{Discovery, DiscoveryFailure};
use crate::engine::InterceptionEngine;
use crate::registry::{BulkReport, ModuleStatus, PatchRegistry};
use crate::resolver::TargetResolver;
use crate::settings::{FileStore, SettingsKeys, SettingsStore};

/// What one boot pass did.
#[derive(Debug, Default)]
pub struct BootReport {
    pub registered: usize,
    pub unresolved: Vec<String>,
    pub discovery_failures: Vec<DiscoveryFailure>,
    /// Every key the discovered modules may persist; what a "reset
    /// everything" affordance would clear.
    pub settings_keys: Vec<String>,
    pub applied: BulkReport,
}

pub struct PatchRuntime {
    registry: PatchRegistry,
    discovery: Discovery,
}

impl PatchRuntime {
    /// Builds a runtime over an arbitrary store.
    #[must_use]
    pub fn new(
        catalog: Arc<HostCatalog>,
        store: Arc<dyn SettingsStore>,
        keys: SettingsKeys,
        discovery: Discovery,
    ) -> Self {
        let registry = PatchRegistry::new(
            Arc::new(InterceptionEngine::new()),
            Arc::new(TargetResolver::new(catalog)),
            store,
            keys,
        );
        Self {
            registry,
            discovery,
        }
    }

    /// Builds a runtime from configuration, persisting to the configured file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the settings path cannot be resolved.
    pub fn from_config(
        config: &PatchkitConfig,
        catalog: Arc<HostCatalog>,
        discovery: Discovery,
    ) -> Result<Self, ConfigError> {
        let path = config.resolved_settings_path()?;
        tracing::info!(path = %path.display(), "Opening settings store");
        let store: Arc<dyn SettingsStore> = Arc::new(FileStore::open(path));
        let mut runtime = Self::new(
            catalog,
            store,
            SettingsKeys::new(config.key_prefix.clone()),
            discovery,
        );
        runtime.registry = runtime
            .registry
            .with_global_default(config.global_enabled_default);
        Ok(runtime)
    }

    /// Discovers modules, registers them, and applies the enabled ones.
    pub fn boot(&mut self) -> BootReport {
        let outcome = self.discovery.run(self.registry.keys());
        let mut report = BootReport {
            discovery_failures: outcome.failures,
            settings_keys: outcome.settings_keys,
            ..BootReport::default()
        };

        for module in outcome.modules {
            let name = module.descriptor().name;
            if self.registry.register(module) == ModuleStatus::Unresolved {
                report.unresolved.push(name);
            }
            report.registered += 1;
        }

        report.applied = self.registry.apply_enabled();
        tracing::info!(
            registered = report.registered,
            unresolved = report.unresolved.len(),
            applied = report.applied.applied.len(),
            failed = report.applied.failed.len(),
            "Patch runtime booted"
        );
        report
    }

    /// Host code was reloaded: every previous target is gone. Drops all hooks
    /// and module state, swaps in the new catalog, and boots again. Persisted
    /// settings survive, so the same modules come back up.
    pub fn on_code_reload(&mut self, catalog: Arc<HostCatalog>) -> BootReport {
        tracing::info!("Host code reloaded, rebuilding patches");
        self.registry.clear();
        self.registry.resolver().replace_catalog(catalog);
        self.boot()
    }

    /// Runs deferred work; call once per host update cycle.
    pub fn tick(&mut self) -> usize {
        self.registry.tick()
    }

    #[must_use]
    pub fn registry(&self) -> &PatchRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PatchRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<InterceptionEngine> {
        self.registry.engine()
    }
}
