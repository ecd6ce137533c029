//! Patch Registry - catalogue of behavior modules and their live state.
//!
//! Per-module state machine:
//!
//! ```text
//! Unregistered ──register──► Registered(inactive) ──apply──► Active
//!                                     ▲                       │
//!                                     └────────remove─────────┘
//! ```
//!
//! The registry is not internally synchronized. All mutating calls must come
//! from a single writer (the host's UI/update thread); the engine it drives is
//! safe to invoke from anywhere.

mod deferred;
mod state;

pub use deferred::{DeferredFn, DeferredQueue};
pub use state::{ModuleRuntimeState, ModuleStatus, ModuleView};

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::contracts::{BehaviorModule, UiKind};
use crate::engine::{InstallError, InterceptionEngine};
use crate::resolver::TargetResolver;
use crate::settings::{Choice, ModuleConfig, SettingsError, SettingsKeys, SettingsStore};

use deferred::Pending;
use state::ModuleEntry;

/// Failure of a registry operation on a single module.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("module '{0}' is not registered")]
    UnknownModule(String),
    #[error("module '{0}' has no target in this host session")]
    Unresolved(String),
    #[error("module '{0}' panicked while building its hooks")]
    HookConstruction(String),
    #[error("module '{module}' could not be installed: {source}")]
    Install {
        module: String,
        #[source]
        source: InstallError,
    },
    #[error("module '{module}' settings could not be saved: {source}")]
    Settings {
        module: String,
        #[source]
        source: SettingsError,
    },
    #[error("module '{module}' has no option {index} ({count} available)")]
    OptionOutOfRange {
        module: String,
        index: usize,
        count: usize,
    },
    #[error("module '{module}' is {actual}, not {expected}")]
    WrongUiKind {
        module: String,
        expected: UiKind,
        actual: UiKind,
    },
}

/// Outcome of a bulk operation. Individual failures never abort the batch.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub applied: Vec<String>,
    pub failed: Vec<(String, PatchError)>,
}

impl BulkReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns every registered module and drives the engine on their behalf.
pub struct PatchRegistry {
    engine: Arc<InterceptionEngine>,
    resolver: Arc<TargetResolver>,
    store: Arc<dyn SettingsStore>,
    keys: SettingsKeys,
    modules: BTreeMap<String, ModuleEntry>,
    global_enabled: bool,
    global_default: bool,
    deferred: DeferredQueue,
    epoch: u64,
}

impl PatchRegistry {
    /// Creates an empty registry. The kill-switch state is read from `store`.
    #[must_use]
    pub fn new(
        engine: Arc<InterceptionEngine>,
        resolver: Arc<TargetResolver>,
        store: Arc<dyn SettingsStore>,
        keys: SettingsKeys,
    ) -> Self {
        let global_enabled = store.get_bool(&keys.global_enabled(), true);
        Self {
            engine,
            resolver,
            store,
            keys,
            modules: BTreeMap::new(),
            global_enabled,
            global_default: true,
            deferred: DeferredQueue::default(),
            epoch: 0,
        }
    }

    /// Re-reads the kill-switch with `default` for hosts that ship with
    /// patching off until the user opts in.
    #[must_use]
    pub fn with_global_default(mut self, default: bool) -> Self {
        self.global_default = default;
        self.global_enabled = self.store.get_bool(&self.keys.global_enabled(), default);
        self
    }

    /// Registers a module, resolving its target immediately.
    ///
    /// A module whose target cannot be found is still registered, as
    /// [`ModuleStatus::Unresolved`]. Re-registering a name replaces (and
    /// unhooks) the previous entry.
    pub fn register(&mut self, module: Arc<dyn BehaviorModule>) -> ModuleStatus {
        let descriptor = module.descriptor();
        let name = descriptor.name.clone();

        if self.modules.contains_key(&name) {
            tracing::info!(module = %name, "Replacing previously registered module");
            self.unregister(&name);
        }

        let target = self.locate(module.as_ref(), &name);
        let config = ModuleConfig::load(self.store.as_ref(), &self.keys, &descriptor);
        let epoch = self.next_epoch();
        let entry = ModuleEntry {
            module,
            descriptor,
            state: ModuleRuntimeState::new(target, config, epoch),
        };
        let status = entry.state.status();

        tracing::debug!(
            module = %name,
            category = %entry.descriptor.category,
            ?status,
            "Module registered"
        );
        self.modules.insert(name, entry);
        status
    }

    /// Unhooks and forgets a module. Returns `false` if it was not registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        if !self.modules.contains_key(name) {
            return false;
        }
        self.deactivate(name);
        self.deferred.cancel(name);
        self.modules.remove(name);
        true
    }

    /// Enables a module and installs its hooks.
    ///
    /// The enabled flag is persisted first. While the global kill-switch is
    /// off the module stays inactive and comes up when the switch is turned
    /// back on. Applying an already active module is a no-op.
    ///
    /// # Errors
    /// Returns [`PatchError`] if the module is unknown, has no target, or the
    /// engine rejects its hooks. The module is left inactive in every case.
    pub fn apply(&mut self, name: &str) -> Result<(), PatchError> {
        self.set_enabled_flag(name, true)?;
        if !self.global_enabled {
            tracing::debug!(module = name, "Kill-switch is off, deferring activation");
            return Ok(());
        }
        self.activate(name)
    }

    /// Disables a module and removes its hooks. Removing an inactive module,
    /// or one whose target has vanished, succeeds.
    ///
    /// # Errors
    /// Returns [`PatchError::UnknownModule`] for unregistered names.
    pub fn remove(&mut self, name: &str) -> Result<(), PatchError> {
        self.set_enabled_flag(name, false)?;
        self.deactivate(name);
        Ok(())
    }

    /// Persists a new single-choice selection and, if the module is active,
    /// reinstalls it so its hooks see the new value.
    ///
    /// # Errors
    /// Returns [`PatchError`] for unknown modules, non-single-choice modules,
    /// out-of-range indices, storage failures, or a failed reinstall. The
    /// selection is persisted even if the reinstall fails.
    pub fn update_single_choice(&mut self, name: &str, index: usize) -> Result<(), PatchError> {
        let entry = self.entry(name)?;
        expect_ui(name, UiKind::SingleChoice, entry.descriptor.ui)?;
        let count = entry.descriptor.options.len();
        if index >= count {
            return Err(PatchError::OptionOutOfRange {
                module: name.to_owned(),
                index,
                count,
            });
        }
        self.update_choice(name, Choice::Single(index))
    }

    /// Persists a new multi-choice selection (resized to the option count) and
    /// reinstalls the module if it is active.
    ///
    /// # Errors
    /// See [`PatchRegistry::update_single_choice`].
    pub fn update_multi_choice(&mut self, name: &str, selection: &[bool]) -> Result<(), PatchError> {
        let entry = self.entry(name)?;
        expect_ui(name, UiKind::MultiChoice, entry.descriptor.ui)?;
        let bits = (0..entry.descriptor.options.len())
            .map(|i| selection.get(i).copied().unwrap_or(false))
            .collect();
        self.update_choice(name, Choice::Multi(bits))
    }

    /// Flips one option of a multi-choice module.
    ///
    /// # Errors
    /// See [`PatchRegistry::update_multi_choice`].
    pub fn toggle_option(&mut self, name: &str, index: usize) -> Result<(), PatchError> {
        let entry = self.entry(name)?;
        expect_ui(name, UiKind::MultiChoice, entry.descriptor.ui)?;
        let mut bits = entry.state.config.selection().map(<[bool]>::to_vec).unwrap_or_default();
        let count = bits.len();
        let Some(bit) = bits.get_mut(index) else {
            return Err(PatchError::OptionOutOfRange {
                module: name.to_owned(),
                index,
                count,
            });
        };
        *bit = !*bit;
        self.update_choice(name, Choice::Multi(bits))
    }

    /// Global kill-switch. Turning it off removes every active module without
    /// touching per-module enabled flags; turning it on re-applies exactly the
    /// modules whose flags are set.
    ///
    /// # Errors
    /// Returns [`SettingsError`] if the switch state could not be persisted;
    /// modules are still switched in that case.
    pub fn set_global_enabled(&mut self, enabled: bool) -> Result<BulkReport, SettingsError> {
        let persisted = self.store.set_bool(&self.keys.global_enabled(), enabled);
        self.global_enabled = enabled;

        let report = if enabled {
            tracing::info!("Kill-switch on, restoring enabled modules");
            self.apply_enabled()
        } else {
            tracing::info!("Kill-switch off, removing all active modules");
            let active: Vec<String> = self
                .modules
                .iter()
                .filter(|(_, e)| e.state.active)
                .map(|(n, _)| n.clone())
                .collect();
            for name in &active {
                self.deactivate(name);
            }
            BulkReport::default()
        };

        persisted.map(|()| report)
    }

    #[must_use]
    pub fn global_enabled(&self) -> bool {
        self.global_enabled
    }

    /// Installs every module whose persisted enabled flag is set.
    pub fn apply_enabled(&mut self) -> BulkReport {
        let mut report = BulkReport::default();
        if !self.global_enabled {
            return report;
        }

        let names: Vec<String> = self.modules.keys().cloned().collect();
        for name in names {
            let Some(entry) = self.modules.get(&name) else {
                continue;
            };
            let enabled = self
                .store
                .get_bool(&self.keys.enabled(&name), entry.descriptor.default_enabled);
            if !enabled || entry.state.active {
                continue;
            }
            match self.activate(&name) {
                Ok(()) => report.applied.push(name),
                Err(err) => {
                    tracing::warn!(module = %name, error = %err, "Module not applied");
                    report.failed.push((name, err));
                }
            }
        }
        report
    }

    /// Removes then re-installs an active module. No-op for inactive modules.
    ///
    /// # Errors
    /// Returns [`PatchError`] if the module is unknown or reinstall fails.
    pub fn reapply(&mut self, name: &str) -> Result<(), PatchError> {
        if !self.entry(name)?.state.active {
            return Ok(());
        }
        self.deactivate(name);
        self.activate(name)
    }

    /// Invokes the module's ad-hoc action, if it declares one.
    ///
    /// # Errors
    /// Returns [`PatchError::UnknownModule`] for unregistered names.
    pub fn run_action(&self, name: &str) -> Result<bool, PatchError> {
        let entry = self.entry(name)?;
        let Some(action) = &entry.descriptor.action else {
            return Ok(false);
        };
        tracing::debug!(module = name, action = %action.label, "Running module action");
        (action.run)(&entry.state.config);
        Ok(true)
    }

    /// Every settings key any registered module (or the kill-switch) uses.
    #[must_use]
    pub fn all_settings_keys(&self) -> Vec<String> {
        let mut keys = vec![self.keys.global_enabled()];
        keys.extend(
            self.modules
                .values()
                .flat_map(|e| self.keys.enumerate_all_keys(&e.descriptor)),
        );
        keys
    }

    /// Removes every module, clears all persisted keys, restores the
    /// kill-switch default, and re-applies whatever the descriptor defaults
    /// enable.
    ///
    /// # Errors
    /// Returns the first [`SettingsError`] hit while clearing keys.
    pub fn reset_all(&mut self) -> Result<BulkReport, SettingsError> {
        let names: Vec<String> = self.modules.keys().cloned().collect();
        for name in &names {
            self.deactivate(name);
        }
        for key in self.all_settings_keys() {
            self.store.remove(&key)?;
        }
        self.global_enabled = self.global_default;
        for entry in self.modules.values_mut() {
            entry.state.config = ModuleConfig::defaults(&entry.descriptor);
        }
        tracing::info!(modules = names.len(), "All module settings reset");
        Ok(self.apply_enabled())
    }

    /// Schedules `run` for the next [`tick`](Self::tick). It is dropped if the
    /// module is deactivated or unregistered first.
    ///
    /// # Errors
    /// Returns [`PatchError::UnknownModule`] for unregistered names.
    pub fn defer<F>(&mut self, name: &str, run: F) -> Result<(), PatchError>
    where
        F: FnOnce(&mut PatchRegistry) + Send + 'static,
    {
        let epoch = self.entry(name)?.state.epoch;
        self.deferred.push(Pending {
            module: name.to_owned(),
            epoch,
            run: Box::new(run),
        });
        Ok(())
    }

    /// Schedules a reapply of `name` for the next tick.
    ///
    /// # Errors
    /// Returns [`PatchError::UnknownModule`] for unregistered names.
    pub fn schedule_reapply(&mut self, name: &str) -> Result<(), PatchError> {
        let owned = name.to_owned();
        self.defer(name, move |registry| {
            if let Err(err) = registry.reapply(&owned) {
                tracing::warn!(module = %owned, error = %err, "Deferred reapply failed");
            }
        })
    }

    /// Drains the deferred queue once. Returns how many callbacks ran.
    pub fn tick(&mut self) -> usize {
        let mut ran = 0;
        for pending in self.deferred.take() {
            let live = self
                .modules
                .get(&pending.module)
                .is_some_and(|e| e.state.active && e.state.epoch == pending.epoch);
            if live {
                (pending.run)(self);
                ran += 1;
            } else {
                tracing::debug!(module = %pending.module, "Dropped stale deferred callback");
            }
        }
        ran
    }

    #[must_use]
    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Registered module names grouped by category, both sorted.
    #[must_use]
    pub fn list_by_category(&self) -> BTreeMap<String, Vec<String>> {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, entry) in &self.modules {
            out.entry(entry.descriptor.category.clone())
                .or_default()
                .push(name.clone());
        }
        out
    }

    #[must_use]
    pub fn is_active(&self, name: &str) -> bool {
        self.modules.get(name).is_some_and(|e| e.state.active)
    }

    #[must_use]
    pub fn status(&self, name: &str) -> Option<ModuleStatus> {
        self.modules.get(name).map(|e| e.state.status())
    }

    #[must_use]
    pub fn describe(&self, name: &str) -> Option<ModuleView> {
        self.modules.get(name).map(ModuleEntry::view)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<InterceptionEngine> {
        &self.engine
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<TargetResolver> {
        &self.resolver
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    #[must_use]
    pub fn keys(&self) -> &SettingsKeys {
        &self.keys
    }

    /// Drops every hook and every module. Used before re-discovery on code
    /// reload; persisted settings are untouched.
    pub fn clear(&mut self) {
        self.engine.uninstall_all();
        self.modules.clear();
        self.deferred.clear();
    }

    // ---- internals ---------------------------------------------------------

    fn entry(&self, name: &str) -> Result<&ModuleEntry, PatchError> {
        self.modules
            .get(name)
            .ok_or_else(|| PatchError::UnknownModule(name.to_owned()))
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn locate(&self, module: &dyn BehaviorModule, name: &str) -> Option<crate::catalog::TargetHandle> {
        catch_unwind(AssertUnwindSafe(|| module.locate(&self.resolver))).unwrap_or_else(|_| {
            tracing::warn!(module = name, "Target lookup panicked; treating as not found");
            None
        })
    }

    fn set_enabled_flag(&mut self, name: &str, enabled: bool) -> Result<(), PatchError> {
        let key = self.keys.enabled(name);
        let entry = self
            .modules
            .get_mut(name)
            .ok_or_else(|| PatchError::UnknownModule(name.to_owned()))?;
        entry.state.config.enabled = enabled;
        if let Err(err) = self.store.set_bool(&key, enabled) {
            tracing::warn!(module = name, error = %err, "Enabled flag not persisted");
        }
        Ok(())
    }

    fn update_choice(&mut self, name: &str, choice: Choice) -> Result<(), PatchError> {
        let entry = self
            .modules
            .get_mut(name)
            .ok_or_else(|| PatchError::UnknownModule(name.to_owned()))?;

        let mut config = entry.state.config.clone();
        config.choice = choice;
        config
            .persist_choice(self.store.as_ref(), &self.keys, &entry.descriptor)
            .map_err(|source| PatchError::Settings {
                module: name.to_owned(),
                source,
            })?;
        entry.state.config = config;

        if entry.state.active {
            tracing::debug!(module = name, "Configuration changed, reapplying");
            self.deactivate(name);
            self.activate(name)?;
        }
        Ok(())
    }

    fn activate(&mut self, name: &str) -> Result<(), PatchError> {
        let epoch = self.next_epoch();
        let needs_target = match self.modules.get(name) {
            None => return Err(PatchError::UnknownModule(name.to_owned())),
            Some(entry) if entry.state.active => return Ok(()),
            Some(entry) => entry.state.target.is_none(),
        };
        if needs_target {
            // The target may live in code loaded after registration.
            let module = Arc::clone(&self.entry(name)?.module);
            let found = self.locate(module.as_ref(), name);
            if let Some(entry) = self.modules.get_mut(name) {
                entry.state.target = found;
            }
        }

        let entry = self
            .modules
            .get_mut(name)
            .ok_or_else(|| PatchError::UnknownModule(name.to_owned()))?;
        let Some(target) = entry.state.target.clone() else {
            return Err(PatchError::Unresolved(name.to_owned()));
        };

        // The store is authoritative; pick up anything changed behind our back.
        entry.state.config = ModuleConfig::load(self.store.as_ref(), &self.keys, &entry.descriptor);
        let built = catch_unwind(AssertUnwindSafe(|| entry.module.hooks(&entry.state.config)));
        let Ok(hooks) = built else {
            tracing::warn!(module = name, "Hook construction panicked; module left inactive");
            let err = PatchError::HookConstruction(name.to_owned());
            entry.state.last_error = Some(err.to_string());
            return Err(err);
        };

        match self.engine.install(&target, name, entry.descriptor.kinds, &hooks) {
            Ok(handles) => {
                entry.state.hooks = handles;
                entry.state.active = true;
                entry.state.epoch = epoch;
                entry.state.last_error = None;
                tracing::info!(module = name, target = %target.id, "Module applied");
                Ok(())
            }
            Err(source) => {
                entry.state.last_error = Some(source.to_string());
                Err(PatchError::Install {
                    module: name.to_owned(),
                    source,
                })
            }
        }
    }

    /// Best-effort; never fails.
    fn deactivate(&mut self, name: &str) {
        let epoch = self.next_epoch();
        let Some(entry) = self.modules.get_mut(name) else {
            return;
        };
        if !entry.state.active {
            return;
        }
        if let Some(target) = &entry.state.target {
            self.engine.uninstall(&target.id, name);
        }
        entry.state.hooks.clear();
        entry.state.active = false;
        entry.state.epoch = epoch;
        tracing::info!(module = name, "Module removed");
    }
}

fn expect_ui(name: &str, expected: UiKind, actual: UiKind) -> Result<(), PatchError> {
    if expected == actual {
        Ok(())
    } else {
        Err(PatchError::WrongUiKind {
            module: name.to_owned(),
            expected,
            actual,
        })
    }
}
