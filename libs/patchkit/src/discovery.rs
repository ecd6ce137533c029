//! Module Discovery - finds every behavior module linked into the binary.
//!
//! Modules announce themselves with [`register_behavior_module!`], which
//! submits a [`ModuleRegistration`] to a link-time collection. Discovery
//! constructs each one in isolation: a constructor that errors or panics is
//! reported and skipped, and the rest are still loaded.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::contracts::{BehaviorModule, ModuleDescriptor};
use crate::settings::SettingsKeys;

/// Constructor signature for a discoverable module.
pub type ModuleFactory = fn() -> anyhow::Result<Arc<dyn BehaviorModule>>;

/// Link-time record for one behavior module type.
pub struct ModuleRegistration {
    pub type_name: &'static str,
    pub construct: ModuleFactory,
}

inventory::collect!(ModuleRegistration);

/// Registers a behavior module for discovery.
///
/// ```ignore
/// patchkit::register_behavior_module!(HierarchyTint);          // uses Default
/// patchkit::register_behavior_module!(Watermark, Watermark::load);
/// ```
#[macro_export]
macro_rules! register_behavior_module {
    ($ty:ty) => {
        $crate::__private::inventory::submit! {
            $crate::discovery::ModuleRegistration {
                type_name: ::core::stringify!($ty),
                construct: || {
                    let module: ::std::sync::Arc<dyn $crate::contracts::BehaviorModule> =
                        ::std::sync::Arc::new(<$ty as ::core::default::Default>::default());
                    ::core::result::Result::Ok(module)
                },
            }
        }
    };
    ($ty:ty, $ctor:path) => {
        $crate::__private::inventory::submit! {
            $crate::discovery::ModuleRegistration {
                type_name: ::core::stringify!($ty),
                construct: || {
                    let module: $ty = $ctor()?;
                    let module: ::std::sync::Arc<dyn $crate::contracts::BehaviorModule> =
                        ::std::sync::Arc::new(module);
                    ::core::result::Result::Ok(module)
                },
            }
        }
    };
}

/// A module type that could not be constructed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("behavior module '{type_name}' failed to load: {reason}")]
pub struct DiscoveryFailure {
    pub type_name: String,
    pub reason: String,
}

/// Result of one discovery pass.
#[derive(Default)]
pub struct DiscoveryOutcome {
    pub modules: Vec<Arc<dyn BehaviorModule>>,
    pub failures: Vec<DiscoveryFailure>,
    /// Every settings key the loaded modules may persist.
    pub settings_keys: Vec<String>,
}

impl std::fmt::Debug for DiscoveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.modules.iter().map(|m| m.descriptor().name).collect();
        f.debug_struct("DiscoveryOutcome")
            .field("modules", &names)
            .field("failures", &self.failures)
            .field("settings_keys", &self.settings_keys.len())
            .finish()
    }
}

/// Where discovery looks for modules.
#[derive(Default)]
pub enum Discovery {
    /// Everything submitted through [`register_behavior_module!`].
    #[default]
    Linked,
    /// An explicit list, for hosts that wire modules by hand (and tests).
    Explicit(Vec<(String, ModuleFactory)>),
}

impl Discovery {
    #[must_use]
    pub fn explicit<I, S>(factories: I) -> Self
    where
        I: IntoIterator<Item = (S, ModuleFactory)>,
        S: Into<String>,
    {
        Self::Explicit(factories.into_iter().map(|(n, f)| (n.into(), f)).collect())
    }

    /// Constructs every module, isolating failures.
    #[must_use]
    pub fn run(&self, keys: &SettingsKeys) -> DiscoveryOutcome {
        let candidates: Vec<(String, ModuleFactory)> = match self {
            Self::Linked => inventory::iter::<ModuleRegistration>
                .into_iter()
                .map(|r| (r.type_name.to_owned(), r.construct))
                .collect(),
            Self::Explicit(list) => list.clone(),
        };

        let mut outcome = DiscoveryOutcome::default();
        for (type_name, construct) in candidates {
            match construct_isolated(&type_name, construct) {
                Ok((module, descriptor)) => {
                    outcome
                        .settings_keys
                        .extend(keys.enumerate_all_keys(&descriptor));
                    outcome.modules.push(module);
                }
                Err(failure) => {
                    tracing::warn!(
                        module_type = %failure.type_name,
                        reason = %failure.reason,
                        "Skipping behavior module"
                    );
                    outcome.failures.push(failure);
                }
            }
        }

        tracing::info!(
            loaded = outcome.modules.len(),
            failed = outcome.failures.len(),
            "Behavior module discovery finished"
        );
        outcome
    }
}

fn construct_isolated(
    type_name: &str,
    construct: ModuleFactory,
) -> Result<(Arc<dyn BehaviorModule>, ModuleDescriptor), DiscoveryFailure> {
    let failure = |reason: String| DiscoveryFailure {
        type_name: type_name.to_owned(),
        reason,
    };
    // The descriptor is user code too; a panic there is a construction failure.
    let built = catch_unwind(AssertUnwindSafe(|| {
        construct().map(|m| {
            let descriptor = m.descriptor();
            (m, descriptor)
        })
    }));
    match built {
        Ok(Ok(pair)) => Ok(pair),
        Ok(Err(err)) => Err(failure(format!("{err:#}"))),
        Err(payload) => Err(failure(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "constructor panicked".to_owned())
}
