#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Runtime behavior overrides for a host application.
//!
//! The host publishes the operations that may be overridden as a
//! [`HostCatalog`] and routes calls to them through the
//! [`InterceptionEngine`]. Self-contained behavior modules describe which
//! operation they want to alter ([`TargetQuery`]) and how ([`HookSet`]); the
//! [`PatchRegistry`] resolves, installs, removes and reconfigures them, and
//! persists every user choice in a [`SettingsStore`].
//!
//! # Example
//!
//! ```ignore
//! use patchkit::{Discovery, PatchRuntime, PatchkitConfig};
//!
//! let config = PatchkitConfig::load(Some("patchkit.yaml".as_ref()))?;
//! let _installed = patchkit::telemetry::init_logging(&config.logging);
//!
//! let mut runtime = PatchRuntime::from_config(&config, host_catalog, Discovery::Linked)?;
//! runtime.boot();
//!
//! // In the host, around an overridable operation:
//! let label = runtime.engine().invoke(&draw_label, vec![name.into()], |f| draw(f))?;
//! ```

pub mod catalog;
pub mod config;
pub mod contracts;
pub mod discovery;
pub mod engine;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod settings;
pub mod telemetry;

pub use catalog::{CodeUnit, HostCatalog, Marker, Signature, TargetHandle, TargetId, TargetInfo, TypeEntry};
pub use config::{ConfigError, PatchkitConfig};
pub use contracts::{BehaviorModule, InterceptKind, InterceptKinds, ModuleDescriptor, UiKind};
pub use discovery::{Discovery, DiscoveryFailure, DiscoveryOutcome, ModuleFactory, ModuleRegistration};
pub use engine::{
    CallFrame, EngineStats, Flow, HookHandle, HookSet, InstallError, InterceptionEngine, Outcome,
    Recovery, TargetFault,
};
pub use registry::{BulkReport, ModuleStatus, ModuleView, PatchError, PatchRegistry};
pub use resolver::{ResolveError, SignatureShape, TargetQuery, TargetResolver};
pub use runtime::{BootReport, PatchRuntime};
pub use settings::{
    Choice, FileStore, MemoryStore, ModuleConfig, SettingValue, SettingsError, SettingsKeys,
    SettingsStore,
};

#[doc(hidden)]
pub mod __private {
    pub use inventory;
}
