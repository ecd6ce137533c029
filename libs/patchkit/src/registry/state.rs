use std::sync::Arc;

use crate::catalog::{TargetHandle, TargetId};
use crate::contracts::{BehaviorModule, ModuleDescriptor};
use crate::engine::HookHandle;
use crate::settings::ModuleConfig;

/// Lifecycle state of a registered module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Registered, but no target could be found this session.
    Unresolved,
    Inactive,
    Active,
}

/// Mutable record the registry keeps per module.
#[derive(Debug)]
pub struct ModuleRuntimeState {
    pub(super) target: Option<TargetHandle>,
    pub(super) hooks: Vec<HookHandle>,
    pub(super) active: bool,
    pub(super) config: ModuleConfig,
    pub(super) epoch: u64,
    pub(super) last_error: Option<String>,
}

impl ModuleRuntimeState {
    pub(super) fn new(target: Option<TargetHandle>, config: ModuleConfig, epoch: u64) -> Self {
        Self {
            target,
            hooks: Vec::new(),
            active: false,
            config,
            epoch,
            last_error: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> ModuleStatus {
        match (&self.target, self.active) {
            (None, _) => ModuleStatus::Unresolved,
            (Some(_), true) => ModuleStatus::Active,
            (Some(_), false) => ModuleStatus::Inactive,
        }
    }
}

pub(super) struct ModuleEntry {
    pub(super) module: Arc<dyn BehaviorModule>,
    pub(super) descriptor: ModuleDescriptor,
    pub(super) state: ModuleRuntimeState,
}

impl ModuleEntry {
    pub(super) fn view(&self) -> ModuleView {
        ModuleView {
            descriptor: self.descriptor.clone(),
            config: self.state.config.clone(),
            status: self.state.status(),
            target: self.state.target.as_ref().map(|t| t.id.clone()),
            hooks: self.state.hooks.len(),
            last_error: self.state.last_error.clone(),
        }
    }
}

/// Read-only snapshot for presentation layers.
#[derive(Clone, Debug)]
pub struct ModuleView {
    pub descriptor: ModuleDescriptor,
    pub config: ModuleConfig,
    pub status: ModuleStatus,
    pub target: Option<TargetId>,
    pub hooks: usize,
    pub last_error: Option<String>,
}

impl ModuleView {
    #[must_use]
    pub fn selected_option(&self) -> Option<usize> {
        self.config.selected_option()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ModuleStatus::Active
    }
}
