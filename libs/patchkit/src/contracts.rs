//! The behavior-module contract.
//!
//! This is the only surface the engine needs from a behavior module: static
//! identity ([`ModuleDescriptor`]), a way to find its target, and the hooks it
//! wants installed for a given configuration snapshot.

use std::fmt;
use std::sync::Arc;

use crate::catalog::TargetHandle;
use crate::engine::HookSet;
use crate::resolver::{TargetQuery, TargetResolver};
use crate::settings::ModuleConfig;

bitflags::bitflags! {
    /// Set of interception kinds a module requests (or a host member refuses).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InterceptKinds: u8 {
        const BEFORE = 1;
        const AFTER = 1 << 1;
        const REWRITE = 1 << 2;
        const ON_EXCEPTION = 1 << 3;
    }
}

/// One interception kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InterceptKind {
    Before,
    After,
    Rewrite,
    OnException,
}

impl InterceptKind {
    /// Installation order used by the engine.
    pub const ALL: [InterceptKind; 4] = [
        InterceptKind::Before,
        InterceptKind::After,
        InterceptKind::Rewrite,
        InterceptKind::OnException,
    ];

    #[must_use]
    pub const fn flag(self) -> InterceptKinds {
        match self {
            InterceptKind::Before => InterceptKinds::BEFORE,
            InterceptKind::After => InterceptKinds::AFTER,
            InterceptKind::Rewrite => InterceptKinds::REWRITE,
            InterceptKind::OnException => InterceptKinds::ON_EXCEPTION,
        }
    }
}

impl InterceptKinds {
    /// Individual kinds contained in this set, in installation order.
    #[must_use]
    pub fn kinds(self) -> impl Iterator<Item = InterceptKind> {
        InterceptKind::ALL
            .into_iter()
            .filter(move |k| self.contains(k.flag()))
    }
}

impl fmt::Display for InterceptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterceptKind::Before => "before",
            InterceptKind::After => "after",
            InterceptKind::Rewrite => "rewrite",
            InterceptKind::OnException => "on_exception",
        };
        f.write_str(s)
    }
}

/// How a module's configuration is presented and persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiKind {
    Binary,
    SingleChoice,
    MultiChoice,
}

impl fmt::Display for UiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UiKind::Binary => "binary",
            UiKind::SingleChoice => "single-choice",
            UiKind::MultiChoice => "multi-choice",
        })
    }
}

/// Ad-hoc "button" affordance exposed next to a module.
#[derive(Clone)]
pub struct ModuleAction {
    pub label: String,
    pub run: Arc<dyn Fn(&ModuleConfig) + Send + Sync>,
}

impl fmt::Debug for ModuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleAction")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Static identity of a behavior module. Immutable after discovery.
#[derive(Clone, Debug)]
pub struct ModuleDescriptor {
    pub name: String,
    pub description: String,
    pub category: String,
    pub kinds: InterceptKinds,
    pub default_enabled: bool,
    pub ui: UiKind,
    pub options: Vec<String>,
    pub default_choice: usize,
    pub default_selection: Vec<bool>,
    pub action: Option<ModuleAction>,
}

impl ModuleDescriptor {
    /// Binary (on/off) module with no options.
    #[must_use]
    pub fn binary(
        name: impl Into<String>,
        category: impl Into<String>,
        kinds: InterceptKinds,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: category.into(),
            kinds,
            default_enabled: false,
            ui: UiKind::Binary,
            options: Vec::new(),
            default_choice: 0,
            default_selection: Vec::new(),
            action: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn enabled_by_default(mut self) -> Self {
        self.default_enabled = true;
        self
    }

    /// Single-choice module; `default` is clamped into the option range.
    #[must_use]
    pub fn single_choice<I, S>(mut self, options: I, default: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ui = UiKind::SingleChoice;
        self.options = options.into_iter().map(Into::into).collect();
        self.default_choice = default.min(self.options.len().saturating_sub(1));
        self.default_selection.clear();
        self
    }

    /// Multi-choice module; `defaults` is resized to the option count.
    #[must_use]
    pub fn multi_choice<I, S>(mut self, options: I, defaults: &[bool]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ui = UiKind::MultiChoice;
        self.options = options.into_iter().map(Into::into).collect();
        self.default_selection = (0..self.options.len())
            .map(|i| defaults.get(i).copied().unwrap_or(false))
            .collect();
        self.default_choice = 0;
        self
    }

    #[must_use]
    pub fn with_action<F>(mut self, label: impl Into<String>, run: F) -> Self
    where
        F: Fn(&ModuleConfig) + Send + Sync + 'static,
    {
        self.action = Some(ModuleAction {
            label: label.into(),
            run: Arc::new(run),
        });
        self
    }
}

/// A behavior module as seen by the registry.
///
/// Implementations are constructed without arguments at discovery time.
pub trait BehaviorModule: Send + Sync + 'static {
    fn descriptor(&self) -> ModuleDescriptor;

    /// Search description for this module's target.
    fn target(&self) -> TargetQuery;

    /// Locate the target. Override when the module needs a custom lookup;
    /// returning `None` marks the feature unavailable for this session.
    fn locate(&self, resolver: &TargetResolver) -> Option<TargetHandle> {
        resolver.resolve(&self.target())
    }

    /// Hooks to install for the given configuration snapshot. Called on every
    /// (re)install, so configuration may be captured by value.
    fn hooks(&self, config: &ModuleConfig) -> HookSet;
}
