//! Interception Engine - installs and removes hooks around host targets.
//!
//! Every target that has ever been hooked owns a [`HookSite`] holding an
//! immutable chain of hook entries behind an `ArcSwap`. Writers (install /
//! uninstall) are serialized and publish a fresh chain; an invocation loads the
//! chain once at entry and runs with it to completion, so a call that is
//! already in flight may observe either the old or the new hook set.
//!
//! Dispatch order for a single invocation:
//!
//! ```text
//! before hooks ──► Bypass(v)? ──yes──────────────────────┐
//!      │ no                                               │
//!      ▼                                                  │
//! rewrite(rewrite(... original ...))                      │
//!      │                                                  │
//!      ├── Err(fault) ──► on_exception hooks ─► Recover? ─┤
//!      ▼                                                  ▼
//!   Ok(value) ─────────────────────────────────────► after hooks
//! ```

mod hooks;

pub use hooks::{
    AfterFn, BeforeFn, CallFrame, ExceptionFn, Flow, Hook, HookSet, Next, Outcome, Recovery,
    RewriteFn, TargetFault,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::catalog::{Signature, TargetHandle, TargetId};
use crate::contracts::{InterceptKind, InterceptKinds};

/// Why an installation was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InstallError {
    #[error("hooks for '{target}' expect signature {expected}, host has {actual}")]
    SignatureMismatch {
        target: TargetId,
        expected: Signature,
        actual: Signature,
    },
    #[error("host refuses {kind} hooks on '{target}'")]
    Refused {
        target: TargetId,
        kind: InterceptKind,
    },
    #[error("module '{module}' requested {kind} interception but supplied no {kind} hook")]
    MissingHook {
        module: String,
        kind: InterceptKind,
    },
}

/// Receipt for one installed callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookHandle {
    pub id: u64,
    pub module: Arc<str>,
    pub target: TargetId,
    pub kind: InterceptKind,
}

struct HookEntry {
    handle: HookHandle,
    hook: Hook,
}

type Chain = Vec<Arc<HookEntry>>;

#[derive(Default)]
struct HookSite {
    chain: ArcSwap<Chain>,
}

/// Snapshot of engine activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub install_calls: u64,
    pub uninstall_calls: u64,
    pub rollbacks: u64,
}

#[derive(Default)]
struct Counters {
    install_calls: AtomicU64,
    uninstall_calls: AtomicU64,
    rollbacks: AtomicU64,
}

/// Hook installer and dispatcher. Shared between the registry (writer) and the
/// host (which routes calls through [`InterceptionEngine::invoke`]).
#[derive(Default)]
pub struct InterceptionEngine {
    sites: DashMap<TargetId, Arc<HookSite>>,
    write_lock: Mutex<()>,
    next_id: AtomicU64,
    counters: Counters,
}

impl InterceptionEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `kinds` from `hooks` on `target`, tagged with `module`.
    ///
    /// Any hooks `module` already has on `target` are removed first, so calling
    /// this repeatedly never stacks duplicate callbacks.
    ///
    /// # Errors
    /// Returns [`InstallError`] when the signature does not match, the host
    /// refuses a kind, or a requested kind has no callback. Hooks installed
    /// earlier in the same call are rolled back before returning.
    pub fn install(
        &self,
        target: &TargetHandle,
        module: &str,
        kinds: InterceptKinds,
        hooks: &HookSet,
    ) -> Result<Vec<HookHandle>, InstallError> {
        self.counters.install_calls.fetch_add(1, Ordering::Relaxed);
        let _guard = self.write_lock.lock();

        self.detach(&target.id, module);

        let mut installed = Vec::new();
        let result = Self::check_signature(target, hooks).and_then(|()| {
            for kind in kinds.kinds() {
                installed.push(self.attach(target, module, kind, hooks)?);
            }
            Ok(())
        });

        if let Err(err) = result {
            if !installed.is_empty() {
                self.detach(&target.id, module);
                self.counters.rollbacks.fetch_add(1, Ordering::Relaxed);
            }
            tracing::warn!(
                module,
                target = %target.id,
                rolled_back = installed.len(),
                error = %err,
                "Hook installation failed"
            );
            return Err(err);
        }

        tracing::debug!(module, target = %target.id, hooks = installed.len(), "Hooks installed");
        Ok(installed)
    }

    /// Removes exactly the hooks tagged with `module` on `target`.
    /// Returns how many callbacks were removed; zero is not an error.
    pub fn uninstall(&self, target: &TargetId, module: &str) -> usize {
        self.counters.uninstall_calls.fetch_add(1, Ordering::Relaxed);
        let _guard = self.write_lock.lock();
        let removed = self.detach(target, module);
        if removed > 0 {
            tracing::debug!(module, target = %target, removed, "Hooks uninstalled");
        }
        removed
    }

    /// Removes every hook this engine has installed.
    pub fn uninstall_all(&self) -> usize {
        self.counters.uninstall_calls.fetch_add(1, Ordering::Relaxed);
        let _guard = self.write_lock.lock();
        let mut removed = 0;
        for site in &self.sites {
            removed += site.chain.swap(Arc::new(Vec::new())).len();
        }
        self.sites.clear();
        tracing::info!(removed, "All hooks uninstalled");
        removed
    }

    /// Handles currently installed on `target`, in dispatch order.
    #[must_use]
    pub fn hooks_on(&self, target: &TargetId) -> Vec<HookHandle> {
        self.chain(target)
            .map(|c| c.iter().map(|e| e.handle.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            install_calls: self.counters.install_calls.load(Ordering::Relaxed),
            uninstall_calls: self.counters.uninstall_calls.load(Ordering::Relaxed),
            rollbacks: self.counters.rollbacks.load(Ordering::Relaxed),
        }
    }

    /// Runs a host operation through whatever hooks are installed on `target`.
    ///
    /// # Errors
    /// Returns the body's [`TargetFault`] unless an `on_exception` hook recovers.
    pub fn invoke<F>(&self, target: &TargetId, args: Vec<Value>, mut original: F) -> Outcome
    where
        F: FnMut(&mut CallFrame) -> Outcome,
    {
        let mut frame = CallFrame::new(target.clone(), args);
        self.invoke_frame(&mut frame, &mut original)
    }

    /// Like [`invoke`](Self::invoke) but with a caller-owned frame.
    ///
    /// # Errors
    /// Returns the body's [`TargetFault`] unless an `on_exception` hook recovers.
    pub fn invoke_frame(
        &self,
        frame: &mut CallFrame,
        original: &mut dyn FnMut(&mut CallFrame) -> Outcome,
    ) -> Outcome {
        let Some(chain) = self.chain(&frame.target) else {
            return original(frame);
        };
        if chain.is_empty() {
            return original(frame);
        }

        let mut bypass = None;
        for entry in chain.iter() {
            if let Hook::Before(f) = &entry.hook {
                if let Flow::Bypass(value) = f(frame) {
                    bypass.get_or_insert(value);
                }
            }
        }

        let outcome = match bypass {
            Some(value) => Ok(value),
            None => {
                let rewrites: Vec<&RewriteFn> = chain
                    .iter()
                    .filter_map(|e| match &e.hook {
                        Hook::Rewrite(f) => Some(f),
                        _ => None,
                    })
                    .collect();
                run_body(&rewrites, frame, original)
            }
        };

        let outcome = match outcome {
            Err(fault) => recover(&chain, frame, fault),
            ok => ok,
        };

        outcome.map(|mut value| {
            for entry in chain.iter() {
                if let Hook::After(f) = &entry.hook {
                    f(frame, &mut value);
                }
            }
            value
        })
    }

    // The dashmap guard must be released before any hook runs: hooks may
    // re-enter the engine.
    fn chain(&self, target: &TargetId) -> Option<Arc<Chain>> {
        self.sites.get(target).map(|site| site.chain.load_full())
    }

    fn check_signature(target: &TargetHandle, hooks: &HookSet) -> Result<(), InstallError> {
        match hooks.expected_signature() {
            Some(expected) if *expected != target.signature => {
                Err(InstallError::SignatureMismatch {
                    target: target.id.clone(),
                    expected: expected.clone(),
                    actual: target.signature.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn attach(
        &self,
        target: &TargetHandle,
        module: &str,
        kind: InterceptKind,
        hooks: &HookSet,
    ) -> Result<HookHandle, InstallError> {
        if target.refuses.contains(kind.flag()) {
            return Err(InstallError::Refused {
                target: target.id.clone(),
                kind,
            });
        }
        let hook = hooks.get(kind).ok_or_else(|| InstallError::MissingHook {
            module: module.to_owned(),
            kind,
        })?;

        let handle = HookHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            module: module.into(),
            target: target.id.clone(),
            kind,
        };

        let site = Arc::clone(&*self.sites.entry(target.id.clone()).or_default());
        let mut chain: Chain = site.chain.load().iter().cloned().collect();
        chain.push(Arc::new(HookEntry {
            handle: handle.clone(),
            hook,
        }));
        site.chain.store(Arc::new(chain));

        Ok(handle)
    }

    /// Caller holds `write_lock`.
    fn detach(&self, target: &TargetId, module: &str) -> usize {
        let Some(site) = self.sites.get(target).map(|s| Arc::clone(&*s)) else {
            return 0;
        };
        let current = site.chain.load_full();
        let kept: Chain = current
            .iter()
            .filter(|e| &*e.handle.module != module)
            .cloned()
            .collect();
        let removed = current.len() - kept.len();
        if removed > 0 {
            site.chain.store(Arc::new(kept));
        }
        removed
    }
}

fn run_body(
    rewrites: &[&RewriteFn],
    frame: &mut CallFrame,
    original: &mut dyn FnMut(&mut CallFrame) -> Outcome,
) -> Outcome {
    match rewrites.split_first() {
        None => original(frame),
        Some((outer, rest)) => {
            let mut next = |f: &mut CallFrame| run_body(rest, f, &mut *original);
            outer(frame, &mut next)
        }
    }
}

fn recover(chain: &Chain, frame: &mut CallFrame, fault: TargetFault) -> Outcome {
    for entry in chain {
        if let Hook::OnException(f) = &entry.hook {
            if let Recovery::Recover(value) = f(frame, &fault) {
                tracing::debug!(
                    module = %entry.handle.module,
                    target = %frame.target,
                    fault = %fault,
                    "Exception recovered by hook"
                );
                return Ok(value);
            }
        }
    }
    Err(fault)
}
