//! Hook callback types and the per-invocation call frame.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::catalog::{Signature, TargetId};
use crate::contracts::InterceptKind;

/// Error raised by a target operation's body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct TargetFault {
    pub message: String,
}

impl TargetFault {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of running a target body.
pub type Outcome = Result<Value, TargetFault>;

/// Decision returned by a `before` hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Run the original body.
    Continue,
    /// Skip the original body (and any rewrites), returning this value.
    Bypass(Value),
}

/// Decision returned by an `on_exception` hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    Propagate,
    Recover(Value),
}

/// State visible to hooks for a single invocation of a target.
///
/// `locals` lives exactly as long as the invocation; hooks use it to pass state
/// from `before` to `after` instead of keeping shared scratch space.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub target: TargetId,
    pub args: Vec<Value>,
    pub locals: HashMap<String, Value>,
}

impl CallFrame {
    #[must_use]
    pub fn new(target: TargetId, args: Vec<Value>) -> Self {
        Self {
            target,
            args,
            locals: HashMap::new(),
        }
    }

    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

pub type BeforeFn = Arc<dyn Fn(&mut CallFrame) -> Flow + Send + Sync>;
pub type AfterFn = Arc<dyn Fn(&mut CallFrame, &mut Value) + Send + Sync>;
/// Continuation handed to a rewrite: the rest of the body.
pub type Next<'a> = &'a mut dyn FnMut(&mut CallFrame) -> Outcome;
pub type RewriteFn = Arc<dyn Fn(&mut CallFrame, Next<'_>) -> Outcome + Send + Sync>;
pub type ExceptionFn = Arc<dyn Fn(&mut CallFrame, &TargetFault) -> Recovery + Send + Sync>;

/// A single installed callback.
#[derive(Clone)]
pub enum Hook {
    Before(BeforeFn),
    After(AfterFn),
    Rewrite(RewriteFn),
    OnException(ExceptionFn),
}

impl Hook {
    #[must_use]
    pub fn kind(&self) -> InterceptKind {
        match self {
            Hook::Before(_) => InterceptKind::Before,
            Hook::After(_) => InterceptKind::After,
            Hook::Rewrite(_) => InterceptKind::Rewrite,
            Hook::OnException(_) => InterceptKind::OnException,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook::{}", self.kind())
    }
}

/// Hooks a module supplies for one installation.
#[derive(Clone, Default)]
pub struct HookSet {
    before: Option<BeforeFn>,
    after: Option<AfterFn>,
    rewrite: Option<RewriteFn>,
    on_exception: Option<ExceptionFn>,
    expects: Option<Signature>,
}

impl HookSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallFrame) -> Flow + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallFrame, &mut Value) + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn rewrite<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallFrame, Next<'_>) -> Outcome + Send + Sync + 'static,
    {
        self.rewrite = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_exception<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallFrame, &TargetFault) -> Recovery + Send + Sync + 'static,
    {
        self.on_exception = Some(Arc::new(f));
        self
    }

    /// Declares the target signature these hooks were written against.
    #[must_use]
    pub fn expecting(mut self, signature: Signature) -> Self {
        self.expects = Some(signature);
        self
    }

    #[must_use]
    pub fn expected_signature(&self) -> Option<&Signature> {
        self.expects.as_ref()
    }

    /// The callback supplied for `kind`, if any.
    #[must_use]
    pub fn get(&self, kind: InterceptKind) -> Option<Hook> {
        match kind {
            InterceptKind::Before => self.before.clone().map(Hook::Before),
            InterceptKind::After => self.after.clone().map(Hook::After),
            InterceptKind::Rewrite => self.rewrite.clone().map(Hook::Rewrite),
            InterceptKind::OnException => self.on_exception.clone().map(Hook::OnException),
        }
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("rewrite", &self.rewrite.is_some())
            .field("on_exception", &self.on_exception.is_some())
            .field("expects", &self.expects)
            .finish()
    }
}
