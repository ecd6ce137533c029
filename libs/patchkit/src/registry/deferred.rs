use super::PatchRegistry;

/// Work scheduled for the next host update cycle.
pub type DeferredFn = Box<dyn FnOnce(&mut PatchRegistry) + Send>;

pub(super) struct Pending {
    pub(super) module: String,
    pub(super) epoch: u64,
    pub(super) run: DeferredFn,
}

/// FIFO of callbacks tagged with the activation epoch of the module that
/// scheduled them. Drained once per tick by [`PatchRegistry::tick`].
#[derive(Default)]
pub struct DeferredQueue {
    items: Vec<Pending>,
}

impl DeferredQueue {
    pub(super) fn push(&mut self, pending: Pending) {
        self.items.push(pending);
    }

    /// Takes everything queued so far; work enqueued while draining waits for
    /// the next tick.
    pub(super) fn take(&mut self) -> Vec<Pending> {
        std::mem::take(&mut self.items)
    }

    /// Drops every item scheduled for `module`.
    pub(super) fn cancel(&mut self, module: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|p| p.module != module);
        before - self.items.len()
    }

    pub(super) fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
