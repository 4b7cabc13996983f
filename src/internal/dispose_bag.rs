//! Internal disposal bag for managing destroy callbacks.

use crate::error::ContextError;

type Hook = Box<dyn FnOnce() -> Result<(), ContextError> + Send>;

/// Container for named destroy hooks with LIFO execution order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<(String, Hook)>,
}

impl DisposeBag {
    /// Add a destroy hook for `name`.
    pub(crate) fn push(&mut self, name: impl Into<String>, f: Hook) {
        self.hooks.push((name.into(), f));
    }

    /// Execute all hooks in reverse order (LIFO), collecting failures.
    ///
    /// A failing hook does not stop the remaining ones.
    pub(crate) fn run_all_reverse(&mut self) -> Vec<(String, ContextError)> {
        let mut failures = Vec::new();
        while let Some((name, f)) = self.hooks.pop() {
            if let Err(e) = (f)() {
                failures.push((name, e));
            }
        }
        failures
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check if the bag is empty (no disposers registered).
    pub(crate) fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
