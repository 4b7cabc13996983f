//! Per-thread tracking of beans under construction.

use std::cell::RefCell;

use crate::error::{ContextError, ContextResult};

const MAX_DEPTH: usize = 1024;

// Thread-local creation stack, keyed by context serial so that parent and
// child contexts with the same bean names do not see each other's frames.
thread_local! {
    static CREATION_TLS: RefCell<CreationTls> = RefCell::new(CreationTls::default());
}

#[derive(Default)]
struct CreationTls {
    stack: Vec<(u64, String)>,
}

/// Guard marking a bean as under construction on the current thread.
///
/// The frame is popped when the guard drops, on success and error paths alike.
pub(crate) struct CreationGuard {
    context: u64,
    name: String,
}

impl CreationGuard {
    /// Pushes `name` for `context`, failing if it is already being created on
    /// this thread or the nesting depth is exhausted.
    pub(crate) fn enter(context: u64, name: &str) -> ContextResult<Self> {
        CREATION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();

            // Circular detection BEFORE pushing the new name
            if tls.stack.iter().any(|(c, n)| *c == context && n == name) {
                let mut path: Vec<String> = tls
                    .stack
                    .iter()
                    .filter(|(c, _)| *c == context)
                    .map(|(_, n)| n.clone())
                    .collect();
                path.push(name.to_string());
                return Err(ContextError::CircularReference {
                    path,
                    reason: "prototype beans cannot be resolved through an early reference".into(),
                });
            }

            if tls.stack.len() >= MAX_DEPTH {
                return Err(ContextError::DepthExceeded(tls.stack.len()));
            }

            tls.stack.push((context, name.to_string()));
            Ok(())
        })?;

        Ok(Self {
            context,
            name: name.to_string(),
        })
    }
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        CREATION_TLS.with(|tls| {
            let mut tls = tls.borrow_mut();
            if let Some(pos) = tls
                .stack
                .iter()
                .rposition(|(c, n)| *c == self.context && *n == self.name)
            {
                tls.stack.remove(pos);
            }
        });
    }
}

/// Names currently under construction for `context`, outermost first, with
/// `closing` appended to show where the cycle closes.
pub(crate) fn current_path(context: u64, closing: &str) -> Vec<String> {
    CREATION_TLS.with(|tls| {
        let tls = tls.borrow();
        let start = tls
            .stack
            .iter()
            .position(|(c, n)| *c == context && n == closing)
            .unwrap_or(0);
        let mut path: Vec<String> = tls.stack[start..]
            .iter()
            .filter(|(c, _)| *c == context)
            .map(|(_, n)| n.clone())
            .collect();
        path.push(closing.to_string());
        path
    })
}
