//! Deferred handler results and the per-request async state.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::request::WebRequest;
use super::view::ModelAndView;
use crate::error::{ContextError, ContextResult};

enum DeferredState {
    Pending,
    Ready(ContextResult<ModelAndView>),
    Taken,
}

struct DeferredInner {
    state: Mutex<DeferredState>,
    ready: Condvar,
    timeout: Option<Duration>,
}

/// A handler result produced later, possibly on another thread.
///
/// The first value set wins. Clones share the same slot.
///
/// ```
/// use ferrous_context::web::{DeferredResult, ModelAndView};
/// use std::time::Duration;
///
/// let deferred = DeferredResult::with_timeout(Duration::from_secs(1));
/// let producer = deferred.clone();
/// std::thread::spawn(move || producer.set_result(ModelAndView::with_view_name("done")))
///     .join()
///     .unwrap();
///
/// let result = deferred.await_result().unwrap().unwrap();
/// assert_eq!(result.view_name(), Some("done"));
/// ```
#[derive(Clone)]
pub struct DeferredResult {
    inner: Arc<DeferredInner>,
}

impl DeferredResult {
    /// Waits without a deadline.
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(DeferredInner {
                state: Mutex::new(DeferredState::Pending),
                ready: Condvar::new(),
                timeout,
            }),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Returns `false` if a result was already set.
    pub fn set_result(&self, result: ModelAndView) -> bool {
        self.complete(Ok(result))
    }

    pub fn set_error_result(&self, error: ContextError) -> bool {
        self.complete(Err(error))
    }

    fn complete(&self, result: ContextResult<ModelAndView>) -> bool {
        let mut state = self.inner.state.lock();
        if !matches!(*state, DeferredState::Pending) {
            debug!("deferred result already set, ignoring new value");
            return false;
        }
        *state = DeferredState::Ready(result);
        self.inner.ready.notify_all();
        true
    }

    pub fn has_result(&self) -> bool {
        !matches!(*self.inner.state.lock(), DeferredState::Pending)
    }

    /// Blocks until the result is set or the timeout elapses. `None` means
    /// the timeout elapsed or the result was already taken.
    pub fn await_result(&self) -> Option<ContextResult<ModelAndView>> {
        let deadline = self.inner.timeout.map(|t| Instant::now() + t);
        let mut state = self.inner.state.lock();
        while matches!(*state, DeferredState::Pending) {
            match deadline {
                Some(deadline) => {
                    if self.inner.ready.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => self.inner.ready.wait(&mut state),
            }
        }
        match std::mem::replace(&mut *state, DeferredState::Taken) {
            DeferredState::Ready(result) => Some(result),
            DeferredState::Pending => {
                *state = DeferredState::Pending;
                None
            }
            DeferredState::Taken => None,
        }
    }
}

impl Default for DeferredResult {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeferredResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredResult")
            .field("timeout", &self.inner.timeout)
            .field("has_result", &self.has_result())
            .finish()
    }
}

/// Cleanup hooks for an async handoff, registered during the pre-phase.
///
/// They run whether or not the normal completion phase ever runs.
pub trait DeferredCallback: Send + Sync {
    fn on_timeout(&self, request: &WebRequest) {
        let _ = request;
    }

    fn on_error(&self, request: &WebRequest, error: &ContextError) {
        let _ = (request, error);
    }

    fn on_completion(&self, request: &WebRequest) {
        let _ = request;
    }
}

/// Async state carried by a [`WebRequest`] across passes.
#[derive(Default)]
pub struct AsyncManager {
    deferred: Option<DeferredResult>,
    callbacks: Vec<Arc<dyn DeferredCallback>>,
    concurrent_result: Option<ContextResult<ModelAndView>>,
}

impl AsyncManager {
    pub fn register_callback(&mut self, callback: Arc<dyn DeferredCallback>) {
        self.callbacks.push(callback);
    }

    pub fn is_concurrent_handling_started(&self) -> bool {
        self.deferred.is_some()
    }

    pub(crate) fn start(&mut self, deferred: DeferredResult) {
        self.deferred = Some(deferred);
    }

    pub fn has_concurrent_result(&self) -> bool {
        self.concurrent_result.is_some()
    }

    pub(crate) fn take_concurrent_result(&mut self) -> Option<ContextResult<ModelAndView>> {
        self.concurrent_result.take()
    }

    pub(crate) fn take_deferred(&mut self) -> Option<DeferredResult> {
        self.deferred.take()
    }

    pub(crate) fn set_concurrent_result(&mut self, result: ContextResult<ModelAndView>) {
        self.concurrent_result = Some(result);
    }

    pub(crate) fn take_callbacks(&mut self) -> Vec<Arc<dyn DeferredCallback>> {
        std::mem::take(&mut self.callbacks)
    }
}

impl fmt::Debug for AsyncManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncManager")
            .field("started", &self.is_concurrent_handling_started())
            .field("callbacks", &self.callbacks.len())
            .field("has_result", &self.has_concurrent_result())
            .finish()
    }
}

/// Waits for the request's deferred result and stores it as the concurrent
/// result for the async pass. Timeouts become a 503 error.
pub(crate) fn collect_deferred(request: &mut WebRequest) -> ContextResult<()> {
    let deferred = request.async_manager_mut().take_deferred().ok_or_else(|| {
        ContextError::ContextState("concurrent handling has not been started for this request".into())
    })?;
    let callbacks = request.async_manager_mut().take_callbacks();

    let result = match deferred.await_result() {
        Some(result) => result,
        None => {
            warn!(path = request.path(), timeout = ?deferred.timeout(), "async request timed out");
            for callback in &callbacks {
                callback.on_timeout(request);
            }
            Err(ContextError::ResponseStatus {
                status: 503,
                reason: "Service Unavailable".into(),
            })
        }
    };
    if let Err(error) = &result {
        for callback in &callbacks {
            callback.on_error(request, error);
        }
    }
    for callback in &callbacks {
        callback.on_completion(request);
    }
    request.async_manager_mut().set_concurrent_result(result);
    Ok(())
}
