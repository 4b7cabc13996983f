//! Deferred handler results and async re-dispatch

use ferrous_context::web::{
    DeferredCallback, DeferredResult, DispatchKind, DispatchOutcome, Dispatcher, Flow, Handler, HandlerInterceptor,
    HandlerOutcome, JsonView, ModelAndView, StaticViewResolver, UrlHandlerMapping, WebRequest, WebResponse,
};
use ferrous_context::{ContextError, ContextResult};
use http::StatusCode;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

type Journal = Arc<Mutex<Vec<String>>>;

// ===== Test Services =====

struct Tracing {
    journal: Journal,
}

impl HandlerInterceptor for Tracing {
    fn pre_handle(&self, request: &mut WebRequest, _resp: &mut WebResponse, _handler: &Handler) -> ContextResult<Flow> {
        self.journal.lock().push(format!("pre:{:?}", request.dispatch_kind()));
        Ok(Flow::Continue)
    }

    fn post_handle(
        &self,
        _req: &mut WebRequest,
        _resp: &mut WebResponse,
        _handler: &Handler,
        _mv: Option<&mut ModelAndView>,
    ) -> ContextResult<()> {
        self.journal.lock().push("post".into());
        Ok(())
    }

    fn after_completion(
        &self,
        _req: &mut WebRequest,
        _resp: &mut WebResponse,
        _handler: &Handler,
        _error: Option<&ContextError>,
    ) -> ContextResult<()> {
        self.journal.lock().push("done".into());
        Ok(())
    }

    fn after_concurrent_handling_started(
        &self,
        _req: &mut WebRequest,
        _resp: &mut WebResponse,
        _handler: &Handler,
    ) -> ContextResult<()> {
        self.journal.lock().push("async_started".into());
        Ok(())
    }
}

struct Cleanup {
    journal: Journal,
}

impl DeferredCallback for Cleanup {
    fn on_timeout(&self, _request: &WebRequest) {
        self.journal.lock().push("callback:timeout".into());
    }

    fn on_error(&self, _request: &WebRequest, error: &ContextError) {
        self.journal.lock().push(format!("callback:error:{}", error.kind()));
    }

    fn on_completion(&self, _request: &WebRequest) {
        self.journal.lock().push("callback:completion".into());
    }
}

fn dispatcher(journal: Journal, pending: Arc<Mutex<Option<DeferredResult>>>, timeout: Option<Duration>) -> Dispatcher {
    let callbacks = journal.clone();
    let mapping = UrlHandlerMapping::new()
        .register(
            "/reports/{id}",
            Handler::from_fn("report", move |request, _| {
                let deferred = match timeout {
                    Some(timeout) => DeferredResult::with_timeout(timeout),
                    None => DeferredResult::new(),
                };
                request.async_manager_mut().register_callback(Arc::new(Cleanup {
                    journal: callbacks.clone(),
                }));
                *pending.lock() = Some(deferred.clone());
                Ok(HandlerOutcome::Deferred(deferred))
            }),
        )
        .with_interceptor(Arc::new(Tracing { journal }));

    Dispatcher::builder()
        .handler_mapping(Arc::new(mapping))
        .view_resolver(Arc::new(
            StaticViewResolver::new().with_view("reports/7", Arc::new(JsonView::new())),
        ))
        .build()
}

// ===== Tests =====

#[test]
fn test_deferred_result_resumes_on_async_pass() {
    let journal: Journal = Arc::default();
    let pending = Arc::new(Mutex::new(None));
    let dispatcher = dispatcher(journal.clone(), pending.clone(), Some(Duration::from_secs(5)));

    let completed = Arc::new(AtomicUsize::new(0));
    let mut request = WebRequest::get("/reports/7");
    request.register_destruction_callback("completed", {
        let completed = completed.clone();
        move || {
            completed.fetch_add(1, Ordering::SeqCst);
        }
    });
    let mut response = WebResponse::new();

    let outcome = dispatcher.service(&mut request, &mut response);
    assert!(matches!(outcome, DispatchOutcome::AsyncStarted(_)));
    assert!(request.async_manager().is_concurrent_handling_started());
    assert!(!response.is_committed());
    // The request stays open until the async pass finishes
    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert_eq!(*journal.lock(), vec!["pre:Request", "async_started"]);

    let deferred = pending.lock().clone().unwrap();
    let producer = thread::spawn(move || deferred.set_result(ModelAndView::new().with("rows", 12)));
    assert!(producer.join().unwrap());

    let outcome = dispatcher.resume_async(&mut request, &mut response);
    assert!(outcome.is_completed());
    assert_eq!(request.dispatch_kind(), DispatchKind::Async);
    assert_eq!(response.body_text(), r#"{"rows":12}"#);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert_eq!(
        *journal.lock(),
        vec![
            "pre:Request",
            "async_started",
            "callback:completion",
            "pre:Async",
            "post",
            "done",
        ]
    );
}

#[test]
fn test_first_result_wins() {
    let deferred = DeferredResult::new();
    assert!(deferred.set_result(ModelAndView::with_view_name("first")));
    assert!(!deferred.set_error_result(ContextError::Handler("late".into())));
    let result = deferred.await_result().unwrap().unwrap();
    assert_eq!(result.view_name(), Some("first"));
    assert!(deferred.await_result().is_none());
}

#[test]
fn test_error_result_goes_through_exception_handling() {
    let journal: Journal = Arc::default();
    let pending = Arc::new(Mutex::new(None));
    let dispatcher = dispatcher(journal.clone(), pending.clone(), None);

    let mut request = WebRequest::get("/reports/7");
    let mut response = WebResponse::new();
    dispatcher.service(&mut request, &mut response);

    let deferred = pending.lock().clone().unwrap();
    deferred.set_error_result(ContextError::ResponseStatus {
        status: 409,
        reason: "Report locked".into(),
    });

    let outcome = dispatcher.resume_async(&mut request, &mut response);
    assert!(outcome.is_completed());
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(response.error_message(), Some("Report locked"));
    let journal = journal.lock();
    assert!(journal.contains(&"callback:error:response_status".to_string()));
    assert!(!journal.contains(&"post".to_string()));
}

#[test]
fn test_timeout_becomes_service_unavailable() {
    let journal: Journal = Arc::default();
    let pending = Arc::new(Mutex::new(None));
    let dispatcher = dispatcher(journal.clone(), pending, Some(Duration::from_millis(20)));

    let mut request = WebRequest::get("/reports/7");
    let mut response = WebResponse::new();
    assert!(dispatcher.service(&mut request, &mut response).is_async_started());

    let outcome = dispatcher.resume_async(&mut request, &mut response);
    assert!(outcome.is_completed());
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        journal.lock()[2..5],
        ["callback:timeout", "callback:error:response_status", "callback:completion"]
    );
}

#[test]
fn test_resume_without_async_start_fails() {
    let dispatcher = Dispatcher::builder().build();
    let mut request = WebRequest::get("/reports/7");
    let outcome = dispatcher.resume_async(&mut request, &mut WebResponse::new());
    assert!(matches!(outcome, DispatchOutcome::Failed(ContextError::ContextState(_))));
}
