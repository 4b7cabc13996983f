use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_context::web::{
    Dispatcher, Flow, Handler, HandlerInterceptor, JsonView, ModelAndView, StaticViewResolver, UrlHandlerMapping,
    WebRequest, WebResponse,
};
use ferrous_context::*;
use std::sync::Arc;

// ===== Bean Factory Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let ctx = ApplicationContext::builder().singleton("answer", 42u64).build().unwrap();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| {
            let v = ctx.get_bean_as::<u64>("answer").unwrap();
            black_box(v);
        })
    });
}

fn bench_prototype_creation(c: &mut Criterion) {
    struct Repository {
        url: String,
    }

    struct Service {
        repository: Arc<Repository>,
        buffer: [u8; 64],
    }

    let ctx = ApplicationContext::builder()
        .singleton("repository", Repository { url: "db://bench".into() })
        .bean(
            BeanDefinition::builder::<Service>("service")
                .prototype()
                .constructor(&["repository"], |args| {
                    Ok(Service {
                        repository: args.get::<Repository>(0)?,
                        buffer: [0; 64],
                    })
                })
                .build(),
        )
        .build()
        .unwrap();

    c.bench_function("prototype_with_dependency", |b| {
        b.iter(|| {
            let service = ctx.get_bean_as::<Service>("service").unwrap();
            black_box((service.repository.url.len(), service.buffer[0]));
        })
    });
}

fn bench_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("refresh");

    for count in [10usize, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut builder = ApplicationContext::builder();
                    for i in 0..count {
                        builder = builder.bean(
                            BeanDefinition::builder::<usize>(format!("bean{i}"))
                                .supplier(move || i)
                                .build(),
                        );
                    }
                    builder
                },
                |builder| black_box(builder.build().unwrap()),
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// ===== Dispatch Benchmarks =====

struct PassThrough;

impl HandlerInterceptor for PassThrough {
    fn pre_handle(&self, _req: &mut WebRequest, _resp: &mut WebResponse, _handler: &Handler) -> ContextResult<Flow> {
        Ok(Flow::Continue)
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let mapping = UrlHandlerMapping::new()
        .register(
            "/orders/{id}",
            Handler::from_fn("show", |_, _| Ok(ModelAndView::with_view_name("orders/show").with("total", 10).into())),
        )
        .with_interceptor(Arc::new(PassThrough))
        .with_interceptor(Arc::new(PassThrough));
    let dispatcher = Dispatcher::builder()
        .handler_mapping(Arc::new(mapping))
        .view_resolver(Arc::new(
            StaticViewResolver::new().with_view("orders/show", Arc::new(JsonView::new())),
        ))
        .build();

    c.bench_function("dispatch_json_view", |b| {
        b.iter(|| {
            let mut request = WebRequest::get("/orders/42");
            let mut response = WebResponse::new();
            let outcome = dispatcher.service(&mut request, &mut response);
            black_box((outcome.is_completed(), response.body().len()));
        })
    });
}

fn bench_path_matching(c: &mut Criterion) {
    let matcher = AntPathMatcher::new();

    c.bench_function("ant_path_match", |b| {
        b.iter(|| {
            black_box(matcher.matches("/static/**/*.js", "/static/app/v2/main.js"));
            black_box(matcher.matches("/api/{version}/orders/*", "/api/v1/orders/42"));
        })
    });
}

criterion_group!(
    context_benches,
    bench_singleton_hit,
    bench_prototype_creation,
    bench_refresh
);

criterion_group!(web_benches, bench_dispatch, bench_path_matching);

criterion_main!(context_benches, web_benches);
