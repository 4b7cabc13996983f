//! Concurrent access to a refreshed context

use crossbeam_utils::thread;
use ferrous_context::{ApplicationContext, BeanDefinition, BeanFactory, BeanFactoryExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test Services =====

struct ConnectionPool {
    size: usize,
}

struct Request {
    pool: Arc<ConnectionPool>,
}

fn context(created: Arc<AtomicUsize>) -> Arc<ApplicationContext> {
    ApplicationContext::builder()
        .bean(
            BeanDefinition::builder::<ConnectionPool>("pool")
                .supplier(move || {
                    created.fetch_add(1, Ordering::SeqCst);
                    ConnectionPool { size: 8 }
                })
                .lazy()
                .build(),
        )
        .bean(
            BeanDefinition::builder::<Request>("request")
                .prototype()
                .constructor(&["pool"], |args| {
                    Ok(Request {
                        pool: args.get::<ConnectionPool>(0)?,
                    })
                })
                .build(),
        )
        .build()
        .unwrap()
}

#[test]
fn test_lazy_singleton_created_once_under_contention() {
    let created = Arc::new(AtomicUsize::new(0));
    let ctx = context(created.clone());

    let pools: Vec<Arc<ConnectionPool>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|_| ctx.get_bean_as::<ConnectionPool>("pool").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(pools.iter().all(|pool| Arc::ptr_eq(pool, &pools[0])));
    assert_eq!(pools[0].size, 8);
}

#[test]
fn test_prototypes_share_singleton_dependency() {
    let created = Arc::new(AtomicUsize::new(0));
    let ctx = context(created.clone());

    let requests: Vec<Arc<Request>> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|_| {
                    (0..25)
                        .map(|_| ctx.get_bean_as::<Request>("request").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert_eq!(requests.len(), 100);
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(requests.iter().all(|r| Arc::ptr_eq(&r.pool, &requests[0].pool)));
    assert!(!Arc::ptr_eq(&requests[0], &requests[1]));
}

#[test]
fn test_lookups_after_close_fail_on_every_thread() {
    let ctx = context(Arc::new(AtomicUsize::new(0)));
    ctx.close();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|_| assert!(ctx.get_bean("pool").is_err()));
        }
    })
    .unwrap();
}
