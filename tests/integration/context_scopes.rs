//! Integration tests for scoped context resolution, forking, and
//! guaranteed resource release.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use strata::context::{ResourceGuard, ScopedContext};
use strata::error::ContextError;

/// A request-setup shape: configuration set at the root, a connection
/// attached per request scope, consumed by nested query scopes.
#[test]
fn test_request_scope_lifecycle() {
    let opened = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));

    let mut ctx = ScopedContext::new("app");
    ctx.set("dsn", "postgres://catalog".to_string()).unwrap();

    for _ in 0..3 {
        let opened = Arc::clone(&opened);
        let closed = Arc::clone(&closed);
        ctx.with_scope(|ctx| {
            ctx.attach("connection", move || {
                opened.fetch_add(1, Ordering::SeqCst);
                let closed = Arc::clone(&closed);
                ResourceGuard::new("live-connection", move || {
                    closed.fetch_add(1, Ordering::SeqCst);
                })
            })
            .unwrap();

            // Two nested query scopes share the one connection.
            ctx.with_scope(|ctx| {
                assert_eq!(
                    *ctx.get_as::<&str>("connection").unwrap(),
                    "live-connection"
                );
            });
            ctx.with_scope(|ctx| {
                ctx.get("connection").unwrap();
            });
        });
    }

    // One connection per request scope, all released.
    assert_eq!(opened.load(Ordering::SeqCst), 3);
    assert_eq!(closed.load(Ordering::SeqCst), 3);
}

#[test]
fn test_resources_released_during_unwind() {
    let released: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let mut ctx = ScopedContext::new("app");
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        ctx.with_scope(|ctx| {
            let first = Arc::clone(&released);
            ctx.attach("first", move || {
                let log = Arc::clone(&first);
                ResourceGuard::new(1u32, move || log.lock().unwrap().push("first"))
            })
            .unwrap();
            let second = Arc::clone(&released);
            ctx.attach("second", move || {
                let log = Arc::clone(&second);
                ResourceGuard::new(2u32, move || log.lock().unwrap().push("second"))
            })
            .unwrap();

            ctx.get("first").unwrap();
            ctx.get("second").unwrap();
            panic!("query failed mid-page");
        })
    }));

    assert!(result.is_err());
    // Both acquired resources released exactly once, reverse order.
    assert_eq!(*released.lock().unwrap(), vec!["second", "first"]);
}

#[test]
fn test_forked_contexts_resolve_independently() {
    let factory_runs = Arc::new(AtomicUsize::new(0));

    let mut base = ScopedContext::new("base");
    base.set("page_size", 100u64).unwrap();
    {
        let runs = Arc::clone(&factory_runs);
        base.bind("schema_cache", move || {
            runs.fetch_add(1, Ordering::SeqCst);
            vec!["model_a".to_string(), "model_b".to_string()]
        })
        .unwrap();
    }

    // Resolve once in the parent.
    assert_eq!(base.get_as::<Vec<String>>("schema_cache").unwrap().len(), 2);
    assert_eq!(factory_runs.load(Ordering::SeqCst), 1);

    // Each worker forks; explicitly-set config is shared, the lazy cache
    // is not.
    let mut workers: Vec<ScopedContext> = (0..4)
        .map(|i| base.fork(format!("worker-{}", i)))
        .collect();
    let handles: Vec<std::thread::JoinHandle<u64>> = workers
        .drain(..)
        .map(|mut ctx| {
            std::thread::spawn(move || {
                let size = *ctx.get_as::<u64>("page_size").unwrap();
                ctx.get("schema_cache").unwrap();
                size
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 100);
    }

    // One run in the parent plus one per fork.
    assert_eq!(factory_runs.load(Ordering::SeqCst), 5);
}

#[test]
fn test_fork_inherits_resource_registrations_on_first_scope() {
    let opened = Arc::new(AtomicUsize::new(0));

    let mut base = ScopedContext::new("base");
    let handle = base.enter_scope();
    {
        let opened = Arc::clone(&opened);
        base.attach("conn", move || {
            opened.fetch_add(1, Ordering::SeqCst);
            ResourceGuard::new((), || {})
        })
        .unwrap();
    }

    let mut fork = base.fork("fork");
    // Outside a scope the registration is not yet live.
    assert!(matches!(
        fork.get("conn"),
        Err(ContextError::UnknownVariable(_))
    ));
    fork.with_scope(|ctx| {
        ctx.get("conn").unwrap();
    });
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    base.exit_scope(handle).unwrap();
}

#[test]
fn test_scope_guard_restores_shadowed_values() {
    let mut ctx = ScopedContext::new("base");
    ctx.set("tenant", "root".to_string()).unwrap();

    {
        let mut scope = ctx.scope();
        scope.set("tenant", "acme".to_string()).unwrap();
        assert_eq!(*scope.get_as::<String>("tenant").unwrap(), "acme");
    }

    assert_eq!(*ctx.get_as::<String>("tenant").unwrap(), "root");
}
