//! Resource server tests: registration, pruning, concurrency and routing.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use coap_protocol::{
        EventListener, FnListener, ListenerError, PoolConfig, Tenant, TenantFlow, TransportMode,
    };
    use coap_server::*;
    use coap_transport::{
        DefaultEndpointFactory, Endpoint, EndpointFactory, Exchange, Method, PortConfig, Request,
        RequestHandler, ResponseCode, TransportError,
    };

    fn pool() -> Arc<WorkerPool> {
        Arc::new(WorkerPool::new(PoolConfig {
            min_workers: 2,
            max_workers: 4,
            keep_alive: Duration::from_millis(200),
            queue_capacity: 16,
        }))
    }

    fn noop() -> Arc<dyn EventListener> {
        Arc::new(FnListener(|_: &str| Ok::<(), ListenerError>(())))
    }

    fn leaf(name: &str, tenant: &Tenant, mode: TransportMode, pool: &Arc<WorkerPool>) -> LeafResource {
        LeafResource::new(name, tenant.id, mode, noop(), pool.clone())
    }

    fn acme() -> Tenant {
        Tenant::new(7, "acme")
    }

    /// Endpoint factory that starts both transports without key material.
    struct AnyEndpoint;

    impl EndpointFactory for AnyEndpoint {
        fn create(&self, mode: TransportMode) -> Result<Endpoint, TransportError> {
            Ok(Endpoint {
                mode,
                port: PortConfig::default().port_for(mode),
            })
        }
    }

    fn started_server() -> ResourceServer {
        let server = ResourceServer::with_factory(AnyEndpoint);
        server.ensure_endpoint(TransportMode::Plain).unwrap();
        server.ensure_endpoint(TransportMode::Secure).unwrap();
        server
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn register_default_tenant_builds_prefix_and_leaf() {
        let registry = EndpointRegistry::default();
        let pool = pool();
        let tenant = Tenant::super_tenant();

        let outcome = registry
            .register(&tenant, "sensorTemp", leaf("sensorTemp", &tenant, TransportMode::Plain, &pool))
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::Created);
        assert_eq!(registry.shape(), vec!["coap-endpoints", "coap-endpoints/sensorTemp*"]);
    }

    #[test]
    fn register_is_idempotent() {
        let registry = EndpointRegistry::default();
        let pool = pool();
        let tenant = acme();

        for _ in 0..3 {
            registry
                .register(&tenant, "sensorTemp", leaf("sensorTemp", &tenant, TransportMode::Plain, &pool))
                .unwrap();
        }
        let again = registry
            .register(&tenant, "sensorTemp", leaf("sensorTemp", &tenant, TransportMode::Plain, &pool))
            .unwrap();

        assert_eq!(again, RegisterOutcome::AlreadyRegistered);
        assert_eq!(registry.leaf_count(), 1);
        // root + coap-endpoints + t + acme + sensorTemp
        assert_eq!(registry.node_count(), 5);
    }

    #[test]
    fn register_reuses_existing_branches() {
        let registry = EndpointRegistry::default();
        let pool = pool();
        let tenant = acme();

        registry.register(&tenant, "a", leaf("a", &tenant, TransportMode::Plain, &pool)).unwrap();
        registry.register(&tenant, "b", leaf("b", &tenant, TransportMode::Plain, &pool)).unwrap();

        assert_eq!(
            registry.shape(),
            vec![
                "coap-endpoints",
                "coap-endpoints/t",
                "coap-endpoints/t/acme",
                "coap-endpoints/t/acme/a*",
                "coap-endpoints/t/acme/b*",
            ]
        );
    }

    #[test]
    fn register_through_a_leaf_is_a_conflict() {
        let registry = EndpointRegistry::default();
        let pool = pool();
        let tenant = Tenant::super_tenant();

        registry.register(&tenant, "t", leaf("t", &tenant, TransportMode::Plain, &pool)).unwrap();
        let before = registry.shape();

        let err = registry
            .register(&acme(), "sensor", leaf("sensor", &acme(), TransportMode::Plain, &pool))
            .unwrap_err();

        assert!(matches!(err, RegistryError::PathConflict { .. }));
        assert_eq!(registry.shape(), before);
    }

    #[test]
    fn register_over_a_branch_is_a_conflict() {
        let registry = EndpointRegistry::default();
        let pool = pool();
        let tenant = acme();
        registry.register(&tenant, "x", leaf("x", &tenant, TransportMode::Plain, &pool)).unwrap();

        // "coap-endpoints/t" already exists as a branch.
        let super_tenant = Tenant::super_tenant();
        let err = registry
            .register(&super_tenant, "t", leaf("t", &super_tenant, TransportMode::Plain, &pool))
            .unwrap_err();

        assert!(matches!(err, RegistryError::PathConflict { .. }));
        assert_eq!(registry.leaf_count(), 1);
    }

    #[test]
    fn empty_name_keeps_empty_segment() {
        let registry = EndpointRegistry::default();
        let pool = pool();
        let tenant = Tenant::super_tenant();

        registry.register(&tenant, "", leaf("", &tenant, TransportMode::Plain, &pool)).unwrap();
        assert_eq!(registry.shape(), vec!["coap-endpoints", "coap-endpoints/*"]);
        registry.unregister(&tenant, "").unwrap();
        assert!(registry.shape().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Unregistration
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn register_then_unregister_restores_shape() {
        let registry = EndpointRegistry::default();
        let pool = pool();
        let tenant = acme();
        registry.register(&tenant, "keep", leaf("keep", &tenant, TransportMode::Plain, &pool)).unwrap();
        let before = registry.shape();

        let other = Tenant::new(9, "globex");
        registry.register(&other, "gone", leaf("gone", &other, TransportMode::Plain, &pool)).unwrap();
        assert_ne!(registry.shape(), before);

        registry.unregister(&other, "gone").unwrap();
        assert_eq!(registry.shape(), before);
    }

    #[test]
    fn unregister_prunes_chain_but_keeps_siblings() {
        let registry = EndpointRegistry::new(PathResolver::new("coap-endpoints/deep/er"));
        let pool = pool();
        let tenant = acme();

        registry.register(&tenant, "a/b/c", leaf("c", &tenant, TransportMode::Plain, &pool)).unwrap();
        registry.register(&tenant, "a/z", leaf("z", &tenant, TransportMode::Plain, &pool)).unwrap();

        registry.unregister(&tenant, "a/b/c").unwrap();
        assert_eq!(
            registry.shape(),
            vec![
                "coap-endpoints",
                "coap-endpoints/deep",
                "coap-endpoints/deep/er",
                "coap-endpoints/deep/er/t",
                "coap-endpoints/deep/er/t/acme",
                "coap-endpoints/deep/er/t/acme/a",
                "coap-endpoints/deep/er/t/acme/a/z*",
            ]
        );

        registry.unregister(&tenant, "a/z").unwrap();
        assert!(registry.shape().is_empty());
        assert_eq!(registry.node_count(), 1);
    }

    #[test]
    fn unregister_unknown_is_not_found() {
        let registry = EndpointRegistry::default();
        let err = registry.unregister(&acme(), "missing").unwrap_err();
        assert_eq!(
            err,
            RegistryError::ResourceNotFound {
                path: "coap-endpoints/t/acme/missing".into()
            }
        );
    }

    #[test]
    fn unregister_branch_is_not_found() {
        let registry = EndpointRegistry::default();
        let pool = pool();
        let tenant = acme();
        registry.register(&tenant, "a/b", leaf("b", &tenant, TransportMode::Plain, &pool)).unwrap();
        let before = registry.shape();

        let err = registry.unregister(&tenant, "a").unwrap_err();
        assert!(matches!(err, RegistryError::ResourceNotFound { .. }));
        assert_eq!(registry.shape(), before);
    }

    #[test]
    fn unregister_owned_leaves_foreign_leaf_alone() {
        let registry = EndpointRegistry::default();
        let pool = pool();
        let tenant = acme();
        let owned = leaf("shared", &tenant, TransportMode::Plain, &pool).with_owner("first");
        registry.register(&tenant, "shared", owned).unwrap();
        let before = registry.shape();

        let err = registry.unregister_owned(&tenant, "shared", "second").unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotOwner {
                path: "coap-endpoints/t/acme/shared".into()
            }
        );
        assert_eq!(registry.shape(), before);

        registry.unregister_owned(&tenant, "shared", "first").unwrap();
        assert!(registry.shape().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Concurrency
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn concurrent_disjoint_registrations() {
        const N: usize = 16;
        let registry = Arc::new(EndpointRegistry::default());
        let pool = pool();
        let barrier = Arc::new(Barrier::new(N));

        let handles: Vec<_> = (0..N)
            .map(|i| {
                let registry = registry.clone();
                let pool = pool.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let tenant = Tenant::new(i as i32 % 4, format!("tenant{}", i % 4));
                    let name = format!("adapter{i}");
                    barrier.wait();
                    registry
                        .register(&tenant, &name, leaf(&name, &tenant, TransportMode::Plain, &pool))
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), RegisterOutcome::Created);
        }

        assert_eq!(registry.leaf_count(), N);
        // root, prefix, "t", 4 tenant branches, N leaves
        assert_eq!(registry.node_count(), 1 + 1 + 1 + 4 + N);
        let shape = registry.shape();
        let mut deduped = shape.clone();
        deduped.dedup();
        assert_eq!(shape, deduped);
    }

    #[test]
    fn concurrent_unregister_of_one_leaf_succeeds_once() {
        const N: usize = 8;
        let registry = Arc::new(EndpointRegistry::default());
        let pool = pool();
        let tenant = acme();
        registry.register(&tenant, "a/b/c", leaf("c", &tenant, TransportMode::Plain, &pool)).unwrap();
        let barrier = Arc::new(Barrier::new(N));

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                let tenant = tenant.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.unregister(&tenant, "a/b/c")
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in results.iter().filter(|r| r.is_err()) {
            assert!(matches!(result, Err(RegistryError::ResourceNotFound { .. })));
        }
        assert!(registry.shape().is_empty());
        assert_eq!(registry.node_count(), 1);
    }

    #[test]
    fn concurrent_register_unregister_churn_leaves_no_residue() {
        const THREADS: usize = 8;
        const ROUNDS: usize = 200;
        let registry = Arc::new(EndpointRegistry::default());
        let pool = pool();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let registry = registry.clone();
                let pool = pool.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    // Pairs of threads share a tenant so siblings come and go
                    // under the same branch.
                    let tenant = Tenant::new((i / 2) as i32 + 1, format!("tenant{}", i / 2));
                    let name = format!("group/adapter{i}");
                    barrier.wait();
                    for _ in 0..ROUNDS {
                        let outcome = registry
                            .register(&tenant, &name, leaf(&name, &tenant, TransportMode::Plain, &pool))
                            .unwrap();
                        assert_eq!(outcome, RegisterOutcome::Created);
                        assert!(registry.contains(&tenant, &name));
                        registry.unregister(&tenant, &name).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.leaf_count(), 0);
        assert!(registry.shape().is_empty());
        assert_eq!(registry.node_count(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Endpoints
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn ensure_endpoint_is_idempotent() {
        let server = ResourceServer::with_factory(DefaultEndpointFactory::plain_only(PortConfig::default()));
        let first = server.ensure_endpoint(TransportMode::Plain).unwrap();
        let second = server.ensure_endpoint(TransportMode::Plain).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.port, 5684);
        assert_eq!(server.endpoints().len(), 1);
    }

    #[test]
    fn secure_endpoint_without_key_material_fails() {
        let server = ResourceServer::with_factory(DefaultEndpointFactory::plain_only(PortConfig::default()));
        assert!(matches!(
            server.ensure_endpoint(TransportMode::Secure),
            Err(TransportError::SecureNotConfigured)
        ));
        assert!(server.endpoint(TransportMode::Secure).is_none());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Request routing
    // ─────────────────────────────────────────────────────────────────────

    fn request(method: Method, path: &str, payload: Option<&str>) -> Exchange {
        Exchange::new(Request::new(method, path, payload.map(str::to_string)))
    }

    #[test]
    fn post_to_leaf_acknowledges_and_dispatches() {
        let server = started_server();
        let pool = pool();
        let tenant = acme();
        let (tx, rx) = mpsc::channel();
        let tx = parking_lot::Mutex::new(tx);
        let listener: Arc<dyn EventListener> = Arc::new(FnListener(move |payload: &str| -> Result<(), ListenerError> {
            let _ = tx.lock().send((payload.to_string(), TenantFlow::current()));
            Ok(())
        }));
        server
            .registry()
            .register(&tenant, "sensorTemp", LeafResource::new("sensorTemp", tenant.id, TransportMode::Plain, listener, pool))
            .unwrap();

        let accepted = Arc::new(AtomicBool::new(false));
        let flag = accepted.clone();
        let exchange = Exchange::with_acceptor(
            Request::post("coap-endpoints/t/acme/sensorTemp", "21.5"),
            move || flag.store(true, Ordering::SeqCst),
        );
        let response = server.handle_request(TransportMode::Plain, exchange);

        assert_eq!(response.code, ResponseCode::Changed);
        assert_eq!(response.payload.as_deref(), Some("POST: 21.5"));
        assert!(accepted.load(Ordering::SeqCst));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            ("21.5".to_string(), Some(7))
        );
    }

    #[test]
    fn empty_post_is_acknowledged_but_not_dispatched() {
        let server = started_server();
        let pool = pool();
        let tenant = acme();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Arc<dyn EventListener> = Arc::new(FnListener(move |payload: &str| -> Result<(), ListenerError> {
            sink.lock().push(payload.to_string());
            Ok(())
        }));
        server
            .registry()
            .register(&tenant, "s", LeafResource::new("s", tenant.id, TransportMode::Plain, listener, pool.clone()))
            .unwrap();

        for payload in [None, Some("")] {
            let response = server.handle_request(
                TransportMode::Plain,
                request(Method::Post, "coap-endpoints/t/acme/s", payload),
            );
            assert_eq!(response.code, ResponseCode::Changed);
            assert!(response.payload.is_none());
        }

        // Whitespace is a payload like any other.
        let response = server.handle_request(
            TransportMode::Plain,
            request(Method::Post, "coap-endpoints/t/acme/s", Some("  ")),
        );
        assert_eq!(response.code, ResponseCode::Changed);
        assert_eq!(response.payload.as_deref(), Some("POST:   "));

        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert_eq!(*seen.lock(), vec!["  ".to_string()]);
    }

    #[test]
    fn routing_response_codes() {
        let server = started_server();
        let pool = pool();
        let tenant = Tenant::super_tenant();
        let registry = server.registry();
        registry.register(&tenant, "plain", leaf("plain", &tenant, TransportMode::Plain, &pool)).unwrap();
        registry.register(&tenant, "secure", leaf("secure", &tenant, TransportMode::Secure, &pool)).unwrap();

        let code = |mode, method, path: &str| {
            server.handle_request(mode, request(method, path, Some("x"))).code
        };

        assert_eq!(code(TransportMode::Plain, Method::Get, "coap-endpoints/plain"), ResponseCode::Content);
        assert_eq!(code(TransportMode::Plain, Method::Get, "coap-endpoints"), ResponseCode::Content);
        assert_eq!(code(TransportMode::Plain, Method::Post, "coap-endpoints"), ResponseCode::MethodNotAllowed);
        assert_eq!(code(TransportMode::Plain, Method::Put, "coap-endpoints/plain"), ResponseCode::MethodNotAllowed);
        assert_eq!(code(TransportMode::Plain, Method::Delete, "coap-endpoints/plain"), ResponseCode::MethodNotAllowed);
        assert_eq!(code(TransportMode::Plain, Method::Post, "coap-endpoints/nope"), ResponseCode::NotFound);
        assert_eq!(code(TransportMode::Plain, Method::Post, "coap-endpoints/secure"), ResponseCode::Unauthorized);
        assert_eq!(code(TransportMode::Secure, Method::Post, "coap-endpoints/secure"), ResponseCode::Changed);
        assert_eq!(code(TransportMode::Secure, Method::Post, "/coap-endpoints/plain/"), ResponseCode::Changed);
    }

    #[test]
    fn request_on_stopped_endpoint_is_unavailable() {
        let server = ResourceServer::with_factory(AnyEndpoint);
        server.ensure_endpoint(TransportMode::Plain).unwrap();

        let response = server.handle_request(
            TransportMode::Secure,
            request(Method::Get, "coap-endpoints", None),
        );
        assert_eq!(response.code, ResponseCode::ServiceUnavailable);
    }

    #[test]
    fn branch_get_returns_title() {
        let server = started_server();
        let pool = pool();
        let tenant = acme();
        server.registry().register(&tenant, "s", leaf("s", &tenant, TransportMode::Plain, &pool)).unwrap();

        let response = server.handle_request(
            TransportMode::Plain,
            request(Method::Get, "coap-endpoints/t/acme", None),
        );
        assert_eq!(response.code, ResponseCode::Content);
        assert_eq!(response.payload.as_deref(), Some("resource path: acme"));
    }
}
