use lattice_di::{
    ContainerBuilder, DiResult, NamedParameter, Next, Parameter, PipelinePhase, ResolveMiddleware,
    ResolveRequestContext, ResolveTracer, TypeShapeBuilder,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl ResolveMiddleware for Recorder {
    fn name(&self) -> &'static str {
        self.label
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        self.log.lock().unwrap().push(format!("enter:{}", self.label));
        let result = next.proceed(ctx);
        self.log.lock().unwrap().push(format!("exit:{}", self.label));
        result
    }
}

#[test]
fn test_phases_run_in_declared_order() {
    struct Target;

    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder = |label| {
        Arc::new(Recorder {
            label,
            log: log.clone(),
        })
    };

    let mut builder = ContainerBuilder::new();
    builder
        .register_transient_factory::<Target, _>(|_| Ok(Target))
        .with_middleware(PipelinePhase::Activation, recorder("activation"))
        .with_middleware(PipelinePhase::RequestStart, recorder("request-start"))
        .with_middleware(PipelinePhase::Decoration, recorder("decoration"))
        .with_middleware(PipelinePhase::ScopeSelection, recorder("scope-selection"));

    let container = builder.build().unwrap();
    container.resolve::<Target>().unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "enter:request-start",
            "enter:scope-selection",
            "enter:decoration",
            "enter:activation",
            "exit:activation",
            "exit:decoration",
            "exit:scope-selection",
            "exit:request-start",
        ]
    );
}

#[test]
fn test_container_middleware_runs_before_registration_middleware() {
    struct Target;

    let log = Arc::new(Mutex::new(Vec::new()));

    let mut builder = ContainerBuilder::new();
    builder.add_middleware(
        PipelinePhase::RequestStart,
        Arc::new(Recorder {
            label: "global",
            log: log.clone(),
        }),
    );
    builder
        .register_transient_factory::<Target, _>(|_| Ok(Target))
        .with_middleware(
            PipelinePhase::RequestStart,
            Arc::new(Recorder {
                label: "local",
                log: log.clone(),
            }),
        );

    let container = builder.build().unwrap();
    container.resolve::<Target>().unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["enter:global", "enter:local", "exit:local", "exit:global"]
    );
}

#[test]
fn test_short_circuit_skips_activation_and_sharing() {
    struct Interceptor;

    impl ResolveMiddleware for Interceptor {
        fn name(&self) -> &'static str {
            "interceptor"
        }

        fn execute(&self, ctx: &mut ResolveRequestContext<'_>, _next: Next<'_>) -> DiResult<()> {
            ctx.set_instance(Arc::new("intercepted".to_string()));
            Ok(())
        }
    }

    let activations = Arc::new(AtomicUsize::new(0));
    let activations_clone = activations.clone();

    let mut builder = ContainerBuilder::new();
    builder
        .register_singleton_factory::<String, _>(move |_| {
            activations_clone.fetch_add(1, Ordering::SeqCst);
            Ok("real".to_string())
        })
        .with_middleware(PipelinePhase::RequestStart, Arc::new(Interceptor));

    let container = builder.build().unwrap();
    let first = container.resolve::<String>().unwrap();
    let second = container.resolve::<String>().unwrap();

    assert_eq!(*first, "intercepted");
    assert_eq!(*second, "intercepted");
    // Sharing sits downstream of the short-circuit, so nothing was cached
    // and the factory never ran.
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(activations.load(Ordering::SeqCst), 0);
}

#[test]
fn test_decorators_wrap_in_registration_order() {
    struct Message(String);

    let mut builder = ContainerBuilder::new();
    builder.register_transient_factory::<Message, _>(|_| Ok(Message("base".to_string())));
    builder.register_decorator::<Message, _>(|inner, _| Ok(Message(format!("{}+first", inner.0))));
    builder.register_decorator::<Message, _>(|inner, _| Ok(Message(format!("{}+second", inner.0))));

    let container = builder.build().unwrap();
    assert_eq!(container.resolve::<Message>().unwrap().0, "base+first+second");
}

#[test]
fn test_decorator_runs_once_for_shared_instances() {
    struct Message(String);

    let decorations = Arc::new(AtomicUsize::new(0));
    let decorations_clone = decorations.clone();

    let mut builder = ContainerBuilder::new();
    builder.register_singleton_factory::<Message, _>(|_| Ok(Message("base".to_string())));
    builder.register_decorator::<Message, _>(move |inner, _| {
        decorations_clone.fetch_add(1, Ordering::SeqCst);
        Ok(Message(format!("{}+wrapped", inner.0)))
    });

    let container = builder.build().unwrap();
    let a = container.resolve::<Message>().unwrap();
    let b = container.resolve::<Message>().unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.0, "base+wrapped");
    assert_eq!(decorations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_decorator_can_resolve_collaborators() {
    struct Prefix(&'static str);
    struct Message(String);

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Prefix(">> "));
    builder.register_transient_factory::<Message, _>(|_| Ok(Message("hello".to_string())));
    builder.register_decorator::<Message, _>(|inner, ctx| {
        let prefix = ctx.resolve::<Prefix>()?;
        Ok(Message(format!("{}{}", prefix.0, inner.0)))
    });

    let container = builder.build().unwrap();
    assert_eq!(container.resolve::<Message>().unwrap().0, ">> hello");
}

#[test]
fn test_child_scope_decorators_do_not_leak_to_parent() {
    struct Message(String);

    let mut builder = ContainerBuilder::new();
    builder.register_transient_factory::<Message, _>(|_| Ok(Message("plain".to_string())));

    let container = builder.build().unwrap();
    let child = container
        .begin_scope_with(|b| {
            b.register_decorator::<Message, _>(|inner, _| Ok(Message(format!("[{}]", inner.0))));
        })
        .unwrap();

    assert_eq!(child.resolve::<Message>().unwrap().0, "[plain]");
    assert_eq!(container.resolve::<Message>().unwrap().0, "plain");
}

#[test]
fn test_activating_fires_inline_activated_fires_after_the_graph() {
    struct Leaf;
    struct Root;

    let log = Arc::new(Mutex::new(Vec::new()));

    let mut builder = ContainerBuilder::new();
    let leaf_activating = log.clone();
    let leaf_activated = log.clone();
    builder
        .register_transient_factory::<Leaf, _>(|_| Ok(Leaf))
        .on_activating(move |_| leaf_activating.lock().unwrap().push("activating:leaf"))
        .on_activated(move |_| leaf_activated.lock().unwrap().push("activated:leaf"));
    let root_activating = log.clone();
    let root_activated = log.clone();
    builder
        .register_transient_factory::<Root, _>(|ctx| {
            ctx.resolve::<Leaf>()?;
            Ok(Root)
        })
        .on_activating(move |_| root_activating.lock().unwrap().push("activating:root"))
        .on_activated(move |_| root_activated.lock().unwrap().push("activated:root"));

    let container = builder.build().unwrap();
    container.resolve::<Root>().unwrap();

    // Activating runs as each instance is built; activated is deferred to
    // the end of the operation and fires child-before-parent.
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "activating:leaf",
            "activating:root",
            "activated:leaf",
            "activated:root",
        ]
    );
}

#[test]
fn test_activated_handlers_dropped_when_the_operation_fails() {
    struct Leaf;
    struct Root;

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();

    let mut builder = ContainerBuilder::new();
    builder
        .register_transient_factory::<Leaf, _>(|_| Ok(Leaf))
        .on_activated(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
    builder.register_transient_factory::<Root, _>(|ctx| {
        // The leaf activates fine; the operation then fails.
        ctx.resolve::<Leaf>()?;
        ctx.resolve::<u8>()?;
        Ok(Root)
    });

    let container = builder.build().unwrap();
    assert!(container.resolve::<Root>().is_err());
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    // A successful operation still delivers the event.
    container.resolve::<Leaf>().unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_preparing_can_override_parameters() {
    struct Pool {
        size: u32,
    }

    TypeShapeBuilder::<Pool>::new()
        .constructor(|c| {
            c.value_with_default::<u32>("size", 1).invoke(|args| {
                Ok(Pool {
                    size: args.value(0)?,
                })
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder
        .register_type::<Pool>()
        .on_preparing(|parameters: &mut Vec<Arc<dyn Parameter>>| {
            parameters.insert(0, Arc::new(NamedParameter::new("size", 99u32)));
        });

    let container = builder.build().unwrap();
    assert_eq!(container.resolve::<Pool>().unwrap().size, 99);
}

#[test]
fn test_tracer_observes_operations_and_requests() {
    #[derive(Default)]
    struct Counting {
        operations: AtomicUsize,
        requests: AtomicUsize,
        stages: AtomicUsize,
    }

    impl ResolveTracer for Counting {
        fn operation_start(&self, _root: &'static str) {
            self.operations.fetch_add(1, Ordering::SeqCst);
        }

        fn request_start(&self, _service: &'static str, _depth: usize) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }

        fn middleware_enter(&self, _service: &'static str, _stage: &'static str) {
            self.stages.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Dep;
    struct App;

    let tracer = Arc::new(Counting::default());

    let mut builder = ContainerBuilder::new();
    builder.add_tracer(tracer.clone());
    builder.register_transient_factory::<Dep, _>(|_| Ok(Dep));
    builder.register_transient_factory::<App, _>(|ctx| {
        ctx.resolve::<Dep>()?;
        Ok(App)
    });

    let container = builder.build().unwrap();
    container.resolve::<App>().unwrap();

    // One top-level operation, one request per activated component.
    assert_eq!(tracer.operations.load(Ordering::SeqCst), 1);
    assert_eq!(tracer.requests.load(Ordering::SeqCst), 2);
    assert!(tracer.stages.load(Ordering::SeqCst) >= 2);
}

#[test]
fn test_logging_tracer_is_advisory_only() {
    use lattice_di::LoggingTracer;

    struct Session;

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut builder = ContainerBuilder::new();
    builder.add_tracer(Arc::new(LoggingTracer));
    builder.register_scoped_factory::<Session, _>(|_| Ok(Session));

    // Tracing changes nothing about resolution semantics.
    let container = builder.build().unwrap();
    let scope = container.begin_scope().unwrap();
    let a = scope.resolve::<Session>().unwrap();
    let b = scope.resolve::<Session>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_middleware_can_replace_the_instance_after_activation() {
    struct Doubler;

    impl ResolveMiddleware for Doubler {
        fn name(&self) -> &'static str {
            "doubler"
        }

        fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
            next.proceed(ctx)?;
            if let Some(value) = ctx.take_instance() {
                if let Ok(n) = value.downcast::<u32>() {
                    ctx.set_instance(Arc::new(*n * 2));
                }
            }
            Ok(())
        }
    }

    let mut builder = ContainerBuilder::new();
    builder
        .register_transient_factory::<u32, _>(|_| Ok(21))
        .with_middleware(PipelinePhase::Activation, Arc::new(Doubler));

    let container = builder.build().unwrap();
    assert_eq!(*container.resolve::<u32>().unwrap(), 42);
}
