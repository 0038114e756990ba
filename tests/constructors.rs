use lattice_di::{
    ContainerBuilder, DiError, MatchingSignature, NamedParameter, PositionalParameter,
    TypeShapeBuilder, TypedParameter,
};
use std::sync::Arc;

#[test]
fn test_autowired_constructor() {
    struct Logger;
    struct Service {
        logger: Arc<Logger>,
    }

    TypeShapeBuilder::<Service>::new()
        .constructor(|c| {
            c.service::<Logger>("logger").invoke(|args| {
                Ok(Service {
                    logger: args.service(0)?,
                })
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Logger);
    builder.register_type::<Service>();

    let container = builder.build().unwrap();
    let service = container.resolve::<Service>().unwrap();
    let logger = container.resolve::<Logger>().unwrap();
    assert!(Arc::ptr_eq(&service.logger, &logger));
}

#[test]
fn test_caller_service_parameter_beats_autowiring() {
    struct Logger(u8);
    struct Widget {
        logger: Arc<Logger>,
    }

    TypeShapeBuilder::<Widget>::new()
        .constructor(|c| {
            c.service::<Logger>("logger").invoke(|args| {
                Ok(Widget {
                    logger: args.service(0)?,
                })
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Logger(1));
    builder.register_type::<Widget>();
    let container = builder.build().unwrap();

    // Autowiring would succeed, but an explicit caller parameter for the
    // same slot wins.
    assert_eq!(container.resolve::<Widget>().unwrap().logger.0, 1);
    let overridden = container
        .resolve_with_parameters::<Widget>(vec![Arc::new(NamedParameter::new(
            "logger",
            Logger(2),
        ))])
        .unwrap();
    assert_eq!(overridden.logger.0, 2);
}

#[test]
fn test_value_parameter_falls_back_to_default() {
    struct Pool {
        size: u32,
    }

    TypeShapeBuilder::<Pool>::new()
        .constructor(|c| {
            c.value_with_default::<u32>("size", 8).invoke(|args| {
                Ok(Pool {
                    size: args.value(0)?,
                })
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_type::<Pool>();

    let container = builder.build().unwrap();
    assert_eq!(container.resolve::<Pool>().unwrap().size, 8);
}

#[test]
fn test_registration_parameter_beats_default() {
    struct Pool {
        size: u32,
    }

    TypeShapeBuilder::<Pool>::new()
        .constructor(|c| {
            c.value_with_default::<u32>("size", 8).invoke(|args| {
                Ok(Pool {
                    size: args.value(0)?,
                })
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder
        .register_type::<Pool>()
        .with_parameter(NamedParameter::new("size", 32u32));

    let container = builder.build().unwrap();
    assert_eq!(container.resolve::<Pool>().unwrap().size, 32);
}

#[test]
fn test_caller_parameter_beats_registration_parameter() {
    struct Pool {
        size: u32,
    }

    TypeShapeBuilder::<Pool>::new()
        .constructor(|c| {
            c.value::<u32>("size").invoke(|args| {
                Ok(Pool {
                    size: args.value(0)?,
                })
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder
        .register_type::<Pool>()
        .transient()
        .with_parameter(NamedParameter::new("size", 32u32));

    let container = builder.build().unwrap();
    assert_eq!(container.resolve::<Pool>().unwrap().size, 32);

    let sized = container
        .resolve_with_parameters::<Pool>(vec![Arc::new(NamedParameter::new("size", 64u32))])
        .unwrap();
    assert_eq!(sized.size, 64);
}

#[test]
fn test_typed_and_positional_parameters() {
    struct Endpoint {
        host: String,
        port: u16,
    }

    TypeShapeBuilder::<Endpoint>::new()
        .constructor(|c| {
            c.value::<String>("host").value::<u16>("port").invoke(|args| {
                Ok(Endpoint {
                    host: args.value(0)?,
                    port: args.value(1)?,
                })
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder
        .register_type::<Endpoint>()
        .with_parameter(TypedParameter::new("example.org".to_string()))
        .with_parameter(PositionalParameter::new(1, 443u16));

    let container = builder.build().unwrap();
    let endpoint = container.resolve::<Endpoint>().unwrap();
    assert_eq!(endpoint.host, "example.org");
    assert_eq!(endpoint.port, 443);
}

#[test]
fn test_most_parameters_selection() {
    struct Metrics;
    struct Reporter {
        detailed: bool,
    }

    TypeShapeBuilder::<Reporter>::new()
        .constructor(|c| c.invoke(|_| Ok(Reporter { detailed: false })))
        .constructor(|c| {
            c.service::<Metrics>("metrics").invoke(|args| {
                let _metrics = args.service::<Metrics>(0)?;
                Ok(Reporter { detailed: true })
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Metrics);
    builder.register_type::<Reporter>();

    let container = builder.build().unwrap();
    assert!(container.resolve::<Reporter>().unwrap().detailed);
}

#[test]
fn test_most_parameters_falls_back_when_dependency_missing() {
    struct Metrics;
    struct Reporter {
        detailed: bool,
    }

    TypeShapeBuilder::<Reporter>::new()
        .constructor(|c| c.invoke(|_| Ok(Reporter { detailed: false })))
        .constructor(|c| {
            c.service::<Metrics>("metrics").invoke(|args| {
                let _metrics = args.service::<Metrics>(0)?;
                Ok(Reporter { detailed: true })
            })
        })
        .intern();

    // Metrics is not registered, so only the zero-parameter candidate binds.
    let mut builder = ContainerBuilder::new();
    builder.register_type::<Reporter>();

    let container = builder.build().unwrap();
    assert!(!container.resolve::<Reporter>().unwrap().detailed);
}

#[test]
fn test_arity_tie_is_ambiguous() {
    struct Left;
    struct Right;
    #[derive(Debug)]
    struct Torn(&'static str);

    TypeShapeBuilder::<Torn>::new()
        .constructor(|c| {
            c.service::<Left>("left").invoke(|args| {
                let _left = args.service::<Left>(0)?;
                Ok(Torn("left"))
            })
        })
        .constructor(|c| {
            c.service::<Right>("right").invoke(|args| {
                let _right = args.service::<Right>(0)?;
                Ok(Torn("right"))
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Left);
    builder.register_instance(Right);
    builder.register_type::<Torn>();

    let container = builder.build().unwrap();
    let err = container.resolve::<Torn>().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        DiError::AmbiguousConstructor { arity: 1, .. }
    ));
}

#[test]
fn test_matching_signature_breaks_the_tie() {
    struct Left;
    struct Right;
    struct Torn(&'static str);

    TypeShapeBuilder::<Torn>::new()
        .constructor(|c| {
            c.service::<Left>("left").invoke(|args| {
                let _left = args.service::<Left>(0)?;
                Ok(Torn("left"))
            })
        })
        .constructor(|c| {
            c.service::<Right>("right").invoke(|args| {
                let _right = args.service::<Right>(0)?;
                Ok(Torn("right"))
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Left);
    builder.register_instance(Right);
    builder
        .register_type::<Torn>()
        .with_selector(MatchingSignature::new().param::<Right>());

    let container = builder.build().unwrap();
    assert_eq!(container.resolve::<Torn>().unwrap().0, "right");
}

#[test]
fn test_no_shape_reports_no_constructors() {
    #[derive(Debug)]
    struct Shapeless;

    let mut builder = ContainerBuilder::new();
    builder.register_type::<Shapeless>();

    let container = builder.build().unwrap();
    let err = container.resolve::<Shapeless>().unwrap_err();
    assert!(matches!(err.root_cause(), DiError::NoConstructors { .. }));
}

#[test]
fn test_unbindable_constructor_explains_itself() {
    #[derive(Debug)]
    struct Unfillable {
        _name: String,
    }

    TypeShapeBuilder::<Unfillable>::new()
        .constructor(|c| {
            c.value::<String>("name").invoke(|args| {
                Ok(Unfillable {
                    _name: args.value(0)?,
                })
            })
        })
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_type::<Unfillable>();

    let container = builder.build().unwrap();
    let err = container.resolve::<Unfillable>().unwrap_err();
    match err.root_cause() {
        DiError::NoBindableConstructor { reasons, .. } => {
            assert_eq!(reasons.len(), 1);
            assert!(reasons[0].contains("name"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_opaque_parameter_is_never_bindable() {
    struct Raw;
    #[derive(Debug)]
    struct Wrapper;

    TypeShapeBuilder::<Wrapper>::new()
        .constructor(|c| c.opaque::<*const Raw>("raw").invoke(|_| Ok(Wrapper)))
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_type::<Wrapper>();

    let container = builder.build().unwrap();
    let err = container.resolve::<Wrapper>().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        DiError::NoBindableConstructor { .. }
    ));
}

#[test]
fn test_optional_property_autowired_when_registered() {
    struct Tracer;
    #[derive(Default)]
    struct Job {
        tracer: Option<Arc<Tracer>>,
    }

    TypeShapeBuilder::<Job>::new()
        .constructor(|c| c.invoke(|_| Ok(Job::default())))
        .property::<Tracer, _>("tracer", |job, tracer| job.tracer = Some(tracer))
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Tracer);
    builder.register_type::<Job>();

    let container = builder.build().unwrap();
    assert!(container.resolve::<Job>().unwrap().tracer.is_some());
}

#[test]
fn test_optional_property_skipped_when_unregistered() {
    struct Tracer;
    #[derive(Default)]
    struct Job {
        tracer: Option<Arc<Tracer>>,
    }

    TypeShapeBuilder::<Job>::new()
        .constructor(|c| c.invoke(|_| Ok(Job::default())))
        .property::<Tracer, _>("tracer", |job, tracer| job.tracer = Some(tracer))
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_type::<Job>();

    let container = builder.build().unwrap();
    assert!(container.resolve::<Job>().unwrap().tracer.is_none());
}

#[test]
fn test_required_property_fails_when_unregistered() {
    #[derive(Debug)]
    struct Store;
    #[derive(Debug, Default)]
    struct Repo {
        store: Option<Arc<Store>>,
    }

    TypeShapeBuilder::<Repo>::new()
        .constructor(|c| c.invoke(|_| Ok(Repo::default())))
        .required_property::<Store, _>("store", |repo, store| repo.store = Some(store))
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_type::<Repo>();

    let container = builder.build().unwrap();
    let err = container.resolve::<Repo>().unwrap_err();
    assert!(matches!(
        err.root_cause(),
        DiError::ActivationFailed { .. }
    ));
}

#[test]
fn test_probed_property_is_not_overwritten_by_default() {
    struct Clock(&'static str);
    struct Scheduler {
        clock: Arc<Clock>,
    }

    TypeShapeBuilder::<Scheduler>::new()
        .constructor(|c| {
            c.invoke(|_| {
                Ok(Scheduler {
                    clock: Arc::new(Clock("built-in")),
                })
            })
        })
        .property_with_probe::<Clock, _, _>(
            "clock",
            |s, clock| s.clock = clock,
            |_| true,
        )
        .intern();

    let mut builder = ContainerBuilder::new();
    builder.register_instance(Clock("injected"));
    builder.register_type::<Scheduler>().transient();

    let container = builder.build().unwrap();
    assert_eq!(container.resolve::<Scheduler>().unwrap().clock.0, "built-in");

    // Opting in flips the policy for the same shape.
    let mut builder = ContainerBuilder::new();
    builder.register_instance(Clock("injected"));
    builder
        .register_type::<Scheduler>()
        .transient()
        .overwrite_set_properties();

    let container = builder.build().unwrap();
    assert_eq!(container.resolve::<Scheduler>().unwrap().clock.0, "injected");
}

#[test]
fn test_value_property_filled_by_named_parameter() {
    #[derive(Default)]
    struct Banner {
        motto: String,
    }

    TypeShapeBuilder::<Banner>::new()
        .constructor(|c| c.invoke(|_| Ok(Banner::default())))
        .value_property::<String, _>("motto", |banner, motto| banner.motto = motto)
        .intern();

    let mut builder = ContainerBuilder::new();
    builder
        .register_type::<Banner>()
        .with_parameter(NamedParameter::new("motto", "onwards".to_string()));

    let container = builder.build().unwrap();
    assert_eq!(container.resolve::<Banner>().unwrap().motto, "onwards");
}
