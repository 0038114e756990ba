//! Container builder: the registration surface.

use std::any::TypeId;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::OnceCell;

use crate::activator::{Activator, DelegateActivator, ProvidedInstanceActivator, ReflectionActivator};
use crate::diagnostics::{ResolveTracer, Tracers};
use crate::dispose::Dispose;
use crate::error::DiResult;
use crate::key::ServiceKey;
use crate::lifetime::{Lifetime, Ownership, Sharing};
use crate::operation::{downcast_service, ResolveRequestContext};
use crate::parameters::Parameter;
use crate::pipeline::{self, PipelinePhase, ResolveMiddleware};
use crate::registration::{
    ActivatedHandler, ActivatingHandler, ComponentRegistration, DisposeHook, PreparingHandler,
    RegistrationId,
};
use crate::registry::{ComponentRegistry, DecoratorFn};
use crate::scope::{LifetimeScope, ScopeOptions};
use crate::selector::ConstructorSelector;
use crate::AnyArc;

const DEFAULT_MAX_DEPTH: usize = 50;

enum ActivatorSpec {
    Provided(Arc<dyn Activator>),
    Reflection {
        type_id: TypeId,
        type_name: &'static str,
    },
}

struct RegistrationEntry {
    services: Vec<ServiceKey>,
    spec: ActivatorSpec,
    lifetime: Lifetime,
    sharing: Sharing,
    ownership: Ownership,
    parameters: Vec<Arc<dyn Parameter>>,
    metadata: AHashMap<&'static str, AnyArc>,
    preparing: Vec<PreparingHandler>,
    activating: Vec<ActivatingHandler>,
    activated: Vec<ActivatedHandler>,
    dispose_hook: Option<DisposeHook>,
    user_middleware: Vec<(PipelinePhase, Arc<dyn ResolveMiddleware>)>,
    startable: bool,
    selector: Option<Arc<dyn ConstructorSelector>>,
    overwrite_properties: bool,
}

impl RegistrationEntry {
    fn new(
        services: Vec<ServiceKey>,
        spec: ActivatorSpec,
        lifetime: Lifetime,
        sharing: Sharing,
        ownership: Ownership,
    ) -> Self {
        Self {
            services,
            spec,
            lifetime,
            sharing,
            ownership,
            parameters: Vec::new(),
            metadata: AHashMap::new(),
            preparing: Vec::new(),
            activating: Vec::new(),
            activated: Vec::new(),
            dispose_hook: None,
            user_middleware: Vec::new(),
            startable: false,
            selector: None,
            overwrite_properties: false,
        }
    }

    fn seal(self, global: &[(PipelinePhase, Arc<dyn ResolveMiddleware>)]) -> Arc<ComponentRegistration> {
        let activator: Arc<dyn Activator> = match self.spec {
            ActivatorSpec::Provided(activator) => activator,
            ActivatorSpec::Reflection { type_id, type_name } => {
                let mut activator = ReflectionActivator::from_raw(type_id, type_name);
                if let Some(selector) = self.selector {
                    activator = activator.with_selector(selector);
                }
                if self.overwrite_properties {
                    activator = activator.overwrite_set_properties();
                }
                Arc::new(activator)
            }
        };
        let registration = ComponentRegistration {
            id: RegistrationId::next(),
            services: self.services,
            activator,
            lifetime: self.lifetime,
            sharing: self.sharing,
            ownership: self.ownership,
            parameters: self.parameters,
            metadata: self.metadata,
            preparing: self.preparing,
            activating: self.activating,
            activated: self.activated,
            dispose_hook: self.dispose_hook,
            user_middleware: self.user_middleware,
            startable: self.startable,
            pipeline: OnceCell::new(),
        };
        let pipeline = pipeline::assemble(&registration, global);
        // A freshly built registration always has an empty cell.
        let _ = registration.pipeline.set(pipeline);
        Arc::new(registration)
    }
}

/// Collects registrations and container options, then builds a [`Container`].
///
/// # Examples
///
/// ```rust
/// use lattice_di::ContainerBuilder;
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// struct Client { url: String }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(Config { url: "localhost".into() });
/// builder.register_singleton_factory::<Client, _>(|ctx| {
///     let config = ctx.resolve::<Config>()?;
///     Ok(Client { url: config.url.clone() })
/// });
/// let container = builder.build().unwrap();
///
/// let a = container.resolve::<Client>().unwrap();
/// let b = container.resolve::<Client>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(a.url, "localhost");
/// ```
pub struct ContainerBuilder {
    entries: Vec<RegistrationEntry>,
    decorators: Vec<(ServiceKey, DecoratorFn)>,
    tracers: Vec<Arc<dyn ResolveTracer>>,
    middleware: Vec<(PipelinePhase, Arc<dyn ResolveMiddleware>)>,
    max_depth: usize,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            decorators: Vec::new(),
            tracers: Vec::new(),
            middleware: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    fn push_entry<T>(&mut self, entry: RegistrationEntry) -> ComponentBuilder<'_, T> {
        self.entries.push(entry);
        let index = self.entries.len() - 1;
        ComponentBuilder {
            entries: &mut self.entries,
            index,
            _marker: PhantomData,
        }
    }

    /// Registers `T` for reflection activation from its interned
    /// [`TypeShape`](crate::TypeShape). Defaults: per-resolution instances
    /// in the current scope, owned by it.
    pub fn register_type<T: Send + Sync + 'static>(&mut self) -> ComponentBuilder<'_, T> {
        self.push_entry(RegistrationEntry::new(
            vec![ServiceKey::of::<T>()],
            ActivatorSpec::Reflection {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
            },
            Lifetime::CurrentScope,
            Sharing::NotShared,
            Ownership::OwnedByScope,
        ))
    }

    /// Registers a factory for `T`. Defaults match
    /// [`register_type`](Self::register_type).
    pub fn register_factory<T, F>(&mut self, factory: F) -> ComponentBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: for<'op> Fn(&mut ResolveRequestContext<'op>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.push_entry(RegistrationEntry::new(
            vec![ServiceKey::of::<T>()],
            ActivatorSpec::Provided(Arc::new(DelegateActivator::new(factory))),
            Lifetime::CurrentScope,
            Sharing::NotShared,
            Ownership::OwnedByScope,
        ))
    }

    /// Registers a pre-built instance, shared container-wide and externally
    /// owned.
    pub fn register_instance<T: Send + Sync + 'static>(&mut self, value: T) -> ComponentBuilder<'_, T> {
        self.push_entry(RegistrationEntry::new(
            vec![ServiceKey::of::<T>()],
            ActivatorSpec::Provided(Arc::new(ProvidedInstanceActivator::new(value))),
            Lifetime::Root,
            Sharing::Shared,
            Ownership::External,
        ))
    }

    /// Registers a pre-built instance under a key.
    pub fn register_keyed_instance<T: Send + Sync + 'static>(
        &mut self,
        key: &'static str,
        value: T,
    ) -> ComponentBuilder<'_, T> {
        self.push_entry(RegistrationEntry::new(
            vec![ServiceKey::keyed::<T>(key)],
            ActivatorSpec::Provided(Arc::new(ProvidedInstanceActivator::new(value))),
            Lifetime::Root,
            Sharing::Shared,
            Ownership::External,
        ))
    }

    /// Factory registration cached once in the root scope.
    pub fn register_singleton_factory<T, F>(&mut self, factory: F) -> ComponentBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: for<'op> Fn(&mut ResolveRequestContext<'op>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_factory(factory).lifetime(Lifetime::Root).sharing(Sharing::Shared)
    }

    /// Factory registration cached once per scope.
    pub fn register_scoped_factory<T, F>(&mut self, factory: F) -> ComponentBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: for<'op> Fn(&mut ResolveRequestContext<'op>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_factory(factory).sharing(Sharing::Shared)
    }

    /// Factory registration activated fresh on every resolution.
    pub fn register_transient_factory<T, F>(&mut self, factory: F) -> ComponentBuilder<'_, T>
    where
        T: Send + Sync + 'static,
        F: for<'op> Fn(&mut ResolveRequestContext<'op>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_factory(factory)
    }

    /// Registers a decorator for `T`. Decorators wrap freshly activated
    /// instances in registration order (later registrations wrap earlier
    /// ones) before sharing publishes them.
    pub fn register_decorator<T, F>(&mut self, decorate: F)
    where
        T: Send + Sync + 'static,
        F: for<'op> Fn(Arc<T>, &mut ResolveRequestContext<'op>) -> DiResult<T>
            + Send
            + Sync
            + 'static,
    {
        let erased: DecoratorFn = Arc::new(move |value, ctx| {
            let inner = downcast_service::<T>(value)?;
            decorate(inner, ctx).map(|t| Arc::new(t) as AnyArc)
        });
        self.decorators.push((ServiceKey::of::<T>(), erased));
    }

    /// Installs a resolve tracer.
    pub fn add_tracer(&mut self, tracer: Arc<dyn ResolveTracer>) {
        self.tracers.push(tracer);
    }

    /// Installs container-wide middleware at `phase`, running before any
    /// per-registration middleware of the same phase.
    pub fn add_middleware(&mut self, phase: PipelinePhase, middleware: Arc<dyn ResolveMiddleware>) {
        self.middleware.push((phase, middleware));
    }

    /// Overrides the request-stack depth limit (default 50).
    pub fn max_resolve_depth(&mut self, limit: usize) {
        self.max_depth = limit;
    }

    /// Builds the container, assembling every registration's pipeline and
    /// activating auto-start components. Fails if an auto-start component
    /// cannot be resolved.
    pub fn build(mut self) -> DiResult<Container> {
        let options = Arc::new(ScopeOptions {
            max_depth: self.max_depth,
            tracers: Tracers::new(std::mem::take(&mut self.tracers)),
            global_middleware: std::mem::take(&mut self.middleware),
        });
        let (registrations, decorators) = self.into_scope_parts(&options.global_middleware);
        let registry = Arc::new(ComponentRegistry::new(None, registrations, decorators));
        let root = LifetimeScope::new_root(registry, options)?;
        Ok(Container { root })
    }

    /// Seals entries into registrations, used by `build` and by child
    /// scopes layering extra registrations.
    pub(crate) fn into_scope_parts(
        self,
        global: &[(PipelinePhase, Arc<dyn ResolveMiddleware>)],
    ) -> (
        Vec<Arc<ComponentRegistration>>,
        AHashMap<ServiceKey, Vec<DecoratorFn>>,
    ) {
        let registrations = self.entries.into_iter().map(|e| e.seal(global)).collect();
        let mut decorators: AHashMap<ServiceKey, Vec<DecoratorFn>> = AHashMap::new();
        for (key, decorator) in self.decorators {
            decorators.entry(key).or_default().push(decorator);
        }
        (registrations, decorators)
    }
}

/// Fluent configuration handle for one registration.
pub struct ComponentBuilder<'b, T> {
    entries: &'b mut Vec<RegistrationEntry>,
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<'b, T: Send + Sync + 'static> ComponentBuilder<'b, T> {
    fn entry(&mut self) -> &mut RegistrationEntry {
        &mut self.entries[self.index]
    }

    /// Sets which scope hosts instances.
    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.entry().lifetime = lifetime;
        self
    }

    /// Sets whether the hosting scope caches instances.
    pub fn sharing(mut self, sharing: Sharing) -> Self {
        self.entry().sharing = sharing;
        self
    }

    /// Sets who owns instance teardown.
    pub fn ownership(mut self, ownership: Ownership) -> Self {
        self.entry().ownership = ownership;
        self
    }

    /// Root-hosted, cached: the classic singleton.
    pub fn singleton(self) -> Self {
        self.lifetime(Lifetime::Root).sharing(Sharing::Shared)
    }

    /// Current-scope-hosted, cached per scope.
    pub fn scoped(self) -> Self {
        self.lifetime(Lifetime::CurrentScope).sharing(Sharing::Shared)
    }

    /// Fresh instance per resolution.
    pub fn transient(self) -> Self {
        self.lifetime(Lifetime::CurrentScope).sharing(Sharing::NotShared)
    }

    /// Additionally exposes the component under a keyed service.
    pub fn keyed(mut self, key: &'static str) -> Self {
        let service = ServiceKey::keyed::<T>(key);
        self.entry().services.push(service);
        self
    }

    /// Adds a registration-configured parameter, consulted after caller
    /// parameters and before autowiring.
    pub fn with_parameter(mut self, parameter: impl Parameter + 'static) -> Self {
        self.entry().parameters.push(Arc::new(parameter));
        self
    }

    /// Attaches typed metadata to the registration.
    pub fn with_metadata<M: Send + Sync + 'static>(mut self, key: &'static str, value: M) -> Self {
        self.entry().metadata.insert(key, Arc::new(value));
        self
    }

    /// Replaces the default most-parameters constructor selection policy.
    pub fn with_selector(mut self, selector: impl ConstructorSelector + 'static) -> Self {
        self.entry().selector = Some(Arc::new(selector));
        self
    }

    /// Makes property injection overwrite values the shape's probes report
    /// as already set.
    pub fn overwrite_set_properties(mut self) -> Self {
        self.entry().overwrite_properties = true;
        self
    }

    /// Runs before binding on every resolution of this component; may mutate
    /// the request's parameter set.
    pub fn on_preparing<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Vec<Arc<dyn Parameter>>) + Send + Sync + 'static,
    {
        self.entry().preparing.push(Arc::new(handler));
        self
    }

    /// Observes each freshly activated instance before sharing publishes it.
    pub fn on_activating<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        self.entry().activating.push(Arc::new(move |any: &AnyArc| {
            if let Ok(typed) = any.clone().downcast::<T>() {
                handler(&typed);
            }
        }));
        self
    }

    /// Observes each completed instance; deferred until the whole dependency
    /// graph of the triggering resolution has been built, firing
    /// child-before-parent. Never fires for an operation that fails.
    pub fn on_activated<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        self.entry().activated.push(Arc::new(move |any: &AnyArc| {
            if let Ok(typed) = any.clone().downcast::<T>() {
                handler(&typed);
            }
        }));
        self
    }

    /// Custom teardown run by the hosting scope at disposal.
    pub fn on_dispose<F>(mut self, teardown: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.entry().dispose_hook = Some(Arc::new(move |any: &AnyArc| {
            if let Some(typed) = any.downcast_ref::<T>() {
                teardown(typed);
            }
        }));
        self
    }

    /// Per-registration pipeline middleware at `phase`.
    pub fn with_middleware(
        mut self,
        phase: PipelinePhase,
        middleware: Arc<dyn ResolveMiddleware>,
    ) -> Self {
        self.entry().user_middleware.push((phase, middleware));
        self
    }

    /// Resolves the component automatically when its defining scope is
    /// built.
    pub fn auto_start(mut self) -> Self {
        self.entry().startable = true;
        self
    }

    /// Marks instances externally owned: the scope never runs their
    /// teardown.
    pub fn externally_owned(self) -> Self {
        self.ownership(Ownership::External)
    }
}

impl<'b, T: Dispose> ComponentBuilder<'b, T> {
    /// Uses [`Dispose`] as the scope-owned teardown.
    pub fn disposable(self) -> Self {
        self.on_dispose(|t| t.dispose())
    }
}

/// The built container: a facade over the root [`LifetimeScope`].
///
/// Dereferences to the root scope, so every scope operation (resolve,
/// begin_scope, dispose) is available directly.
pub struct Container {
    root: LifetimeScope,
}

impl Container {
    /// The root scope.
    pub fn root_scope(&self) -> &LifetimeScope {
        &self.root
    }
}

impl Deref for Container {
    type Target = LifetimeScope;

    fn deref(&self) -> &LifetimeScope {
        &self.root
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("root", &self.root).finish()
    }
}
