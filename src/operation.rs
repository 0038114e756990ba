//! Resolve operations: per-call state for one dependency graph walk.

use std::sync::Arc;

use crate::diagnostics::Tracers;
use crate::dispose::Dispose;
use crate::error::{DiError, DiResult};
use crate::internal::SegmentedStack;
use crate::key::ServiceKey;
use crate::parameters::Parameter;
use crate::pipeline::Next;
use crate::registration::{ActivatedHandler, ComponentRegistration};
use crate::scope::LifetimeScope;
use crate::AnyArc;

pub(crate) fn downcast_service<T: Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| DiError::TypeMismatch {
        expected: std::any::type_name::<T>(),
    })
}

/// Tracks one top-level resolve call: the segmented request stack for cycle
/// and depth detection, and the completion queue fired once the outermost
/// request unwinds. Operations live on the calling stack and are never
/// shared across threads.
pub struct ResolveOperation {
    pub(crate) stack: SegmentedStack,
    pub(crate) max_depth: usize,
    pub(crate) tracers: Tracers,
    completions: Vec<(Vec<ActivatedHandler>, AnyArc)>,
    root_service: &'static str,
    started: bool,
    ended: bool,
}

impl ResolveOperation {
    pub(crate) fn new(max_depth: usize, tracers: Tracers, root_service: &'static str) -> Self {
        Self {
            stack: SegmentedStack::default(),
            max_depth,
            tracers,
            completions: Vec::new(),
            root_service,
            started: false,
            ended: false,
        }
    }

    pub(crate) fn start(&mut self) {
        if !self.started {
            self.started = true;
            if !self.tracers.is_empty() {
                self.tracers.operation_start(self.root_service);
            }
        }
    }

    /// Signals the end of the operation. Safe to call more than once; only
    /// the first call notifies tracers.
    pub(crate) fn end(&mut self, success: bool) {
        if !self.ended {
            self.ended = true;
            if !self.tracers.is_empty() {
                self.tracers.operation_end(self.root_service, success);
            }
        }
    }

    pub(crate) fn queue_completion(&mut self, handlers: Vec<ActivatedHandler>, instance: AnyArc) {
        self.completions.push((handlers, instance));
    }

    /// Runs one request through the registration's pipeline. Cycle and depth
    /// guarding, instance production checks, and completion firing all
    /// happen here or in the built-in stages.
    pub(crate) fn execute_request(
        &mut self,
        scope: &LifetimeScope,
        registration: Arc<ComponentRegistration>,
        service: ServiceKey,
        mut parameters: Vec<Arc<dyn Parameter>>,
    ) -> DiResult<AnyArc> {
        for handler in &registration.preparing {
            handler(&mut parameters);
        }

        let service_name = service.display_name();
        let pipeline = registration.pipeline().clone();
        let tracers = self.tracers.clone();
        if !tracers.is_empty() {
            tracers.request_start(service_name, self.stack.depth());
        }

        let mut ctx = ResolveRequestContext {
            operation: self,
            scope: scope.clone(),
            registration,
            service,
            parameters,
            instance: None,
        };
        let result = Next::new(&pipeline).proceed(&mut ctx);
        let instance = match result {
            Ok(()) => ctx.instance.take().ok_or(DiError::NoInstanceProduced {
                service: service_name,
            }),
            Err(err) => Err(err),
        };
        drop(ctx);

        if !tracers.is_empty() {
            tracers.request_end(service_name, instance.is_ok());
        }

        // Completion events fire child-before-parent, and only once the
        // whole request stack has unwound. A failed outermost request drops
        // the queue: no activated events for a graph that was never handed
        // to the caller.
        if self.stack.is_empty() && !self.completions.is_empty() {
            if instance.is_ok() {
                for (handlers, instance) in std::mem::take(&mut self.completions) {
                    for handler in handlers {
                        handler(&instance);
                    }
                }
            } else {
                self.completions.clear();
            }
        }

        instance
    }
}

/// The live view of one in-flight request, handed to middleware, activators,
/// factories and parameter retrievers.
///
/// Nested resolutions made through this context join the same operation, so
/// one cycle detector spans the whole graph walk. The context also carries
/// the activation scope: after scope selection it points at the scope that
/// hosts the instance, so dependencies resolve from there.
pub struct ResolveRequestContext<'op> {
    pub(crate) operation: &'op mut ResolveOperation,
    pub(crate) scope: LifetimeScope,
    pub(crate) registration: Arc<ComponentRegistration>,
    pub(crate) service: ServiceKey,
    pub(crate) parameters: Vec<Arc<dyn Parameter>>,
    pub(crate) instance: Option<AnyArc>,
}

impl<'op> ResolveRequestContext<'op> {
    /// The registration this request is activating.
    pub fn registration(&self) -> &Arc<ComponentRegistration> {
        &self.registration
    }

    /// The service key that selected the registration.
    pub fn service(&self) -> &ServiceKey {
        &self.service
    }

    /// The scope this request is activating in. Before scope selection this
    /// is the scope resolution started from; afterwards, the hosting scope.
    pub fn scope(&self) -> &LifetimeScope {
        &self.scope
    }

    pub(crate) fn set_scope(&mut self, scope: LifetimeScope) {
        self.scope = scope;
    }

    /// Caller-supplied parameters riding on this request.
    pub fn caller_parameters(&self) -> &[Arc<dyn Parameter>] {
        &self.parameters
    }

    /// The instance produced so far, if any stage has set one.
    pub fn instance(&self) -> Option<&AnyArc> {
        self.instance.as_ref()
    }

    /// Whether an instance has been produced.
    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Publishes the request's instance. Each request produces exactly one
    /// instance; setting a second is a pipeline defect, not a recoverable
    /// condition.
    pub fn set_instance(&mut self, instance: AnyArc) {
        if self.instance.is_some() {
            panic!(
                "instance for {} set twice in one request",
                self.service.display_name()
            );
        }
        self.instance = Some(instance);
    }

    /// Removes and returns the produced instance, leaving the slot empty for
    /// a replacement (decoration does this).
    pub fn take_instance(&mut self) -> Option<AnyArc> {
        self.instance.take()
    }

    /// Resolves a service within the current operation.
    pub fn resolve<T: Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        self.resolve_erased(&ServiceKey::of::<T>())
            .and_then(downcast_service::<T>)
    }

    /// Resolves a keyed service within the current operation.
    pub fn resolve_keyed<T: Send + Sync + 'static>(
        &mut self,
        key: &'static str,
    ) -> DiResult<Arc<T>> {
        self.resolve_erased(&ServiceKey::keyed::<T>(key))
            .and_then(downcast_service::<T>)
    }

    /// Resolves every registration of a service, in registration order. Each
    /// activation runs in its own stack segment, so components that share a
    /// service key with the requester do not read as cycles.
    pub fn resolve_all<T: Send + Sync + 'static>(&mut self) -> DiResult<Vec<Arc<T>>> {
        let key = ServiceKey::of::<T>();
        let registrations = self.scope.registry().registrations_for(&key);
        let mut all = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let value = self.in_segment(|ctx| {
                let scope = ctx.scope.clone();
                ctx.operation
                    .execute_request(&scope, registration, key.clone(), Vec::new())
                    .map_err(|e| e.wrap_once(key.display_name()))
            })?;
            all.push(downcast_service::<T>(value)?);
        }
        Ok(all)
    }

    /// Type-erased resolution, for parameter suppliers and middleware.
    pub fn resolve_erased(&mut self, key: &ServiceKey) -> DiResult<AnyArc> {
        if self.scope.is_disposed_chain() {
            return Err(DiError::ScopeDisposed);
        }
        let registration = self
            .scope
            .registry()
            .default_registration(key)
            .ok_or(DiError::NotRegistered {
                service: key.display_name(),
            })?;
        let scope = self.scope.clone();
        self.operation
            .execute_request(&scope, registration, key.clone(), Vec::new())
            .map_err(|e| e.wrap_once(key.display_name()))
    }

    /// Whether any registration fulfils the service in the current scope.
    pub fn is_registered(&self, key: &ServiceKey) -> bool {
        self.scope.registry().is_registered(key)
    }

    /// Registers `resource` for disposal when the activation scope is
    /// disposed. Hooks run in reverse registration order.
    pub fn register_disposer<D: Dispose>(&self, resource: Arc<D>) {
        self.scope
            .push_disposer(Box::new(move || resource.dispose()));
    }

    /// Runs `f` inside a fresh stack segment. Used where repeated resolution
    /// of the same registration is intentional.
    pub(crate) fn in_segment<R>(
        &mut self,
        f: impl FnOnce(&mut ResolveRequestContext<'op>) -> DiResult<R>,
    ) -> DiResult<R> {
        self.operation.stack.enter_segment();
        let result = f(self);
        self.operation.stack.exit_segment();
        result
    }
}
