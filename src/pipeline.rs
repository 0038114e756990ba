//! The resolve pipeline: an onion of middleware around each activation.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::lifetime::{Lifetime, Ownership, Sharing};
use crate::operation::ResolveRequestContext;
use crate::registration::ComponentRegistration;
use crate::scope::LifetimeScope;
use crate::AnyArc;

/// Where user middleware slots into the built-in stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelinePhase {
    /// After the cycle/depth guard, before anything else.
    RequestStart,
    /// Just before the hosting scope is selected.
    ScopeSelection,
    /// After sharing, just before decorators run.
    Decoration,
    /// Last before the activator.
    Activation,
}

/// One stage of a registration's resolve pipeline.
///
/// A stage may short-circuit by setting the instance and not calling
/// `next.proceed`; everything downstream (sharing, decoration, activation)
/// is skipped.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{
///     ContainerBuilder, DiResult, Next, PipelinePhase, ResolveMiddleware,
///     ResolveRequestContext,
/// };
/// use std::sync::Arc;
///
/// struct Fallback;
///
/// impl ResolveMiddleware for Fallback {
///     fn name(&self) -> &'static str {
///         "fallback"
///     }
///
///     fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
///         // Short-circuit: never reaches the activator.
///         let _ = next;
///         ctx.set_instance(Arc::new(99u32));
///         Ok(())
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(1u32);
/// builder.add_middleware(PipelinePhase::RequestStart, Arc::new(Fallback));
/// let container = builder.build().unwrap();
///
/// assert_eq!(*container.resolve::<u32>().unwrap(), 99);
/// ```
pub trait ResolveMiddleware: Send + Sync {
    /// Stage name for tracing.
    fn name(&self) -> &'static str;

    /// Runs the stage. Call `next.proceed(ctx)` to continue the pipeline.
    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()>;
}

/// A registration's assembled pipeline, immutable after container build.
pub(crate) type Pipeline = Arc<[Arc<dyn ResolveMiddleware>]>;

/// Continuation handle for the remaining pipeline stages.
pub struct Next<'a> {
    stages: &'a [Arc<dyn ResolveMiddleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(pipeline: &'a Pipeline) -> Self {
        Self { stages: pipeline }
    }

    /// Runs the rest of the pipeline.
    pub fn proceed(self, ctx: &mut ResolveRequestContext<'_>) -> DiResult<()> {
        let Some((stage, rest)) = self.stages.split_first() else {
            return Ok(());
        };
        let tracers = ctx.operation.tracers.clone();
        if tracers.is_empty() {
            stage.execute(ctx, Next { stages: rest })
        } else {
            let service = ctx.service().display_name();
            tracers.middleware_enter(service, stage.name());
            let result = stage.execute(ctx, Next { stages: rest });
            tracers.middleware_exit(service, stage.name());
            result
        }
    }
}

/// Assembles a registration's pipeline: built-in stages in fixed order with
/// user middleware (container-wide first, then per-registration) spliced in
/// at their declared phases.
pub(crate) fn assemble(
    registration: &ComponentRegistration,
    global: &[(PipelinePhase, Arc<dyn ResolveMiddleware>)],
) -> Pipeline {
    let user = |phase: PipelinePhase| {
        global
            .iter()
            .filter(move |(p, _)| *p == phase)
            .map(|(_, m)| m.clone())
            .chain(
                registration
                    .user_middleware
                    .iter()
                    .filter(move |(p, _)| *p == phase)
                    .map(|(_, m)| m.clone()),
            )
    };

    let mut stages: Vec<Arc<dyn ResolveMiddleware>> = Vec::new();
    stages.push(Arc::new(CircularityGuard));
    stages.extend(user(PipelinePhase::RequestStart));
    stages.extend(user(PipelinePhase::ScopeSelection));
    stages.push(Arc::new(SharingMiddleware));
    stages.extend(user(PipelinePhase::Decoration));
    stages.push(Arc::new(DecorationMiddleware));
    stages.push(Arc::new(EventsMiddleware));
    stages.extend(user(PipelinePhase::Activation));
    stages.push(Arc::new(ActivatorMiddleware));
    stages.into()
}

/// First stage: cycle and depth detection over the operation's segmented
/// request stack.
struct CircularityGuard;

impl ResolveMiddleware for CircularityGuard {
    fn name(&self) -> &'static str {
        "circularity-guard"
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        let id = ctx.registration().id();
        let service = ctx.service().display_name();

        if ctx.operation.stack.contains(id) {
            return Err(DiError::CircularDependency {
                chain: ctx.operation.stack.cycle_chain(id),
            });
        }
        if ctx.operation.stack.depth() >= ctx.operation.max_depth {
            let mut chain = ctx.operation.stack.full_chain();
            chain.push(service);
            return Err(DiError::MaxDepthExceeded {
                limit: ctx.operation.max_depth,
                chain,
            });
        }

        ctx.operation.stack.push(id, service);
        let result = next.proceed(ctx);
        ctx.operation.stack.pop();
        result
    }
}

/// Registers the instance's dispose hook with its hosting scope when the
/// registration says the scope owns it.
fn track_ownership(scope: &LifetimeScope, registration: &ComponentRegistration, instance: &AnyArc) {
    if registration.ownership() != Ownership::OwnedByScope {
        return;
    }
    if let Some(hook) = &registration.dispose_hook {
        let hook = hook.clone();
        let instance = instance.clone();
        scope.push_disposer(Box::new(move || hook(&instance)));
    }
}

/// Selects the hosting scope from the registration's lifetime, then applies
/// sharing. A shared cache hit returns here without running any later
/// stage; a miss runs the rest of the pipeline inside the scope's
/// double-checked create.
struct SharingMiddleware;

impl ResolveMiddleware for SharingMiddleware {
    fn name(&self) -> &'static str {
        "sharing"
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        let registration = ctx.registration().clone();
        let hosting = match &registration.lifetime {
            Lifetime::Root => ctx.scope().root(),
            Lifetime::CurrentScope => ctx.scope().clone(),
            Lifetime::Matching(tags) => ctx.scope().find_matching(tags)?,
        };
        if hosting.is_disposed_chain() {
            return Err(DiError::ScopeDisposed);
        }
        ctx.set_scope(hosting.clone());

        match registration.sharing {
            Sharing::NotShared => {
                next.proceed(ctx)?;
                if let Some(instance) = ctx.instance() {
                    track_ownership(&hosting, &registration, instance);
                }
                Ok(())
            }
            Sharing::Shared => {
                let service = ctx.service().display_name();
                let value = hosting.get_or_create_shared(registration.id(), service, |scope| {
                    next.proceed(ctx)?;
                    let instance = ctx
                        .instance()
                        .cloned()
                        .ok_or(DiError::NoInstanceProduced { service })?;
                    track_ownership(scope, &registration, &instance);
                    Ok(instance)
                })?;
                // On a cache hit no later stage ran, so the slot is empty.
                if !ctx.has_instance() {
                    ctx.set_instance(value);
                }
                Ok(())
            }
        }
    }
}

/// Applies the service's decorators, innermost-registered first. Each
/// decorator runs in its own stack segment so it can resolve collaborators
/// that share the requester's service key.
struct DecorationMiddleware;

impl ResolveMiddleware for DecorationMiddleware {
    fn name(&self) -> &'static str {
        "decoration"
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        next.proceed(ctx)?;
        let decorators = ctx.scope().registry().decorators_for(ctx.service());
        if decorators.is_empty() {
            return Ok(());
        }
        let service = ctx.service().display_name();
        let mut value = ctx
            .take_instance()
            .ok_or(DiError::NoInstanceProduced { service })?;
        for decorator in decorators {
            let inner = value;
            value = ctx.in_segment(|ctx| decorator(inner, ctx))?;
        }
        ctx.set_instance(value);
        Ok(())
    }
}

/// Fires activating handlers on fresh instances and queues activated
/// handlers on the operation's completion queue.
struct EventsMiddleware;

impl ResolveMiddleware for EventsMiddleware {
    fn name(&self) -> &'static str {
        "activation-events"
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, next: Next<'_>) -> DiResult<()> {
        next.proceed(ctx)?;
        let registration = ctx.registration().clone();
        let instance = match ctx.instance() {
            Some(instance) => instance.clone(),
            None => return Ok(()),
        };
        for handler in &registration.activating {
            handler(&instance);
        }
        if !registration.activated.is_empty() {
            ctx.operation
                .queue_completion(registration.activated.clone(), instance);
        }
        Ok(())
    }
}

/// Terminal stage: asks the registration's activator for an instance, unless
/// an earlier stage already produced one.
struct ActivatorMiddleware;

impl ResolveMiddleware for ActivatorMiddleware {
    fn name(&self) -> &'static str {
        "activator"
    }

    fn execute(&self, ctx: &mut ResolveRequestContext<'_>, _next: Next<'_>) -> DiResult<()> {
        if ctx.has_instance() {
            return Ok(());
        }
        let registration = ctx.registration().clone();
        let instance = registration.activator.activate(ctx, &registration.parameters)?;
        ctx.set_instance(instance);
        Ok(())
    }
}
