//! Hierarchical lifetime scopes: instance caching, ownership and disposal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::diagnostics::Tracers;
use crate::dispose::Dispose;
use crate::error::{DiError, DiResult};
use crate::internal::Disposer;
use crate::key::ServiceKey;
use crate::operation::{downcast_service, ResolveOperation};
use crate::parameters::Parameter;
use crate::pipeline::{PipelinePhase, ResolveMiddleware};
use crate::registration::{ComponentRegistration, RegistrationId};
use crate::registry::ComponentRegistry;
use crate::AnyArc;

/// Container-wide knobs fixed at build time.
pub(crate) struct ScopeOptions {
    pub(crate) max_depth: usize,
    pub(crate) tracers: Tracers,
    pub(crate) global_middleware: Vec<(PipelinePhase, Arc<dyn ResolveMiddleware>)>,
}

struct ScopeInner {
    parent: Option<LifetimeScope>,
    tag: Option<&'static str>,
    registry: Arc<ComponentRegistry>,
    // Published shared instances. Reads take the RwLock read path only; the
    // double-checked create happens under the reentrant creation lock so a
    // factory can resolve *other* shared components of this scope without
    // deadlocking.
    shared: RwLock<AHashMap<RegistrationId, AnyArc>>,
    creation_lock: ReentrantMutex<()>,
    // Keys currently mid-creation on this thread. Only touched while the
    // creation lock is held, so same-thread re-entry on the same key is the
    // only way to observe an entry.
    creating: Mutex<AHashSet<RegistrationId>>,
    disposer: Mutex<Disposer>,
    disposed: AtomicBool,
    options: Arc<ScopeOptions>,
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::Acquire) {
            let mut disposer = std::mem::take(&mut *self.disposer.lock());
            if !disposer.is_empty() {
                tracing::warn!(
                    hooks = disposer.len(),
                    tag = ?self.tag,
                    "lifetime scope dropped without dispose; running owned teardown"
                );
            }
            disposer.run_all_reverse();
        }
    }
}

/// One node of the scope tree: a cheap, cloneable handle.
///
/// Scopes host shared instances, own disposal of the components activated in
/// them, and can carry a tag for matching-lifetime components. Child scopes
/// see every inherited registration plus any added at their creation.
///
/// # Examples
///
/// ```rust
/// use lattice_di::ContainerBuilder;
/// use std::sync::Arc;
///
/// struct Session;
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_scoped_factory::<Session, _>(|_| Ok(Session));
/// let container = builder.build().unwrap();
///
/// let scope = container.begin_scope().unwrap();
/// let a = scope.resolve::<Session>().unwrap();
/// let b = scope.resolve::<Session>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let sibling = container.begin_scope().unwrap();
/// let c = sibling.resolve::<Session>().unwrap();
/// assert!(!Arc::ptr_eq(&a, &c));
/// ```
#[derive(Clone)]
pub struct LifetimeScope {
    inner: Arc<ScopeInner>,
}

impl LifetimeScope {
    pub(crate) fn new_root(
        registry: Arc<ComponentRegistry>,
        options: Arc<ScopeOptions>,
    ) -> DiResult<Self> {
        let scope = Self {
            inner: Arc::new(ScopeInner {
                parent: None,
                tag: None,
                registry,
                shared: RwLock::new(AHashMap::new()),
                creation_lock: ReentrantMutex::new(()),
                creating: Mutex::new(AHashSet::new()),
                disposer: Mutex::new(Disposer::default()),
                disposed: AtomicBool::new(false),
                options,
            }),
        };
        scope.activate_startables(&scope.inner.registry.local_registrations().to_vec())?;
        Ok(scope)
    }

    fn new_child(
        &self,
        tag: Option<&'static str>,
        registry: Arc<ComponentRegistry>,
        startables: &[Arc<ComponentRegistration>],
    ) -> DiResult<Self> {
        if self.is_disposed_chain() {
            return Err(DiError::ScopeDisposed);
        }
        if let Some(tag) = tag {
            let mut cursor = Some(self.clone());
            while let Some(scope) = cursor {
                if scope.tag() == Some(tag) {
                    return Err(DiError::DuplicateScopeTag { tag });
                }
                cursor = scope.parent();
            }
        }
        let child = Self {
            inner: Arc::new(ScopeInner {
                parent: Some(self.clone()),
                tag,
                registry,
                shared: RwLock::new(AHashMap::new()),
                creation_lock: ReentrantMutex::new(()),
                creating: Mutex::new(AHashSet::new()),
                disposer: Mutex::new(Disposer::default()),
                disposed: AtomicBool::new(false),
                options: self.inner.options.clone(),
            }),
        };
        child.activate_startables(startables)?;
        Ok(child)
    }

    /// Begins a plain child scope.
    pub fn begin_scope(&self) -> DiResult<LifetimeScope> {
        self.new_child(None, self.inner.registry.clone(), &[])
    }

    /// Begins a child scope carrying `tag`. Reusing a tag already carried by
    /// this scope or an ancestor is a configuration error.
    pub fn begin_tagged_scope(&self, tag: &'static str) -> DiResult<LifetimeScope> {
        self.new_child(Some(tag), self.inner.registry.clone(), &[])
    }

    /// Begins a child scope with additional registrations layered over the
    /// inherited ones. The parent's registry is untouched.
    pub fn begin_scope_with<F>(&self, configure: F) -> DiResult<LifetimeScope>
    where
        F: FnOnce(&mut crate::collection::ContainerBuilder),
    {
        self.begin_child_with(None, configure)
    }

    /// Tagged variant of [`begin_scope_with`](Self::begin_scope_with).
    pub fn begin_tagged_scope_with<F>(
        &self,
        tag: &'static str,
        configure: F,
    ) -> DiResult<LifetimeScope>
    where
        F: FnOnce(&mut crate::collection::ContainerBuilder),
    {
        self.begin_child_with(Some(tag), configure)
    }

    fn begin_child_with<F>(&self, tag: Option<&'static str>, configure: F) -> DiResult<LifetimeScope>
    where
        F: FnOnce(&mut crate::collection::ContainerBuilder),
    {
        let mut builder = crate::collection::ContainerBuilder::new();
        configure(&mut builder);
        let (registrations, decorators) =
            builder.into_scope_parts(&self.inner.options.global_middleware);
        let startables: Vec<Arc<ComponentRegistration>> = registrations
            .iter()
            .filter(|r| r.startable)
            .cloned()
            .collect();
        let registry = Arc::new(ComponentRegistry::new(
            Some(self.inner.registry.clone()),
            registrations,
            decorators,
        ));
        self.new_child(tag, registry, &startables)
    }

    /// This scope's tag, if any.
    pub fn tag(&self) -> Option<&'static str> {
        self.inner.tag
    }

    /// The parent scope, `None` at the root.
    pub fn parent(&self) -> Option<LifetimeScope> {
        self.inner.parent.clone()
    }

    /// The root of the scope tree.
    pub fn root(&self) -> LifetimeScope {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// The nearest enclosing scope (self included) carrying one of `tags`.
    pub fn find_matching(&self, tags: &[&'static str]) -> DiResult<LifetimeScope> {
        let mut cursor = Some(self.clone());
        while let Some(scope) = cursor {
            if scope.tag().is_some_and(|t| tags.contains(&t)) {
                return Ok(scope);
            }
            cursor = scope.parent();
        }
        Err(DiError::NoMatchingScope {
            tags: tags.to_vec(),
        })
    }

    /// Whether this scope itself has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Whether this scope or any ancestor has been disposed.
    pub(crate) fn is_disposed_chain(&self) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(scope) = cursor {
            if scope.is_disposed() {
                return true;
            }
            cursor = scope.parent();
        }
        false
    }

    /// Disposes the scope: refuses further resolutions, runs owned dispose
    /// hooks in reverse creation order, and drops cached shared instances.
    /// Calling it again is a no-op.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut disposer = std::mem::take(&mut *self.inner.disposer.lock());
        disposer.run_all_reverse();
        self.inner.shared.write().clear();
    }

    /// Whether any registration fulfils `T` here.
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.inner.registry.is_registered(&ServiceKey::of::<T>())
    }

    /// Resolves the default registration of `T`.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.resolve_with_parameters::<T>(Vec::new())
    }

    /// Resolves `T` with caller parameters that take priority over every
    /// other supplier during constructor binding.
    pub fn resolve_with_parameters<T: Send + Sync + 'static>(
        &self,
        parameters: Vec<Arc<dyn Parameter>>,
    ) -> DiResult<Arc<T>> {
        self.resolve_service(ServiceKey::of::<T>(), parameters)
            .and_then(downcast_service::<T>)
    }

    /// Resolves the keyed registration of `T` under `key`.
    pub fn resolve_keyed<T: Send + Sync + 'static>(&self, key: &'static str) -> DiResult<Arc<T>> {
        self.resolve_service(ServiceKey::keyed::<T>(key), Vec::new())
            .and_then(downcast_service::<T>)
    }

    /// Resolves every registration of `T`, in registration order. An
    /// unregistered service yields an empty vec rather than an error.
    pub fn resolve_all<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        if self.is_disposed_chain() {
            return Err(DiError::ScopeDisposed);
        }
        let key = ServiceKey::of::<T>();
        let registrations = self.inner.registry.registrations_for(&key);
        let name = key.display_name();
        let mut op = self.new_operation(name);
        op.start();
        let mut all = Vec::with_capacity(registrations.len());
        let mut failure = None;
        for registration in registrations {
            op.stack.enter_segment();
            let result = op.execute_request(self, registration, key.clone(), Vec::new());
            op.stack.exit_segment();
            match result.map_err(|e| e.wrap_once(name)).and_then(downcast_service::<T>) {
                Ok(value) => all.push(value),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        op.end(failure.is_none());
        match failure {
            Some(err) => Err(err),
            None => Ok(all),
        }
    }

    fn resolve_service(
        &self,
        key: ServiceKey,
        parameters: Vec<Arc<dyn Parameter>>,
    ) -> DiResult<AnyArc> {
        if self.is_disposed_chain() {
            return Err(DiError::ScopeDisposed);
        }
        let registration = self
            .inner
            .registry
            .default_registration(&key)
            .ok_or(DiError::NotRegistered {
                service: key.display_name(),
            })?;
        let name = key.display_name();
        let mut op = self.new_operation(name);
        op.start();
        let result = op
            .execute_request(self, registration, key, parameters)
            .map_err(|e| e.wrap_once(name));
        op.end(result.is_ok());
        result
    }

    fn new_operation(&self, root_service: &'static str) -> ResolveOperation {
        ResolveOperation::new(
            self.inner.options.max_depth,
            self.inner.options.tracers.clone(),
            root_service,
        )
    }

    fn activate_startables(&self, startables: &[Arc<ComponentRegistration>]) -> DiResult<()> {
        for registration in startables {
            if !registration.startable {
                continue;
            }
            let service = registration
                .services()
                .first()
                .cloned()
                .unwrap_or_else(|| {
                    ServiceKey::Type(
                        registration.activator.limit_type_id(),
                        registration.component_name(),
                    )
                });
            let name = service.display_name();
            let mut op = self.new_operation(name);
            op.start();
            let result = op
                .execute_request(self, registration.clone(), service, Vec::new())
                .map_err(|e| e.wrap_once(name));
            op.end(result.is_ok());
            result?;
        }
        Ok(())
    }

    pub(crate) fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.inner.registry
    }

    /// Registers `resource` for disposal with this scope directly.
    pub fn register_disposer<D: Dispose>(&self, resource: Arc<D>) {
        self.push_disposer(Box::new(move || resource.dispose()));
    }

    pub(crate) fn push_disposer(&self, hook: Box<dyn FnOnce() + Send>) {
        self.inner.disposer.lock().push(hook);
    }

    /// Shared-instance lookup with double-checked creation.
    ///
    /// The fast path is a read-locked map probe. On a miss the reentrant
    /// creation lock serializes creators; a second read check catches the
    /// race, and the `creating` set turns a factory re-creating its own key
    /// into [`DiError::SelfConstructing`] instead of unbounded recursion.
    pub(crate) fn get_or_create_shared(
        &self,
        id: RegistrationId,
        service: &'static str,
        create: impl FnOnce(&LifetimeScope) -> DiResult<AnyArc>,
    ) -> DiResult<AnyArc> {
        if let Some(existing) = self.inner.shared.read().get(&id) {
            return Ok(existing.clone());
        }

        let _creation = self.inner.creation_lock.lock();
        if let Some(existing) = self.inner.shared.read().get(&id) {
            return Ok(existing.clone());
        }
        if !self.inner.creating.lock().insert(id) {
            return Err(DiError::SelfConstructing { service });
        }
        let result = create(self);
        self.inner.creating.lock().remove(&id);
        let value = result?;
        self.inner.shared.write().insert(id, value.clone());
        Ok(value)
    }
}

impl std::fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("tag", &self.inner.tag)
            .field("disposed", &self.is_disposed())
            .field("shared_instances", &self.inner.shared.read().len())
            .finish()
    }
}
