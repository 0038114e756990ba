//! Disposal trait for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this for components that need structured teardown (flushing
/// caches, closing connections). A component registered with
/// [`Ownership::OwnedByScope`](crate::Ownership::OwnedByScope) and a dispose
/// hook, or one handed to
/// [`register_disposer`](crate::ResolveRequestContext::register_disposer),
/// has its hook run when the owning scope is disposed, in reverse creation
/// order.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{ContainerBuilder, Dispose};
/// use std::sync::Arc;
///
/// struct Cache;
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         // flush...
///     }
/// }
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_scoped_factory::<Cache, _>(|ctx| {
///     let cache = Arc::new(Cache);
///     ctx.register_disposer(cache.clone());
///     Ok(Cache)
/// });
/// let container = builder.build().unwrap();
/// let scope = container.begin_scope().unwrap();
/// let _ = scope.resolve::<Cache>().unwrap();
/// scope.dispose(); // runs Cache::dispose
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}
