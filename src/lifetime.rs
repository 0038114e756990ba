//! Lifetime, sharing and ownership axes for component registrations.

/// Which scope an instance is associated with.
///
/// Lifetime picks the scope that *hosts* a component's instances; whether
/// that scope caches them is the separate [`Sharing`] axis. The familiar
/// singleton/scoped/transient vocabulary is the product of the two:
///
/// - singleton = `Root` + [`Sharing::Shared`]
/// - scoped = `CurrentScope` + [`Sharing::Shared`]
/// - transient = `CurrentScope` + [`Sharing::NotShared`]
///
/// # Examples
///
/// ```rust
/// use lattice_di::{ContainerBuilder, Lifetime, Sharing};
///
/// struct UnitOfWork;
///
/// let mut builder = ContainerBuilder::new();
/// builder
///     .register_factory::<UnitOfWork, _>(|_| Ok(UnitOfWork))
///     .lifetime(Lifetime::Matching(vec!["request"]))
///     .sharing(Sharing::Shared);
/// let container = builder.build().unwrap();
///
/// let request = container.begin_tagged_scope("request").unwrap();
/// let inner = request.begin_scope().unwrap();
///
/// // Both resolve to the instance cached in the "request" scope.
/// let a = request.resolve::<UnitOfWork>().unwrap();
/// let b = inner.resolve::<UnitOfWork>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifetime {
    /// Instances live in the root scope regardless of where resolution
    /// started.
    Root,
    /// Instances live in the scope the resolve operation started from.
    CurrentScope,
    /// Instances live in the nearest enclosing scope carrying one of these
    /// tags; resolving with no such ancestor is an error.
    Matching(Vec<&'static str>),
}

/// Whether a scope caches and reuses instances of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// At most one instance per hosting scope; concurrent first resolutions
    /// race to create but exactly one instance is ever published.
    Shared,
    /// Every resolution activates a fresh instance.
    NotShared,
}

/// Whether the hosting scope tracks an instance for disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The scope registers the instance's dispose hook and runs it at scope
    /// disposal, LIFO.
    OwnedByScope,
    /// The caller owns cleanup; the scope never tracks the instance.
    External,
}
