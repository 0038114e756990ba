//! Error types for the resolve pipeline and lifetime scopes.

use std::sync::Arc;

use thiserror::Error;

/// Dependency injection errors.
///
/// Covers the failure modes of registration lookup, constructor binding,
/// activation, scope traversal, and disposal. Resolution failures that
/// originate deeper in a dependency graph are wrapped exactly once in
/// [`DiError::ResolutionFailed`] so callers see both the service they asked
/// for and the underlying cause; use [`DiError::root_cause`] to unwrap.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{ContainerBuilder, DiError};
///
/// let container = ContainerBuilder::new().build().unwrap();
/// match container.resolve::<String>() {
///     Err(DiError::NotRegistered { service }) => {
///         assert_eq!(service, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// No registration provides the requested service.
    #[error("service not registered: {service}")]
    NotRegistered {
        /// Display name of the requested service.
        service: &'static str,
    },

    /// An instance was produced but could not be downcast to the requested type.
    #[error("type mismatch resolving {expected}")]
    TypeMismatch {
        /// Display name of the expected type.
        expected: &'static str,
    },

    /// The target type declares no constructors at all.
    #[error("no constructors declared for {component}")]
    NoConstructors {
        /// Display name of the component being activated.
        component: &'static str,
    },

    /// Every candidate constructor failed to bind; each entry names one
    /// candidate and the parameter that could not be supplied.
    #[error("no constructor of {component} could be bound: {}", reasons.join("; "))]
    NoBindableConstructor {
        /// Display name of the component being activated.
        component: &'static str,
        /// One human-readable reason per failed candidate.
        reasons: Vec<String>,
    },

    /// Two or more bindable constructors tied for the longest parameter list.
    #[error("ambiguous constructors for {component}: multiple candidates with {arity} parameters")]
    AmbiguousConstructor {
        /// Display name of the component being activated.
        component: &'static str,
        /// The tied parameter count.
        arity: usize,
    },

    /// No bindable constructor matched the required parameter type sequence.
    #[error("no constructor of {component} matches the required signature")]
    SignatureMismatch {
        /// Display name of the component being activated.
        component: &'static str,
    },

    /// A cycle was detected in the dependency graph. The chain runs from the
    /// first repeated service back to itself.
    #[error("circular dependency: {}", chain.join(" -> "))]
    CircularDependency {
        /// Service display names along the cycle, first == last.
        chain: Vec<&'static str>,
    },

    /// The resolve request stack exceeded the configured depth limit.
    #[error("maximum resolve depth {limit} exceeded at {}", chain.last().copied().unwrap_or("?"))]
    MaxDepthExceeded {
        /// The configured limit.
        limit: usize,
        /// The request chain at the point the limit was hit.
        chain: Vec<&'static str>,
    },

    /// A factory for a shared component re-entered creation of its own key.
    #[error("shared component {service} attempted to construct itself during its own creation")]
    SelfConstructing {
        /// Display name of the offending service.
        service: &'static str,
    },

    /// A child scope was given a tag already carried by one of its ancestors.
    #[error("scope tag {tag:?} duplicates an ancestor scope's tag")]
    DuplicateScopeTag {
        /// The duplicated tag.
        tag: &'static str,
    },

    /// A matching-lifetime component found no enclosing scope with any of its
    /// tags.
    #[error("no scope matching tags [{}] found in the scope hierarchy", tags.join(", "))]
    NoMatchingScope {
        /// The tags the registration requires.
        tags: Vec<&'static str>,
    },

    /// The scope (or an owning ancestor) has been disposed.
    #[error("lifetime scope has been disposed")]
    ScopeDisposed,

    /// A constructor invoker or factory returned an error.
    #[error("activating {component} failed: {source}")]
    ActivationFailed {
        /// Display name of the component being activated.
        component: &'static str,
        /// The underlying failure.
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// The middleware pipeline completed without any stage producing an
    /// instance.
    #[error("resolve pipeline for {service} completed without producing an instance")]
    NoInstanceProduced {
        /// Display name of the requested service.
        service: &'static str,
    },

    /// Marker wrapping applied once at the resolve boundary: the named
    /// service could not be resolved for the contained reason.
    #[error("resolving {service} failed: {source}")]
    ResolutionFailed {
        /// Display name of the service whose resolution failed.
        service: &'static str,
        /// The underlying error, never itself `ResolutionFailed`.
        #[source]
        source: Box<DiError>,
    },
}

impl DiError {
    /// Wraps this error in [`DiError::ResolutionFailed`] for `service`,
    /// unless it is already wrapped or belongs to the pass-through set
    /// (disposal, cycles, depth, self-construction) whose origin is the
    /// operation itself rather than a nested activation.
    pub(crate) fn wrap_once(self, service: &'static str) -> DiError {
        match self {
            DiError::ResolutionFailed { .. }
            | DiError::ScopeDisposed
            | DiError::CircularDependency { .. }
            | DiError::MaxDepthExceeded { .. }
            | DiError::SelfConstructing { .. } => self,
            other => DiError::ResolutionFailed {
                service,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, unwrapping any [`DiError::ResolutionFailed`]
    /// layers.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lattice_di::{ContainerBuilder, DiError, DiResult};
    ///
    /// #[derive(Debug)]
    /// struct Repo;
    ///
    /// let mut builder = ContainerBuilder::new();
    /// builder.register_transient_factory::<Repo, _>(|ctx| {
    ///     ctx.resolve::<u64>()?; // never registered
    ///     Ok(Repo)
    /// });
    /// let container = builder.build().unwrap();
    ///
    /// let err = container.resolve::<Repo>().unwrap_err();
    /// assert!(matches!(err, DiError::ResolutionFailed { .. }));
    /// assert!(matches!(err.root_cause(), DiError::NotRegistered { .. }));
    /// ```
    pub fn root_cause(&self) -> &DiError {
        let mut cause = self;
        while let DiError::ResolutionFailed { source, .. } = cause {
            cause = source;
        }
        cause
    }
}

/// Result type for DI operations.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{DiResult, DiError};
///
/// fn lookup() -> DiResult<u32> {
///     Err(DiError::NotRegistered { service: "u32" })
/// }
///
/// assert!(lookup().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;
