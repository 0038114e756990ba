//! # lattice-di
//!
//! A dependency injection container built around a middleware resolve
//! pipeline and hierarchical lifetime scopes.
//!
//! ## Features
//!
//! - **Lifetime × sharing model**: instances hosted in the root scope, the
//!   current scope, or the nearest tagged scope, each either cached or fresh
//!   per resolution
//! - **Constructor binding**: types declare their shape once; candidates are
//!   bound against caller parameters, configured parameters, autowiring and
//!   declared defaults, then a pluggable selector picks the winner
//! - **Middleware pipeline**: every activation runs through an immutable
//!   per-registration stage chain with user hooks at four phases
//! - **Cycle detection**: a segmented per-operation request stack with
//!   readable dependency chains in errors and a configurable depth limit
//! - **Structured disposal**: scopes own the instances created in them and
//!   tear them down LIFO, idempotently
//!
//! ## Quick Start
//!
//! ```rust
//! use lattice_di::ContainerBuilder;
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_instance(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! builder.register_transient_factory::<UserService, _>(|ctx| {
//!     Ok(UserService {
//!         db: ctx.resolve::<Database>()?,
//!     })
//! });
//!
//! let container = builder.build().unwrap();
//! let users = container.resolve::<UserService>().unwrap();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Scopes
//!
//! ```rust
//! use lattice_di::ContainerBuilder;
//! use std::sync::Arc;
//!
//! struct RequestState(u32);
//!
//! let mut builder = ContainerBuilder::new();
//! builder.register_scoped_factory::<RequestState, _>(|_| Ok(RequestState(0)));
//! let container = builder.build().unwrap();
//!
//! let request = container.begin_scope().unwrap();
//! let a = request.resolve::<RequestState>().unwrap();
//! let b = request.resolve::<RequestState>().unwrap();
//! assert!(Arc::ptr_eq(&a, &b)); // cached within the scope
//!
//! request.dispose();
//! assert!(request.resolve::<RequestState>().is_err());
//! ```

use std::any::Any;
use std::sync::Arc;

// Module declarations
pub mod activator;
pub mod binding;
pub mod collection;
pub mod diagnostics;
pub mod dispose;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod operation;
pub mod parameters;
pub mod pipeline;
pub mod registration;
pub mod registry;
pub mod scope;
pub mod selector;
pub mod shape;

// Internal modules
mod internal;

/// Type-erased shared instance handle.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Type-erased owned instance, produced by constructor invokers before
/// property injection freezes it into an [`AnyArc`].
pub type AnyBox = Box<dyn Any + Send + Sync>;

// Re-export core types
pub use activator::{Activator, DelegateActivator, ProvidedInstanceActivator, ReflectionActivator};
pub use binding::BoundConstructor;
pub use collection::{ComponentBuilder, Container, ContainerBuilder};
pub use diagnostics::{LoggingTracer, ResolveTracer};
pub use dispose::Dispose;
pub use error::{DiError, DiResult};
pub use key::ServiceKey;
pub use lifetime::{Lifetime, Ownership, Sharing};
pub use operation::{ResolveOperation, ResolveRequestContext};
pub use parameters::{
    DelegateParameter, NamedParameter, Parameter, PositionalParameter, TypedParameter,
    ValueRetriever,
};
pub use pipeline::{Next, PipelinePhase, ResolveMiddleware};
pub use registration::{ComponentRegistration, RegistrationId};
pub use registry::ComponentRegistry;
pub use scope::LifetimeScope;
pub use selector::{ConstructorSelector, MatchingSignature, MostParameters};
pub use shape::{
    ArgList, ConstructorBuilder, ConstructorDescriptor, ParameterDescriptor, ParameterKind,
    PropertyDescriptor, TypeShape, TypeShapeBuilder,
};
