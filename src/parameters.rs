//! Caller- and registration-supplied parameters for constructor binding.

use std::any::TypeId;
use std::sync::Arc;

use crate::error::DiResult;
use crate::key::ServiceKey;
use crate::operation::ResolveRequestContext;
use crate::shape::{ParameterDescriptor, ParameterKind};
use crate::AnyArc;

/// Deferred production of one constructor argument. Binding decides *whether*
/// a parameter can be supplied; the retriever runs only if the bound
/// constructor is actually selected and instantiated.
pub type ValueRetriever =
    Box<dyn for<'op> FnOnce(&mut ResolveRequestContext<'op>) -> DiResult<AnyArc> + Send>;

/// A source of constructor (and property) arguments.
///
/// During binding each declared parameter is offered to the prioritized
/// supplier chain — caller parameters first, then registration-configured
/// parameters, then autowiring, then declared defaults — and the first
/// supplier returning a retriever wins that slot.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{ContainerBuilder, NamedParameter, TypeShapeBuilder};
///
/// struct Greeter { greeting: String }
///
/// TypeShapeBuilder::<Greeter>::new()
///     .constructor(|c| {
///         c.value::<String>("greeting")
///             .invoke(|args| Ok(Greeter { greeting: args.value(0)? }))
///     })
///     .intern();
///
/// let mut builder = ContainerBuilder::new();
/// builder
///     .register_type::<Greeter>()
///     .with_parameter(NamedParameter::new("greeting", "hello".to_string()));
/// let container = builder.build().unwrap();
///
/// assert_eq!(container.resolve::<Greeter>().unwrap().greeting, "hello");
/// ```
pub trait Parameter: Send + Sync {
    /// Returns a retriever if this parameter can fill `target`, `None`
    /// otherwise. Must not activate anything; production is deferred to the
    /// returned retriever.
    fn can_supply(
        &self,
        target: &ParameterDescriptor,
        ctx: &ResolveRequestContext<'_>,
    ) -> Option<ValueRetriever>;
}

/// Supplies a value to the parameter with a matching name and type.
pub struct NamedParameter {
    name: &'static str,
    type_id: TypeId,
    value: AnyArc,
}

impl NamedParameter {
    pub fn new<P: Send + Sync + 'static>(name: &'static str, value: P) -> Self {
        Self {
            name,
            type_id: TypeId::of::<P>(),
            value: Arc::new(value),
        }
    }
}

impl Parameter for NamedParameter {
    fn can_supply(
        &self,
        target: &ParameterDescriptor,
        _ctx: &ResolveRequestContext<'_>,
    ) -> Option<ValueRetriever> {
        if target.name() == self.name && target.type_id() == self.type_id {
            let value = self.value.clone();
            Some(Box::new(move |_| Ok(value)))
        } else {
            None
        }
    }
}

/// Supplies a value to the first parameter with a matching type.
pub struct TypedParameter {
    type_id: TypeId,
    value: AnyArc,
}

impl TypedParameter {
    pub fn new<P: Send + Sync + 'static>(value: P) -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            value: Arc::new(value),
        }
    }
}

impl Parameter for TypedParameter {
    fn can_supply(
        &self,
        target: &ParameterDescriptor,
        _ctx: &ResolveRequestContext<'_>,
    ) -> Option<ValueRetriever> {
        if target.type_id() == self.type_id {
            let value = self.value.clone();
            Some(Box::new(move |_| Ok(value)))
        } else {
            None
        }
    }
}

/// Supplies a value to the parameter at a fixed position, provided the type
/// also matches.
pub struct PositionalParameter {
    position: usize,
    type_id: TypeId,
    value: AnyArc,
}

impl PositionalParameter {
    pub fn new<P: Send + Sync + 'static>(position: usize, value: P) -> Self {
        Self {
            position,
            type_id: TypeId::of::<P>(),
            value: Arc::new(value),
        }
    }
}

impl Parameter for PositionalParameter {
    fn can_supply(
        &self,
        target: &ParameterDescriptor,
        _ctx: &ResolveRequestContext<'_>,
    ) -> Option<ValueRetriever> {
        if target.position() == self.position && target.type_id() == self.type_id {
            let value = self.value.clone();
            Some(Box::new(move |_| Ok(value)))
        } else {
            None
        }
    }
}

type DelegatePredicate = Arc<dyn Fn(&ParameterDescriptor) -> bool + Send + Sync>;
type DelegateFactory =
    Arc<dyn for<'op> Fn(&mut ResolveRequestContext<'op>) -> DiResult<AnyArc> + Send + Sync>;

/// Supplies values through an arbitrary predicate and factory pair. The
/// factory runs against the live resolve context, so it can resolve other
/// services while producing the argument.
pub struct DelegateParameter {
    predicate: DelegatePredicate,
    factory: DelegateFactory,
}

impl DelegateParameter {
    pub fn new<M, F, P>(matches: M, produce: F) -> Self
    where
        M: Fn(&ParameterDescriptor) -> bool + Send + Sync + 'static,
        F: for<'op> Fn(&mut ResolveRequestContext<'op>) -> DiResult<P> + Send + Sync + 'static,
        P: Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(matches),
            factory: Arc::new(move |ctx| produce(ctx).map(|p| Arc::new(p) as AnyArc)),
        }
    }
}

impl Parameter for DelegateParameter {
    fn can_supply(
        &self,
        target: &ParameterDescriptor,
        _ctx: &ResolveRequestContext<'_>,
    ) -> Option<ValueRetriever> {
        if (self.predicate)(target) {
            let factory = self.factory.clone();
            Some(Box::new(move |ctx| factory(ctx)))
        } else {
            None
        }
    }
}

/// Built-in supplier: resolves service-kind parameters from the container.
/// Sits after all user parameters in the chain so explicit values always win.
pub(crate) struct AutowireParameter;

impl Parameter for AutowireParameter {
    fn can_supply(
        &self,
        target: &ParameterDescriptor,
        ctx: &ResolveRequestContext<'_>,
    ) -> Option<ValueRetriever> {
        if target.kind() != ParameterKind::Service {
            return None;
        }
        let key = ServiceKey::Type(target.type_id(), target.type_name());
        if !ctx.is_registered(&key) {
            return None;
        }
        Some(Box::new(move |ctx| ctx.resolve_erased(&key)))
    }
}

/// Built-in supplier of last resort: the parameter's declared default value.
pub(crate) struct DefaultValueParameter;

impl Parameter for DefaultValueParameter {
    fn can_supply(
        &self,
        target: &ParameterDescriptor,
        _ctx: &ResolveRequestContext<'_>,
    ) -> Option<ValueRetriever> {
        target
            .default_value()
            .map(|value| -> ValueRetriever { Box::new(move |_| Ok(value)) })
    }
}
