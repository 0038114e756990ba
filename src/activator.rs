//! Activators: how a registration produces an instance.

use std::any::TypeId;
use std::sync::Arc;

use crate::binding::{self, BoundConstructor};
use crate::error::{DiError, DiResult};
use crate::operation::ResolveRequestContext;
use crate::parameters::{AutowireParameter, DefaultValueParameter, Parameter};
use crate::selector::{ConstructorSelector, MostParameters};
use crate::shape::{self, ParameterDescriptor, PropertyDescriptor, TypeShape};
use crate::{AnyArc, AnyBox};

/// Produces instances for one registration. The activator sits at the end of
/// the resolve pipeline; sharing, decoration and events wrap around it.
pub trait Activator: Send + Sync {
    /// Creates one instance. `parameters` are the registration-configured
    /// parameters; caller parameters ride on the request in `ctx` and take
    /// priority over them.
    fn activate(
        &self,
        ctx: &mut ResolveRequestContext<'_>,
        parameters: &[Arc<dyn Parameter>],
    ) -> DiResult<AnyArc>;

    /// Display name of the concrete type this activator produces.
    fn limit_type(&self) -> &'static str;

    /// TypeId of the concrete type this activator produces.
    fn limit_type_id(&self) -> TypeId;
}

/// Activates instances from a declared [`TypeShape`]: binds every
/// constructor candidate against the prioritized supplier chain, filters to
/// the bindable ones, lets the selector pick, instantiates, then injects
/// properties.
pub struct ReflectionActivator {
    type_id: TypeId,
    type_name: &'static str,
    selector: Arc<dyn ConstructorSelector>,
    overwrite_set_properties: bool,
}

impl ReflectionActivator {
    pub fn new<T: Send + Sync + 'static>() -> Self {
        Self::from_raw(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    pub(crate) fn from_raw(type_id: TypeId, type_name: &'static str) -> Self {
        Self {
            type_id,
            type_name,
            selector: Arc::new(MostParameters),
            overwrite_set_properties: false,
        }
    }

    pub(crate) fn with_selector(mut self, selector: Arc<dyn ConstructorSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub(crate) fn overwrite_set_properties(mut self) -> Self {
        self.overwrite_set_properties = true;
        self
    }

    fn select_candidate(
        &self,
        shape: &TypeShape,
        suppliers: &[&dyn Parameter],
        ctx: &ResolveRequestContext<'_>,
    ) -> DiResult<BoundConstructor> {
        // Single-candidate shapes skip the filter/select dance entirely.
        if let [only] = shape.constructors() {
            let bound = binding::bind(only, suppliers, ctx);
            return match bound.failure() {
                None => Ok(bound),
                Some(reason) => Err(DiError::NoBindableConstructor {
                    component: self.type_name,
                    reasons: vec![format!("{}: {}", bound.description(), reason)],
                }),
            };
        }

        let mut bound = Vec::new();
        let mut reasons = Vec::new();
        for candidate in shape.constructors() {
            let attempt = binding::bind(candidate, suppliers, ctx);
            match attempt.failure() {
                None => bound.push(attempt),
                Some(reason) => reasons.push(format!("{}: {}", attempt.description(), reason)),
            }
        }
        if bound.is_empty() {
            return Err(DiError::NoBindableConstructor {
                component: self.type_name,
                reasons,
            });
        }
        self.selector.select(self.type_name, bound)
    }

    fn inject_properties(
        &self,
        instance: &mut AnyBox,
        properties: &[PropertyDescriptor],
        suppliers: &[&dyn Parameter],
        ctx: &mut ResolveRequestContext<'_>,
    ) -> DiResult<()> {
        let autowire = AutowireParameter;
        for property in properties {
            if !self.overwrite_set_properties && property.probe_is_set(instance.as_ref()) {
                continue;
            }

            // Properties are matched through the same supplier chain as
            // constructor parameters, autowiring last.
            let slot = property_slot(property);
            let retriever = suppliers
                .iter()
                .copied()
                .chain(std::iter::once(&autowire as &dyn Parameter))
                .find_map(|s| s.can_supply(&slot, ctx));

            match retriever {
                Some(retriever) => {
                    let value = retriever(ctx)?;
                    (property.setter)(instance.as_mut(), value)?;
                }
                None if property.required() => {
                    return Err(DiError::ActivationFailed {
                        component: self.type_name,
                        source: Arc::new(DiError::NotRegistered {
                            service: property.type_name(),
                        }),
                    });
                }
                None => {}
            }
        }
        Ok(())
    }
}

/// A property viewed as one more fillable slot for supplier matching.
fn property_slot(property: &PropertyDescriptor) -> ParameterDescriptor {
    ParameterDescriptor {
        name: property.name,
        type_id: property.type_id,
        type_name: property.type_name,
        kind: property.kind,
        // Out-of-band position so positional parameters never match.
        position: usize::MAX,
        default: None,
    }
}

impl Activator for ReflectionActivator {
    fn activate(
        &self,
        ctx: &mut ResolveRequestContext<'_>,
        parameters: &[Arc<dyn Parameter>],
    ) -> DiResult<AnyArc> {
        let shape = shape::lookup_by_id(self.type_id).ok_or(DiError::NoConstructors {
            component: self.type_name,
        })?;
        if shape.constructors().is_empty() {
            return Err(DiError::NoConstructors {
                component: self.type_name,
            });
        }

        // Priority order: caller parameters, registration parameters,
        // autowiring, declared defaults. First match wins per slot.
        let caller: Vec<Arc<dyn Parameter>> = ctx.caller_parameters().to_vec();
        let autowire = AutowireParameter;
        let defaults = DefaultValueParameter;
        let mut suppliers: Vec<&dyn Parameter> = Vec::with_capacity(caller.len() + parameters.len() + 2);
        suppliers.extend(caller.iter().map(|p| p.as_ref()));
        suppliers.extend(parameters.iter().map(|p| p.as_ref()));
        let user_suppliers = suppliers.clone();
        suppliers.push(&autowire);
        suppliers.push(&defaults);

        let selected = self.select_candidate(&shape, &suppliers, ctx)?;
        let mut instance = selected.instantiate(self.type_name, ctx)?;

        self.inject_properties(&mut instance, shape.properties(), &user_suppliers, ctx)?;

        Ok(Arc::from(instance))
    }

    fn limit_type(&self) -> &'static str {
        self.type_name
    }

    fn limit_type_id(&self) -> TypeId {
        self.type_id
    }
}

type Factory =
    Arc<dyn for<'op> Fn(&mut ResolveRequestContext<'op>) -> DiResult<AnyArc> + Send + Sync>;

/// Activates instances by calling a user factory against the live resolve
/// context. Factory errors pass through untouched; the resolve boundary
/// applies its own wrapping.
pub struct DelegateActivator {
    type_id: TypeId,
    type_name: &'static str,
    factory: Factory,
}

impl DelegateActivator {
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: for<'op> Fn(&mut ResolveRequestContext<'op>) -> DiResult<T> + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            factory: Arc::new(move |ctx| factory(ctx).map(|t| Arc::new(t) as AnyArc)),
        }
    }
}

impl Activator for DelegateActivator {
    fn activate(
        &self,
        ctx: &mut ResolveRequestContext<'_>,
        _parameters: &[Arc<dyn Parameter>],
    ) -> DiResult<AnyArc> {
        (self.factory)(ctx)
    }

    fn limit_type(&self) -> &'static str {
        self.type_name
    }

    fn limit_type_id(&self) -> TypeId {
        self.type_id
    }
}

/// Hands out a pre-built instance. The instance is externally owned unless
/// the registration says otherwise.
pub struct ProvidedInstanceActivator {
    type_id: TypeId,
    type_name: &'static str,
    instance: AnyArc,
}

impl ProvidedInstanceActivator {
    pub fn new<T: Send + Sync + 'static>(instance: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            instance: Arc::new(instance),
        }
    }
}

impl Activator for ProvidedInstanceActivator {
    fn activate(
        &self,
        _ctx: &mut ResolveRequestContext<'_>,
        _parameters: &[Arc<dyn Parameter>],
    ) -> DiResult<AnyArc> {
        Ok(self.instance.clone())
    }

    fn limit_type(&self) -> &'static str {
        self.type_name
    }

    fn limit_type_id(&self) -> TypeId {
        self.type_id
    }
}
