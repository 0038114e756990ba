//! Type shapes: declared constructor and property metadata.
//!
//! Rust has no runtime reflection, so activatable types describe themselves
//! as data. A [`TypeShape`] lists a type's constructors in declaration order
//! (each an ordered parameter list plus a compiled invoker) and its
//! injectable properties. Shapes are built once with [`TypeShapeBuilder`]
//! and interned process-wide; the reflection activator queries the interned
//! shape by `TypeId`.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{DiError, DiResult};
use crate::internal::invokers;
use crate::{AnyArc, AnyBox};

/// How a constructor or property slot can be filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// A dependency resolvable from the container (autowired by type).
    Service,
    /// A plain value supplied by the caller, the registration, or a
    /// declared default; never autowired.
    Value,
    /// A type the container cannot represent (raw pointers and the like).
    /// Any constructor declaring one is unbindable.
    Opaque,
}

/// One declared constructor parameter.
#[derive(Clone)]
pub struct ParameterDescriptor {
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) kind: ParameterKind,
    pub(crate) position: usize,
    pub(crate) default: Option<Arc<dyn Fn() -> AnyArc + Send + Sync>>,
}

impl ParameterDescriptor {
    /// The declared parameter name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The parameter's type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The parameter's TypeId.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// How this slot can be filled.
    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    /// Zero-based position in the constructor's parameter list.
    pub fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn default_value(&self) -> Option<AnyArc> {
        self.default.as_ref().map(|f| f())
    }
}

impl std::fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("position", &self.position)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Compiled constructor call: ordered, type-erased arguments in, boxed
/// instance out. Built once per distinct constructor and memoized
/// process-wide keyed by `(TypeId, constructor index)`.
pub type ConstructorInvoker = Box<dyn Fn(ArgList) -> DiResult<AnyBox> + Send + Sync>;

/// Ordered, type-erased argument list handed to a constructor invoker.
#[derive(Default)]
pub struct ArgList {
    values: Vec<AnyArc>,
}

impl ArgList {
    pub(crate) fn push(&mut self, value: AnyArc) {
        self.values.push(value);
    }

    /// Number of arguments supplied.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no arguments were supplied.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The service argument at `position` as a shared handle.
    pub fn service<P: Send + Sync + 'static>(&self, position: usize) -> DiResult<Arc<P>> {
        let value = self.values.get(position).ok_or(DiError::TypeMismatch {
            expected: std::any::type_name::<P>(),
        })?;
        value
            .clone()
            .downcast::<P>()
            .map_err(|_| DiError::TypeMismatch {
                expected: std::any::type_name::<P>(),
            })
    }

    /// The value argument at `position`, cloned out of its erased handle.
    pub fn value<P: Clone + Send + Sync + 'static>(&self, position: usize) -> DiResult<P> {
        self.service::<P>(position).map(|arc| arc.as_ref().clone())
    }
}

/// One declared constructor: its parameters and compiled invoker.
#[derive(Clone)]
pub struct ConstructorDescriptor {
    pub(crate) index: usize,
    pub(crate) parameters: Vec<ParameterDescriptor>,
    pub(crate) invoker: Arc<ConstructorInvoker>,
}

impl ConstructorDescriptor {
    /// Parameters in declaration order.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Position of this constructor in the shape's declaration order.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl std::fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("index", &self.index)
            .field("parameters", &self.parameters)
            .finish()
    }
}

type ErasedSetter = Arc<dyn Fn(&mut (dyn std::any::Any + Send + Sync), AnyArc) -> DiResult<()> + Send + Sync>;
type ErasedProbe = Arc<dyn Fn(&(dyn std::any::Any + Send + Sync)) -> bool + Send + Sync>;

/// One injectable property: a type-erased setter, an optional "already set"
/// probe, and whether injection failure is fatal.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) kind: ParameterKind,
    pub(crate) required: bool,
    pub(crate) setter: ErasedSetter,
    pub(crate) is_set: Option<ErasedProbe>,
}

impl PropertyDescriptor {
    /// The declared property name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The property's type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The property's TypeId.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether a missing value fails the activation.
    pub fn required(&self) -> bool {
        self.required
    }

    pub(crate) fn probe_is_set(&self, instance: &(dyn std::any::Any + Send + Sync)) -> bool {
        match &self.is_set {
            Some(probe) => probe(instance),
            None => false,
        }
    }
}

impl std::fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("required", &self.required)
            .field("probed", &self.is_set.is_some())
            .finish()
    }
}

/// Declared constructor and property metadata for one activatable type.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{TypeShapeBuilder, ContainerBuilder};
/// use std::sync::Arc;
///
/// struct Fuel;
/// struct Engine {
///     fuel: Arc<Fuel>,
///     cylinders: u32,
/// }
///
/// TypeShapeBuilder::<Engine>::new()
///     .constructor(|c| {
///         c.service::<Fuel>("fuel")
///             .value_with_default::<u32>("cylinders", 4)
///             .invoke(|args| {
///                 Ok(Engine {
///                     fuel: args.service(0)?,
///                     cylinders: args.value(1)?,
///                 })
///             })
///     })
///     .intern();
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(Fuel);
/// builder.register_type::<Engine>();
/// let container = builder.build().unwrap();
///
/// let engine = container.resolve::<Engine>().unwrap();
/// assert_eq!(engine.cylinders, 4);
/// ```
pub struct TypeShape {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) constructors: Vec<ConstructorDescriptor>,
    pub(crate) properties: Vec<PropertyDescriptor>,
}

impl TypeShape {
    /// The described type's name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The described type's TypeId.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Constructors in declaration order.
    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    /// Injectable properties in declaration order.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }
}

impl std::fmt::Debug for TypeShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeShape")
            .field("type_name", &self.type_name)
            .field("constructors", &self.constructors.len())
            .field("properties", &self.properties.len())
            .finish()
    }
}

static SHAPES: Lazy<RwLock<AHashMap<TypeId, Arc<TypeShape>>>> =
    Lazy::new(|| RwLock::new(AHashMap::new()));

/// The interned shape for `T`, if one has been declared.
pub fn lookup<T: 'static>() -> Option<Arc<TypeShape>> {
    SHAPES.read().get(&TypeId::of::<T>()).cloned()
}

pub(crate) fn lookup_by_id(type_id: TypeId) -> Option<Arc<TypeShape>> {
    SHAPES.read().get(&type_id).cloned()
}

/// Fluent builder for a type's [`TypeShape`]. See the [`TypeShape`] example.
pub struct TypeShapeBuilder<T> {
    constructors: Vec<ConstructorDescriptor>,
    properties: Vec<PropertyDescriptor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Default for TypeShapeBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> TypeShapeBuilder<T> {
    pub fn new() -> Self {
        Self {
            constructors: Vec::new(),
            properties: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares a constructor. The closure configures parameters in order
    /// and finishes with [`ConstructorBuilder::invoke`].
    pub fn constructor<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(ConstructorBuilder<T>) -> ConstructorDescriptor,
    {
        let index = self.constructors.len();
        self.constructors.push(configure(ConstructorBuilder {
            index,
            parameters: Vec::new(),
            _marker: PhantomData,
        }));
        self
    }

    /// Declares an optional service property, autowired by type after
    /// construction.
    pub fn property<P, S>(self, name: &'static str, set: S) -> Self
    where
        P: Send + Sync + 'static,
        S: Fn(&mut T, Arc<P>) + Send + Sync + 'static,
    {
        self.push_property::<P, S>(name, ParameterKind::Service, false, set, None)
    }

    /// Declares a service property whose absence fails the activation.
    pub fn required_property<P, S>(self, name: &'static str, set: S) -> Self
    where
        P: Send + Sync + 'static,
        S: Fn(&mut T, Arc<P>) + Send + Sync + 'static,
    {
        self.push_property::<P, S>(name, ParameterKind::Service, true, set, None)
    }

    /// Declares a service property with an "already set" probe. A property
    /// the probe reports as set is skipped unless the registration opts into
    /// overwriting.
    pub fn property_with_probe<P, S, Q>(self, name: &'static str, set: S, is_set: Q) -> Self
    where
        P: Send + Sync + 'static,
        S: Fn(&mut T, Arc<P>) + Send + Sync + 'static,
        Q: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let probe: ErasedProbe = Arc::new(move |instance| {
            instance.downcast_ref::<T>().map(&is_set).unwrap_or(false)
        });
        self.push_property::<P, S>(name, ParameterKind::Service, false, set, Some(probe))
    }

    /// Declares a plain-value property, fillable only through configured or
    /// caller parameters.
    pub fn value_property<P, S>(mut self, name: &'static str, set: S) -> Self
    where
        P: Clone + Send + Sync + 'static,
        S: Fn(&mut T, P) + Send + Sync + 'static,
    {
        let setter: ErasedSetter = Arc::new(move |instance, value| {
            let target = instance
                .downcast_mut::<T>()
                .ok_or(DiError::TypeMismatch {
                    expected: std::any::type_name::<T>(),
                })?;
            let value = value.downcast::<P>().map_err(|_| DiError::TypeMismatch {
                expected: std::any::type_name::<P>(),
            })?;
            set(target, value.as_ref().clone());
            Ok(())
        });
        self.properties.push(PropertyDescriptor {
            name,
            type_id: TypeId::of::<P>(),
            type_name: std::any::type_name::<P>(),
            kind: ParameterKind::Value,
            required: false,
            setter,
            is_set: None,
        });
        self
    }

    fn push_property<P, S>(
        mut self,
        name: &'static str,
        kind: ParameterKind,
        required: bool,
        set: S,
        is_set: Option<ErasedProbe>,
    ) -> Self
    where
        P: Send + Sync + 'static,
        S: Fn(&mut T, Arc<P>) + Send + Sync + 'static,
    {
        let setter: ErasedSetter = Arc::new(move |instance, value| {
            let target = instance
                .downcast_mut::<T>()
                .ok_or(DiError::TypeMismatch {
                    expected: std::any::type_name::<T>(),
                })?;
            let value = value.downcast::<P>().map_err(|_| DiError::TypeMismatch {
                expected: std::any::type_name::<P>(),
            })?;
            set(target, value);
            Ok(())
        });
        self.properties.push(PropertyDescriptor {
            name,
            type_id: TypeId::of::<P>(),
            type_name: std::any::type_name::<P>(),
            kind,
            required,
            setter,
            is_set,
        });
        self
    }

    /// Interns the shape process-wide. The first shape interned for a type
    /// wins; later calls return the existing shape.
    pub fn intern(self) -> Arc<TypeShape> {
        let shape = Arc::new(TypeShape {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            constructors: self.constructors,
            properties: self.properties,
        });
        let mut shapes = SHAPES.write();
        shapes.entry(TypeId::of::<T>()).or_insert(shape).clone()
    }
}

/// Parameter-list builder for a single constructor.
pub struct ConstructorBuilder<T> {
    index: usize,
    parameters: Vec<ParameterDescriptor>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ConstructorBuilder<T> {
    /// Declares a service parameter, autowirable by type.
    pub fn service<P: Send + Sync + 'static>(mut self, name: &'static str) -> Self {
        let position = self.parameters.len();
        self.parameters.push(ParameterDescriptor {
            name,
            type_id: TypeId::of::<P>(),
            type_name: std::any::type_name::<P>(),
            kind: ParameterKind::Service,
            position,
            default: None,
        });
        self
    }

    /// Declares a plain-value parameter with no default; a caller or the
    /// registration must supply it.
    pub fn value<P: Clone + Send + Sync + 'static>(mut self, name: &'static str) -> Self {
        let position = self.parameters.len();
        self.parameters.push(ParameterDescriptor {
            name,
            type_id: TypeId::of::<P>(),
            type_name: std::any::type_name::<P>(),
            kind: ParameterKind::Value,
            position,
            default: None,
        });
        self
    }

    /// Declares a plain-value parameter that falls back to `default` when
    /// nothing else supplies it.
    pub fn value_with_default<P: Clone + Send + Sync + 'static>(
        mut self,
        name: &'static str,
        default: P,
    ) -> Self {
        let position = self.parameters.len();
        self.parameters.push(ParameterDescriptor {
            name,
            type_id: TypeId::of::<P>(),
            type_name: std::any::type_name::<P>(),
            kind: ParameterKind::Value,
            position,
            default: Some(Arc::new(move || Arc::new(default.clone()) as AnyArc)),
        });
        self
    }

    /// Declares a parameter the container cannot supply under any
    /// configuration. Binding against this constructor fails fast.
    pub fn opaque<P: 'static>(mut self, name: &'static str) -> Self {
        let position = self.parameters.len();
        self.parameters.push(ParameterDescriptor {
            name,
            type_id: TypeId::of::<P>(),
            type_name: std::any::type_name::<P>(),
            kind: ParameterKind::Opaque,
            position,
            default: None,
        });
        self
    }

    /// Finishes the constructor with its invocation function. The invoker is
    /// compiled once and memoized process-wide by `(type, constructor index)`.
    pub fn invoke<F>(self, f: F) -> ConstructorDescriptor
    where
        F: Fn(ArgList) -> DiResult<T> + Send + Sync + 'static,
    {
        let invoker = invokers::get_or_compile((TypeId::of::<T>(), self.index), move || {
            Box::new(move |args: ArgList| f(args).map(|t| Box::new(t) as AnyBox))
        });
        ConstructorDescriptor {
            index: self.index,
            parameters: self.parameters,
            invoker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget {
        size: u32,
    }

    #[test]
    fn interning_is_first_wins() {
        let first = TypeShapeBuilder::<Widget>::new()
            .constructor(|c| {
                c.value_with_default::<u32>("size", 3)
                    .invoke(|args| Ok(Widget { size: args.value(0)? }))
            })
            .intern();
        let second = TypeShapeBuilder::<Widget>::new().intern();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.constructors().len(), 1);
    }

    #[test]
    fn arglist_downcasts_by_position() {
        let mut args = ArgList::default();
        args.push(Arc::new(7u32) as AnyArc);
        assert_eq!(args.value::<u32>(0).unwrap(), 7);
        assert!(args.value::<u64>(0).is_err());
        assert!(args.service::<u32>(1).is_err());
    }
}
