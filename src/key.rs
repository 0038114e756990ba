//! Service key types for registry storage and lookup.

use std::any::TypeId;

/// Key identifying a service in the component registry.
///
/// A service is either looked up by type alone, or by type plus a string
/// key when several registrations of the same type must coexist.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{ContainerBuilder, ServiceKey};
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(8080u16);
/// builder.register_keyed_instance("metrics_port", 9090u16);
/// let container = builder.build().unwrap();
///
/// assert_eq!(*container.resolve::<u16>().unwrap(), 8080);
/// assert_eq!(*container.resolve_keyed::<u16>("metrics_port").unwrap(), 9090);
/// ```
#[derive(Debug, Clone)]
pub enum ServiceKey {
    /// Concrete type key with TypeId and name for diagnostics.
    Type(TypeId, &'static str),
    /// Keyed registration: TypeId, type name, and the distinguishing key.
    Keyed(TypeId, &'static str, &'static str),
}

impl ServiceKey {
    /// Builds the unkeyed key for `T`.
    #[inline(always)]
    pub fn of<T: 'static>() -> Self {
        ServiceKey::Type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Builds the keyed key for `T` under `key`.
    #[inline(always)]
    pub fn keyed<T: 'static>(key: &'static str) -> Self {
        ServiceKey::Keyed(TypeId::of::<T>(), std::any::type_name::<T>(), key)
    }

    /// The type or trait name for display in diagnostics and errors.
    ///
    /// ```rust
    /// use lattice_di::ServiceKey;
    ///
    /// assert_eq!(ServiceKey::of::<u32>().display_name(), "u32");
    /// assert_eq!(ServiceKey::keyed::<u32>("port").display_name(), "u32");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceKey::Type(_, name) => name,
            ServiceKey::Keyed(_, name, _) => name,
        }
    }

    /// The distinguishing key for keyed registrations, `None` otherwise.
    pub fn service_key(&self) -> Option<&'static str> {
        match self {
            ServiceKey::Type(_, _) => None,
            ServiceKey::Keyed(_, _, key) => Some(key),
        }
    }

    /// The TypeId behind either variant.
    #[inline(always)]
    pub fn type_id(&self) -> TypeId {
        match self {
            ServiceKey::Type(id, _) | ServiceKey::Keyed(id, _, _) => *id,
        }
    }
}

// Hot path: compare by TypeId only, the name string is diagnostics-only.
impl PartialEq for ServiceKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ServiceKey::Type(a, _), ServiceKey::Type(b, _)) => a == b,
            (ServiceKey::Keyed(a, _, ka), ServiceKey::Keyed(b, _, kb)) => a == b && ka == kb,
            _ => false,
        }
    }
}

impl Eq for ServiceKey {}

impl std::hash::Hash for ServiceKey {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            ServiceKey::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            ServiceKey::Keyed(id, _, key) => {
                1u8.hash(state);
                id.hash(state);
                key.hash(state);
            }
        }
    }
}
