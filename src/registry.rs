//! Component registry with copy-on-write scope overlays.

use std::sync::Arc;

use ahash::AHashMap;

use crate::error::DiResult;
use crate::key::ServiceKey;
use crate::operation::ResolveRequestContext;
use crate::registration::ComponentRegistration;
use crate::AnyArc;

/// Wraps an activated instance in a decorated replacement.
pub type DecoratorFn =
    Arc<dyn for<'op> Fn(AnyArc, &mut ResolveRequestContext<'op>) -> DiResult<AnyArc> + Send + Sync>;

/// Read-only registration lookup for one scope.
///
/// The root registry holds everything the container was built with; a scope
/// created with extra registrations gets a local overlay pointing at its
/// parent's registry. Lookups walk local-first so scope-local registrations
/// shadow inherited ones, while enumeration preserves global registration
/// order (inherited first).
pub struct ComponentRegistry {
    parent: Option<Arc<ComponentRegistry>>,
    by_service: AHashMap<ServiceKey, Vec<Arc<ComponentRegistration>>>,
    decorators: AHashMap<ServiceKey, Vec<DecoratorFn>>,
    locals: Vec<Arc<ComponentRegistration>>,
}

impl ComponentRegistry {
    pub(crate) fn new(
        parent: Option<Arc<ComponentRegistry>>,
        registrations: Vec<Arc<ComponentRegistration>>,
        decorators: AHashMap<ServiceKey, Vec<DecoratorFn>>,
    ) -> Self {
        let mut by_service: AHashMap<ServiceKey, Vec<Arc<ComponentRegistration>>> =
            AHashMap::new();
        for registration in &registrations {
            for service in registration.services() {
                by_service
                    .entry(service.clone())
                    .or_default()
                    .push(registration.clone());
            }
        }
        Self {
            parent,
            by_service,
            decorators,
            locals: registrations,
        }
    }

    /// The default registration for a service: the last one registered,
    /// nearest overlay first.
    pub fn default_registration(&self, key: &ServiceKey) -> Option<Arc<ComponentRegistration>> {
        if let Some(local) = self.by_service.get(key).and_then(|regs| regs.last()) {
            return Some(local.clone());
        }
        self.parent.as_ref()?.default_registration(key)
    }

    /// Every registration for a service, in registration order (inherited
    /// registrations first).
    pub fn registrations_for(&self, key: &ServiceKey) -> Vec<Arc<ComponentRegistration>> {
        let mut all = match &self.parent {
            Some(parent) => parent.registrations_for(key),
            None => Vec::new(),
        };
        if let Some(local) = self.by_service.get(key) {
            all.extend(local.iter().cloned());
        }
        all
    }

    /// Whether any registration fulfils the service.
    pub fn is_registered(&self, key: &ServiceKey) -> bool {
        self.by_service.contains_key(key)
            || self.parent.as_ref().is_some_and(|p| p.is_registered(key))
    }

    /// Decorators for a service, outermost-registered last (application
    /// order: inherited first, then local).
    pub(crate) fn decorators_for(&self, key: &ServiceKey) -> Vec<DecoratorFn> {
        let mut all = match &self.parent {
            Some(parent) => parent.decorators_for(key),
            None => Vec::new(),
        };
        if let Some(local) = self.decorators.get(key) {
            all.extend(local.iter().cloned());
        }
        all
    }

    /// Registrations added at this overlay level only.
    pub(crate) fn local_registrations(&self) -> &[Arc<ComponentRegistration>] {
        &self.locals
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("local_services", &self.by_service.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
