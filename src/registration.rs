//! Component registrations: the immutable unit of configuration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::OnceCell;

use crate::activator::Activator;
use crate::key::ServiceKey;
use crate::lifetime::{Lifetime, Ownership, Sharing};
use crate::parameters::Parameter;
use crate::pipeline::{Pipeline, PipelinePhase, ResolveMiddleware};
use crate::AnyArc;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a registration, unique process-wide. Two registrations
/// exposing the same service are still distinct components; the resolve
/// stack and shared-instance caches key on this identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub(crate) fn next() -> Self {
        RegistrationId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        RegistrationId(raw)
    }
}

/// Mutates the parameter set of one resolve request before binding.
pub type PreparingHandler = Arc<dyn Fn(&mut Vec<Arc<dyn Parameter>>) + Send + Sync>;

/// Observes a freshly activated instance, before sharing publishes it.
pub type ActivatingHandler = Arc<dyn Fn(&AnyArc) + Send + Sync>;

/// Observes a completed instance; fired child-before-parent once the
/// outermost request of the operation has unwound successfully. A failed
/// operation fires nothing.
pub type ActivatedHandler = Arc<dyn Fn(&AnyArc) + Send + Sync>;

/// Scope-owned teardown for instances of this component.
pub type DisposeHook = Arc<dyn Fn(&AnyArc) + Send + Sync>;

/// One component registration. Immutable once the container is built; all
/// per-resolve state lives in the operation, all instance state in scopes.
pub struct ComponentRegistration {
    pub(crate) id: RegistrationId,
    pub(crate) services: Vec<ServiceKey>,
    pub(crate) activator: Arc<dyn Activator>,
    pub(crate) lifetime: Lifetime,
    pub(crate) sharing: Sharing,
    pub(crate) ownership: Ownership,
    pub(crate) parameters: Vec<Arc<dyn Parameter>>,
    pub(crate) metadata: AHashMap<&'static str, AnyArc>,
    pub(crate) preparing: Vec<PreparingHandler>,
    pub(crate) activating: Vec<ActivatingHandler>,
    pub(crate) activated: Vec<ActivatedHandler>,
    pub(crate) dispose_hook: Option<DisposeHook>,
    pub(crate) user_middleware: Vec<(PipelinePhase, Arc<dyn ResolveMiddleware>)>,
    pub(crate) startable: bool,
    // Assembled once at container build.
    pub(crate) pipeline: OnceCell<Pipeline>,
}

impl ComponentRegistration {
    /// The registration's unique identity.
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Service keys this registration fulfils.
    pub fn services(&self) -> &[ServiceKey] {
        &self.services
    }

    /// Display name of the concrete type produced.
    pub fn component_name(&self) -> &'static str {
        self.activator.limit_type()
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    pub fn sharing(&self) -> Sharing {
        self.sharing
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Typed metadata lookup.
    pub fn metadata<M: Send + Sync + 'static>(&self, key: &'static str) -> Option<Arc<M>> {
        self.metadata.get(key).and_then(|v| v.clone().downcast::<M>().ok())
    }

    pub(crate) fn pipeline(&self) -> &Pipeline {
        // Assembled exactly once during container build, before any resolve
        // can reach this registration.
        self.pipeline
            .get()
            .unwrap_or_else(|| panic!("pipeline not assembled for {}", self.component_name()))
    }
}

impl std::fmt::Debug for ComponentRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistration")
            .field("id", &self.id)
            .field("component", &self.component_name())
            .field("services", &self.services)
            .field("lifetime", &self.lifetime)
            .field("sharing", &self.sharing)
            .field("ownership", &self.ownership)
            .finish()
    }
}
