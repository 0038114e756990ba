//! Resolve tracing hooks.

use std::sync::Arc;

/// Observes resolve activity. All methods default to no-ops so a tracer
/// implements only what it cares about. Tracers are advisory: nothing they
/// observe or skip changes resolution behavior.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{ContainerBuilder, ResolveTracer};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct CountingTracer {
///     requests: AtomicUsize,
/// }
///
/// impl ResolveTracer for CountingTracer {
///     fn request_start(&self, _service: &'static str, _depth: usize) {
///         self.requests.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let tracer = Arc::new(CountingTracer::default());
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(5u32);
/// builder.add_tracer(tracer.clone());
/// let container = builder.build().unwrap();
///
/// let _ = container.resolve::<u32>().unwrap();
/// assert_eq!(tracer.requests.load(Ordering::Relaxed), 1);
/// ```
pub trait ResolveTracer: Send + Sync {
    /// A top-level resolve operation began.
    fn operation_start(&self, service: &'static str) {
        let _ = service;
    }

    /// The operation finished; fires exactly once per operation.
    fn operation_end(&self, service: &'static str, success: bool) {
        let _ = (service, success);
    }

    /// A request (one registration activation attempt) was pushed.
    fn request_start(&self, service: &'static str, depth: usize) {
        let _ = (service, depth);
    }

    /// The request unwound.
    fn request_end(&self, service: &'static str, success: bool) {
        let _ = (service, success);
    }

    /// A pipeline stage is about to run.
    fn middleware_enter(&self, service: &'static str, stage: &'static str) {
        let _ = (service, stage);
    }

    /// A pipeline stage returned.
    fn middleware_exit(&self, service: &'static str, stage: &'static str) {
        let _ = (service, stage);
    }
}

/// Installed tracer set. Empty by default; every emit site checks
/// [`Tracers::is_empty`] first so the common untraced path costs one branch.
#[derive(Clone)]
pub(crate) struct Tracers {
    inner: Arc<[Arc<dyn ResolveTracer>]>,
}

impl Tracers {
    pub(crate) fn new(tracers: Vec<Arc<dyn ResolveTracer>>) -> Self {
        Self {
            inner: tracers.into(),
        }
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub(crate) fn operation_start(&self, service: &'static str) {
        for t in self.inner.iter() {
            t.operation_start(service);
        }
    }

    pub(crate) fn operation_end(&self, service: &'static str, success: bool) {
        for t in self.inner.iter() {
            t.operation_end(service, success);
        }
    }

    pub(crate) fn request_start(&self, service: &'static str, depth: usize) {
        for t in self.inner.iter() {
            t.request_start(service, depth);
        }
    }

    pub(crate) fn request_end(&self, service: &'static str, success: bool) {
        for t in self.inner.iter() {
            t.request_end(service, success);
        }
    }

    pub(crate) fn middleware_enter(&self, service: &'static str, stage: &'static str) {
        for t in self.inner.iter() {
            t.middleware_enter(service, stage);
        }
    }

    pub(crate) fn middleware_exit(&self, service: &'static str, stage: &'static str) {
        for t in self.inner.iter() {
            t.middleware_exit(service, stage);
        }
    }
}

impl Default for Tracers {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Built-in tracer that emits `tracing` events at debug and trace level.
///
/// ```rust
/// use lattice_di::{ContainerBuilder, LoggingTracer};
/// use std::sync::Arc;
///
/// let mut builder = ContainerBuilder::new();
/// builder.add_tracer(Arc::new(LoggingTracer));
/// ```
pub struct LoggingTracer;

impl ResolveTracer for LoggingTracer {
    fn operation_start(&self, service: &'static str) {
        tracing::debug!(service, "resolve operation started");
    }

    fn operation_end(&self, service: &'static str, success: bool) {
        tracing::debug!(service, success, "resolve operation ended");
    }

    fn request_start(&self, service: &'static str, depth: usize) {
        tracing::trace!(service, depth, "resolve request started");
    }

    fn request_end(&self, service: &'static str, success: bool) {
        tracing::trace!(service, success, "resolve request ended");
    }

    fn middleware_enter(&self, service: &'static str, stage: &'static str) {
        tracing::trace!(service, stage, "entering pipeline stage");
    }

    fn middleware_exit(&self, service: &'static str, stage: &'static str) {
        tracing::trace!(service, stage, "exiting pipeline stage");
    }
}
