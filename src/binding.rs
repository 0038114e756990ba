//! Constructor binding: matching declared parameters against suppliers.

use crate::error::{DiError, DiResult};
use crate::operation::ResolveRequestContext;
use crate::parameters::{Parameter, ValueRetriever};
use crate::shape::{ArgList, ConstructorDescriptor, ParameterKind};
use crate::AnyBox;

pub(crate) enum BindOutcome {
    Bound(Vec<ValueRetriever>),
    Failed(String),
}

/// Result of binding one constructor candidate: either a complete set of
/// deferred argument retrievers, or the reason the candidate is unusable.
///
/// Binding never activates anything; retrievers run only when the selected
/// candidate is instantiated.
pub struct BoundConstructor {
    pub(crate) constructor: ConstructorDescriptor,
    pub(crate) outcome: BindOutcome,
}

impl BoundConstructor {
    /// Whether every parameter found a supplier.
    pub fn is_bound(&self) -> bool {
        matches!(self.outcome, BindOutcome::Bound(_))
    }

    /// The candidate's parameter count.
    pub fn arity(&self) -> usize {
        self.constructor.parameters().len()
    }

    /// Why binding failed, if it did.
    pub fn failure(&self) -> Option<&str> {
        match &self.outcome {
            BindOutcome::Failed(reason) => Some(reason),
            BindOutcome::Bound(_) => None,
        }
    }

    /// Human-readable candidate signature for diagnostics.
    pub fn description(&self) -> String {
        let params: Vec<String> = self
            .constructor
            .parameters()
            .iter()
            .map(|p| format!("{}: {}", p.name(), p.type_name()))
            .collect();
        format!("constructor #{}({})", self.constructor.index(), params.join(", "))
    }

    /// Runs the retrievers in declaration order and invokes the constructor.
    ///
    /// Instantiating an unbound candidate is a caller defect: selection must
    /// filter to bound candidates first.
    pub(crate) fn instantiate(
        self,
        component: &'static str,
        ctx: &mut ResolveRequestContext<'_>,
    ) -> DiResult<AnyBox> {
        let retrievers = match self.outcome {
            BindOutcome::Bound(retrievers) => retrievers,
            BindOutcome::Failed(reason) => {
                panic!("attempted to instantiate unbound constructor of {component}: {reason}")
            }
        };

        let mut args = ArgList::default();
        for retriever in retrievers {
            args.push(retriever(ctx)?);
        }

        (self.constructor.invoker)(args).map_err(|err| match err {
            DiError::ScopeDisposed => DiError::ScopeDisposed,
            other => DiError::ActivationFailed {
                component,
                source: std::sync::Arc::new(other),
            },
        })
    }
}

/// Binds a constructor candidate against the prioritized supplier chain.
///
/// Fail-fast rules: a parameter of unrepresentable kind fails the whole
/// candidate immediately, and the first parameter no supplier can fill ends
/// the attempt without probing the rest.
pub(crate) fn bind(
    constructor: &ConstructorDescriptor,
    suppliers: &[&dyn Parameter],
    ctx: &ResolveRequestContext<'_>,
) -> BoundConstructor {
    let parameters = constructor.parameters();

    // Zero-parameter fast path.
    if parameters.is_empty() {
        return BoundConstructor {
            constructor: constructor.clone(),
            outcome: BindOutcome::Bound(Vec::new()),
        };
    }

    let mut retrievers = Vec::with_capacity(parameters.len());
    for param in parameters {
        if param.kind() == ParameterKind::Opaque {
            return BoundConstructor {
                constructor: constructor.clone(),
                outcome: BindOutcome::Failed(format!(
                    "parameter `{}` ({}) is not representable",
                    param.name(),
                    param.type_name()
                )),
            };
        }
        match suppliers.iter().find_map(|s| s.can_supply(param, ctx)) {
            Some(retriever) => retrievers.push(retriever),
            None => {
                return BoundConstructor {
                    constructor: constructor.clone(),
                    outcome: BindOutcome::Failed(format!(
                        "cannot supply parameter `{}` ({})",
                        param.name(),
                        param.type_name()
                    )),
                };
            }
        }
    }

    BoundConstructor {
        constructor: constructor.clone(),
        outcome: BindOutcome::Bound(retrievers),
    }
}
