//! Constructor selection policies.

use std::any::TypeId;

use crate::binding::BoundConstructor;
use crate::error::{DiError, DiResult};

/// Picks the winning constructor among successfully bound candidates.
///
/// Selectors only ever see candidates that bound completely; activation
/// fails before selection when nothing binds.
pub trait ConstructorSelector: Send + Sync {
    /// Selects exactly one candidate or explains why it cannot.
    fn select(
        &self,
        component: &'static str,
        candidates: Vec<BoundConstructor>,
    ) -> DiResult<BoundConstructor>;
}

/// Default policy: the candidate with the most parameters wins; a tie for
/// the longest list is an error rather than an arbitrary pick.
pub struct MostParameters;

impl ConstructorSelector for MostParameters {
    fn select(
        &self,
        component: &'static str,
        candidates: Vec<BoundConstructor>,
    ) -> DiResult<BoundConstructor> {
        let max = candidates.iter().map(|c| c.arity()).max().unwrap_or(0);
        let mut at_max = candidates.into_iter().filter(|c| c.arity() == max);
        let winner = at_max.next().ok_or(DiError::NoConstructors { component })?;
        if at_max.next().is_some() {
            return Err(DiError::AmbiguousConstructor {
                component,
                arity: max,
            });
        }
        Ok(winner)
    }
}

/// Selects the single candidate whose parameter types match a fixed
/// signature, in order.
///
/// # Examples
///
/// ```rust
/// use lattice_di::{ContainerBuilder, MatchingSignature, TypeShapeBuilder};
/// use std::sync::Arc;
///
/// struct Port(u16);
/// struct Listener { port: u16 }
///
/// TypeShapeBuilder::<Listener>::new()
///     .constructor(|c| c.invoke(|_| Ok(Listener { port: 0 })))
///     .constructor(|c| {
///         c.service::<Port>("port")
///             .invoke(|args| Ok(Listener { port: args.service::<Port>(0)?.0 }))
///     })
///     .intern();
///
/// let mut builder = ContainerBuilder::new();
/// builder.register_instance(Port(4000));
/// builder
///     .register_type::<Listener>()
///     .with_selector(MatchingSignature::new().param::<Port>());
/// let container = builder.build().unwrap();
///
/// assert_eq!(container.resolve::<Listener>().unwrap().port, 4000);
/// ```
#[derive(Default)]
pub struct MatchingSignature {
    signature: Vec<TypeId>,
}

impl MatchingSignature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the next parameter type to the required signature.
    pub fn param<P: 'static>(mut self) -> Self {
        self.signature.push(TypeId::of::<P>());
        self
    }
}

impl ConstructorSelector for MatchingSignature {
    fn select(
        &self,
        component: &'static str,
        candidates: Vec<BoundConstructor>,
    ) -> DiResult<BoundConstructor> {
        let mut matching = candidates.into_iter().filter(|c| {
            c.constructor.parameters().len() == self.signature.len()
                && c.constructor
                    .parameters()
                    .iter()
                    .zip(&self.signature)
                    .all(|(p, want)| p.type_id() == *want)
        });
        let winner = matching.next().ok_or(DiError::SignatureMismatch { component })?;
        if matching.next().is_some() {
            return Err(DiError::AmbiguousConstructor {
                component,
                arity: self.signature.len(),
            });
        }
        Ok(winner)
    }
}
