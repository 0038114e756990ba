//! Process-wide memoization of compiled constructor invokers.

use std::any::TypeId;
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::shape::{ArgList, ConstructorInvoker};

/// Invoker identity: the constructed type plus the constructor's position in
/// its shape's declaration order.
pub(crate) type InvokerKey = (TypeId, usize);

static INVOKERS: Lazy<RwLock<AHashMap<InvokerKey, Arc<ConstructorInvoker>>>> =
    Lazy::new(|| RwLock::new(AHashMap::new()));

/// Returns the memoized invoker for `key`, compiling and publishing it on
/// first use. Concurrent first callers may both run `compile`; one result
/// wins and the loser is dropped, which is fine because invokers are pure
/// wiring with no side effects.
pub(crate) fn get_or_compile<F>(key: InvokerKey, compile: F) -> Arc<ConstructorInvoker>
where
    F: FnOnce() -> ConstructorInvoker,
{
    if let Some(invoker) = INVOKERS.read().get(&key) {
        return invoker.clone();
    }
    let compiled = Arc::new(compile());
    let mut map = INVOKERS.write();
    map.entry(key).or_insert(compiled).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiResult;

    struct Probe(u8);

    fn make_invoker(tag: u8) -> ConstructorInvoker {
        Box::new(move |_args: ArgList| -> DiResult<crate::AnyBox> { Ok(Box::new(Probe(tag))) })
    }

    #[test]
    fn second_lookup_reuses_compiled_invoker() {
        let key = (TypeId::of::<Probe>(), 0);
        let first = get_or_compile(key, || make_invoker(1));
        let second = get_or_compile(key, || make_invoker(2));
        assert!(Arc::ptr_eq(&first, &second));

        let boxed = second(ArgList::default()).unwrap();
        let probe = boxed.downcast::<Probe>().unwrap();
        assert_eq!(probe.0, 1);
    }
}
