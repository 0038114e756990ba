//! Internal implementation details.

pub(crate) mod disposer;
pub(crate) mod invokers;
pub(crate) mod stack;

pub(crate) use disposer::Disposer;
pub(crate) use stack::SegmentedStack;
