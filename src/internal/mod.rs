//! Internal implementation details.

pub(crate) mod creation;
pub(crate) mod dispose_bag;

pub(crate) use creation::CreationGuard;
pub(crate) use dispose_bag::DisposeBag;
