//! Cooperative cancellation.

pub(crate) mod cancel;
