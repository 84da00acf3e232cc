//! The engine and the async builders behind it.

pub(crate) mod build;
pub(crate) mod engine;
