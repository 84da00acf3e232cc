//! Shared ids, geometry, colors and the crate error type.

pub(crate) mod core;
pub(crate) mod error;
