//! Keyed, deduplicated asset loading.

pub(crate) mod cache;
pub(crate) mod source;
