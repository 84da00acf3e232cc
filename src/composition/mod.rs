//! Declarative inputs: element specs and global settings.

pub(crate) mod model;
pub(crate) mod settings;
