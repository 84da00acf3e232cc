//! Live node graph, the host seam, tracked template instances and teardown.

pub(crate) mod graph;
pub(crate) mod host;
pub(crate) mod instantiate;
pub(crate) mod teardown;
