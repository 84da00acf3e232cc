//! Video playback wiring and one-shot sounds.

pub(crate) mod sound;
pub(crate) mod video;
