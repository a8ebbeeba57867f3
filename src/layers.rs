//! Channel discovery and layer classification for multi-layer containers.
//!
//! A container exposes a flat list of channel names such as `beauty.R` or `crypto00.A`. The
//! classifier groups them by everything before the last `.` and keeps only the groups that carry
//! a complete `R`/`G`/`B` set, since those are the only ones a three-channel cache can be built
//! from.

pub(crate) mod classify;
pub(crate) mod source;

pub use classify::{Layer, analyze_container, classify, is_displayable};
pub use source::{ChannelEntry, ChannelSource, ExrChannelSource, FixedChannelSource, SampleKind};
