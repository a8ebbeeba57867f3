//! seqcache turns a numbered multi-layer EXR sequence into a cached single-layer sequence.
//!
//! Typical flow:
//!
//! - [`analyze_container`] one frame to list its displayable [`Layer`]s
//! - [`resolve`] the sequence pattern from that frame's path
//! - [`Pipeline::run`] (or [`Pipeline::run_to_cache`]) to convert every frame of the chosen
//!   layer, with [`CacheLocator`] deciding where the frames land
#![forbid(unsafe_code)]

mod foundation;

pub mod cache;
pub mod layers;
pub mod pipeline;
pub mod progress;
pub mod sequence;
pub mod transcode;

pub use crate::foundation::cancel::CancelToken;
pub use crate::foundation::error::{SeqCacheError, SeqResult};

pub use crate::cache::{CacheConfig, CacheLocator, frame_file_name};
pub use crate::layers::{
    ChannelEntry, ChannelSource, ExrChannelSource, FixedChannelSource, Layer, SampleKind,
    analyze_container, classify, is_displayable,
};
pub use crate::pipeline::{Pipeline, PipelineOpts, RunOutcome, RunSummary};
pub use crate::progress::ProgressSnapshot;
pub use crate::sequence::{FrameNumber, SequenceDescriptor, frame_number, resolve};
pub use crate::transcode::{
    FrameJob, FrameStatus, FrameTranscoder, OiioToolOpts, OiioToolTranscoder, ScriptedTranscoder,
};
