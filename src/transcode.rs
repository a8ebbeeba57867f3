//! Single-frame transcode contract used by the conversion pipeline.

pub(crate) mod oiiotool;
pub(crate) mod scripted;

use std::path::Path;

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::SeqResult;

pub use oiiotool::{OiioToolOpts, OiioToolTranscoder};
pub use scripted::ScriptedTranscoder;

/// One frame's worth of work: pull `layer`'s colour channels out of `source` into `dest`.
#[derive(Clone, Copy, Debug)]
pub struct FrameJob<'a> {
    pub frame: u64,
    pub source: &'a Path,
    pub dest: &'a Path,
    pub layer: &'a str,
}

impl FrameJob<'_> {
    /// `<layer>.R,<layer>.G,<layer>.B`
    pub fn channel_selection(&self) -> String {
        crate::layers::classify::rgb_selection(self.layer)
    }
}

/// How a transcode call ended when it did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Written,
    /// Cancellation fired while the frame was in flight; `dest` may be missing or partial.
    Aborted,
}

/// Converts one frame. Implementations are shared across pool workers.
///
/// Errors for a failed conversion should be [`SeqCacheError::ExternalTool`] tagged with
/// `job.frame`.
///
/// [`SeqCacheError::ExternalTool`]: crate::SeqCacheError::ExternalTool
pub trait FrameTranscoder: Send + Sync {
    fn transcode(&self, job: &FrameJob<'_>, cancel: &CancelToken) -> SeqResult<FrameStatus>;
}
