use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{SeqCacheError, SeqResult};
use crate::transcode::{FrameJob, FrameStatus, FrameTranscoder};

type StartHook = Box<dyn Fn(u64) + Send + Sync>;

/// In-process stand-in for the external tool.
///
/// Records every frame it is asked to convert, can fail chosen frames, sleep to simulate work,
/// and writes a small placeholder file on success so cache contents can be inspected.
#[derive(Default)]
pub struct ScriptedTranscoder {
    fail_frames: HashSet<u64>,
    delay: Duration,
    on_start: Option<StartHook>,
    calls: Mutex<Vec<u64>>,
}

impl ScriptedTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `frame` exit as if the tool returned a nonzero status.
    pub fn fail_on(mut self, frame: u64) -> Self {
        self.fail_frames.insert(frame);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `hook` with the frame number as each call starts, before the simulated work.
    pub fn on_start(mut self, hook: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Frames in the order their calls started.
    pub fn calls(&self) -> Vec<u64> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FrameTranscoder for ScriptedTranscoder {
    fn transcode(&self, job: &FrameJob<'_>, cancel: &CancelToken) -> SeqResult<FrameStatus> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job.frame);
        if let Some(hook) = &self.on_start {
            hook(job.frame);
        }

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if cancel.is_cancelled() {
            return Ok(FrameStatus::Aborted);
        }
        if self.fail_frames.contains(&job.frame) {
            return Err(SeqCacheError::external_tool(
                job.frame,
                "scripted failure (exit status 1)",
            ));
        }

        std::fs::write(job.dest, job.channel_selection())
            .map_err(|e| SeqCacheError::file_access(job.dest, e.to_string()))?;
        Ok(FrameStatus::Written)
    }
}
