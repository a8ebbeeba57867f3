use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use command_group::{CommandGroup, GroupChild};

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{SeqCacheError, SeqResult};
use crate::transcode::{FrameJob, FrameStatus, FrameTranscoder};

/// Options for [`OiioToolTranscoder`].
#[derive(Clone, Debug)]
pub struct OiioToolOpts {
    /// Program to spawn; looked up on `PATH` when not absolute.
    pub program: PathBuf,
    /// Thread-count hint passed to each invocation.
    pub threads: usize,
    /// How often an in-flight child is checked for exit or cancellation.
    pub poll_interval: Duration,
}

impl Default for OiioToolOpts {
    fn default() -> Self {
        Self {
            program: PathBuf::from("oiiotool"),
            threads: 1,
            poll_interval: Duration::from_millis(20),
        }
    }
}

impl OiioToolOpts {
    pub fn validate(&self) -> SeqResult<()> {
        if self.program.as_os_str().is_empty() {
            return Err(SeqCacheError::config("transcode program must be non-empty"));
        }
        if self.threads == 0 {
            return Err(SeqCacheError::config("transcode threads must be >= 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(SeqCacheError::config(
                "transcode poll interval must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Runs one `oiiotool` process per frame.
///
/// When cancellation fires while a child is running, the child is killed and reaped rather than
/// left to finish on its own.
#[derive(Clone, Debug)]
pub struct OiioToolTranscoder {
    opts: OiioToolOpts,
}

impl OiioToolTranscoder {
    pub fn new(opts: OiioToolOpts) -> SeqResult<Self> {
        opts.validate()?;
        Ok(Self { opts })
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.opts.program)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    pub(crate) fn command(&self, job: &FrameJob<'_>) -> Command {
        let mut cmd = Command::new(&self.opts.program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args(["--threads", &self.opts.threads.to_string(), "--native", "--scanline"])
            .arg(job.source)
            .args(["--ch", &job.channel_selection(), "--chnames", "R,G,B", "-o"])
            .arg(job.dest);
        cmd
    }
}

impl FrameTranscoder for OiioToolTranscoder {
    fn transcode(&self, job: &FrameJob<'_>, cancel: &CancelToken) -> SeqResult<FrameStatus> {
        // Spawned as its own process group so wrapper scripts take their workers down with them.
        let mut child = self.command(job).group_spawn().map_err(|e| {
            SeqCacheError::external_tool(
                job.frame,
                format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    self.opts.program.display()
                ),
            )
        })?;

        let Some(mut stderr) = child.inner().stderr.take() else {
            kill_group(&mut child);
            return Err(SeqCacheError::external_tool(
                job.frame,
                "failed to open stderr (unexpected)",
            ));
        };
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok::<_, std::io::Error>(stderr_bytes)
        });

        let status = loop {
            if cancel.is_cancelled() {
                kill_group(&mut child);
                // Detached; the drain thread exits once the pipe closes.
                drop(stderr_drain);
                tracing::debug!(frame = job.frame, "killed in-flight transcode on cancel");
                return Ok(FrameStatus::Aborted);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => std::thread::sleep(self.opts.poll_interval),
                Err(e) => {
                    kill_group(&mut child);
                    drop(stderr_drain);
                    return Err(SeqCacheError::external_tool(
                        job.frame,
                        format!("failed to wait for transcode: {e}"),
                    ));
                }
            }
        };

        let stderr_bytes = stderr_drain
            .join()
            .map_err(|_| SeqCacheError::external_tool(job.frame, "stderr drain thread panicked"))?
            .map_err(|e| SeqCacheError::external_tool(job.frame, format!("stderr read failed: {e}")))?;

        if !status.success() {
            return Err(SeqCacheError::external_tool(
                job.frame,
                format!(
                    "'{}' exited with {status}: {}",
                    self.opts.program.display(),
                    String::from_utf8_lossy(&stderr_bytes).trim()
                ),
            ));
        }
        Ok(FrameStatus::Written)
    }
}

/// Kill every process in the child's group and reap the leader.
fn kill_group(child: &mut GroupChild) {
    // kill() fails only if the group is already gone; wait() reaps the leader either way.
    let _ = child.kill();
    let _ = child.wait();
}
