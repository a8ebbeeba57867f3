use std::fmt;
use std::time::{Duration, Instant};

/// Lower bound on the measured rate used for ETA, so early snapshots don't divide by ~0.
const MIN_RATE_FPS: f64 = 0.1;

/// Point-in-time view of a conversion run.
///
/// Snapshots are plain values; deriving figures from one never touches the live counters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressSnapshot {
    pub current_frame: u64,
    pub total_frames: u64,
    pub start_time: Instant,
}

impl ProgressSnapshot {
    pub fn new(current_frame: u64, total_frames: u64, start_time: Instant) -> Self {
        Self {
            current_frame,
            total_frames,
            start_time,
        }
    }

    pub fn percentage(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.current_frame as f64 / self.total_frames as f64 * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.total_frames > 0 && self.current_frame >= self.total_frames
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }

    pub fn frames_per_second_at(&self, now: Instant) -> f64 {
        let secs = self.elapsed_at(now).as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.current_frame as f64 / secs
    }

    pub fn eta_at(&self, now: Instant) -> Duration {
        let remaining = self.total_frames.saturating_sub(self.current_frame) as f64;
        let rate = self.frames_per_second_at(now).max(MIN_RATE_FPS);
        Duration::from_secs_f64(remaining / rate)
    }

    pub fn frames_per_second(&self) -> f64 {
        self.frames_per_second_at(Instant::now())
    }

    pub fn eta(&self) -> Duration {
        self.eta_at(Instant::now())
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let now = Instant::now();
        write!(
            f,
            "{}/{} ({:.1}%) {:.2} fps, eta {}s",
            self.current_frame,
            self.total_frames,
            self.percentage(),
            self.frames_per_second_at(now),
            self.eta_at(now).as_secs()
        )
    }
}
