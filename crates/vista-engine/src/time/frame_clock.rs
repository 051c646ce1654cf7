use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time since the previous tick, in seconds (clamped).
    pub dt: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Clock ticked once per rendered frame.
///
/// Also tracks achieved frame rate over a reporting window so the render loop
/// can report when it falls behind its target.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_max: Duration,

    window_start: Instant,
    window_frames: u32,
    report_every: Duration,
}

/// Achieved rate over one reporting window.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameRateReport {
    pub frames: u32,
    pub elapsed: Duration,
}

impl FrameRateReport {
    pub fn fps(&self) -> f32 {
        let secs = self.elapsed.as_secs_f32();
        if secs <= 0.0 { 0.0 } else { self.frames as f32 / secs }
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_report_interval(Duration::from_secs(5))
    }

    pub fn with_report_interval(report_every: Duration) -> Self {
        let now = Instant::now();
        Self {
            last: now,
            frame_index: 0,
            dt_max: Duration::from_millis(250),
            window_start: now,
            window_frames: 0,
            report_every,
        }
    }

    /// Resets the baseline, e.g. when the render loop resumes after a stop.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.last = now;
        self.window_start = now;
        self.window_frames = 0;
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Advances the clock.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last).min(self.dt_max);
        self.last = now;

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        self.window_frames = self.window_frames.saturating_add(1);
        ft
    }

    /// Returns the finished reporting window, if one elapsed, and starts the next.
    pub fn take_report(&mut self) -> Option<FrameRateReport> {
        let elapsed = self.last.saturating_duration_since(self.window_start);
        if elapsed < self.report_every {
            return None;
        }
        let report = FrameRateReport {
            frames: self.window_frames,
            elapsed,
        };
        self.window_start = self.last;
        self.window_frames = 0;
        Some(report)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_counts_frames() {
        let mut c = FrameClock::new();
        assert_eq!(c.tick().frame_index, 0);
        assert_eq!(c.tick().frame_index, 1);
        assert_eq!(c.frame_index(), 2);
    }

    #[test]
    fn report_waits_for_window() {
        let mut c = FrameClock::with_report_interval(Duration::from_secs(60));
        c.tick();
        assert!(c.take_report().is_none());
    }

    #[test]
    fn report_after_window_elapsed() {
        let mut c = FrameClock::with_report_interval(Duration::from_millis(20));
        c.tick();
        std::thread::sleep(Duration::from_millis(25));
        c.tick();
        let r = c.take_report().unwrap();
        assert_eq!(r.frames, 2);
        assert!(r.fps() > 0.0);
        assert!(c.take_report().is_none());
    }
}
