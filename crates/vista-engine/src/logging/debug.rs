//! Throttled sink for GPU driver messages.
//!
//! Messages are counted per id. The first 10 occurrences of an id are logged,
//! then every 10th up to 100, then every 100th.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Severity reported with a driver message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DebugSeverity {
    High,
    Medium,
    Low,
    Notification,
}

impl DebugSeverity {
    pub fn level(self) -> log::Level {
        match self {
            DebugSeverity::High => log::Level::Error,
            DebugSeverity::Medium => log::Level::Warn,
            DebugSeverity::Low => log::Level::Info,
            DebugSeverity::Notification => log::Level::Debug,
        }
    }
}

/// Origin of a driver message.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DebugSource {
    /// Uncaptured device error (validation, out of memory, internal).
    Device,
    /// Shader module compilation.
    ShaderCompiler,
    /// Device lost notification.
    DeviceLost,
    /// Messages emitted by the render core itself.
    Application,
}

/// Outcome of counting one message.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ThrottleDecision {
    Log { count: u64 },
    Suppress { count: u64 },
}

impl ThrottleDecision {
    pub fn is_logged(self) -> bool {
        matches!(self, ThrottleDecision::Log { .. })
    }
}

/// Returns whether the `count`-th occurrence (1-based) of an id is logged.
#[inline]
pub(crate) fn should_log(count: u64) -> bool {
    match count {
        0..=10 => true,
        11..=100 => count % 10 == 0,
        _ => count % 100 == 0,
    }
}

/// Derives a stable message id from its text.
pub(crate) fn message_id(source: DebugSource, text: &str) -> u64 {
    let mut h = DefaultHasher::new();
    (source as u8).hash(&mut h);
    text.hash(&mut h);
    h.finish()
}

/// Per-id counting message log shared with the device error callback.
#[derive(Debug, Default)]
pub struct DebugMessageLog {
    counters: Mutex<HashMap<u64, u64>>,

    /// High severity messages since the last `take_pending_errors`.
    pending_errors: AtomicU64,
}

impl DebugMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one message and forwards it to the log when the throttle allows.
    pub fn record(&self, source: DebugSource, severity: DebugSeverity, text: &str) -> ThrottleDecision {
        let id = message_id(source, text);
        let count = {
            let mut counters = self.counters.lock();
            let c = counters.entry(id).or_insert(0);
            *c += 1;
            *c
        };

        if severity == DebugSeverity::High {
            self.pending_errors.fetch_add(1, Ordering::Relaxed);
        }

        if !should_log(count) {
            return ThrottleDecision::Suppress { count };
        }

        log::log!(
            target: "vista::gpu",
            severity.level(),
            "gpu {source:?}: {text} (id={id:016x}, count={count})"
        );
        ThrottleDecision::Log { count }
    }

    /// Number of times a message has been seen.
    pub fn count(&self, source: DebugSource, text: &str) -> u64 {
        let id = message_id(source, text);
        self.counters.lock().get(&id).copied().unwrap_or(0)
    }

    /// Returns and resets the high severity counter.
    pub fn take_pending_errors(&self) -> u64 {
        self.pending_errors.swap(0, Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.counters.lock().clear();
        self.pending_errors.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged_counts(n: u64) -> Vec<u64> {
        let log = DebugMessageLog::new();
        (0..n)
            .filter_map(|_| match log.record(DebugSource::Device, DebugSeverity::Medium, "same") {
                ThrottleDecision::Log { count } => Some(count),
                ThrottleDecision::Suppress { .. } => None,
            })
            .collect()
    }

    // ── throttle policy ───────────────────────────────────────────────────

    #[test]
    fn first_ten_are_logged() {
        assert_eq!(logged_counts(10), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn every_tenth_up_to_one_hundred() {
        let counts = logged_counts(100);
        assert_eq!(counts.len(), 10 + 9);
        assert_eq!(&counts[10..], &[20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn every_hundredth_after() {
        let counts = logged_counts(1000);
        assert_eq!(&counts[19..], &[200, 300, 400, 500, 600, 700, 800, 900, 1000]);
    }

    #[test]
    fn ids_are_counted_independently() {
        let log = DebugMessageLog::new();
        for _ in 0..15 {
            log.record(DebugSource::Device, DebugSeverity::Low, "a");
        }
        let first_b = log.record(DebugSource::Device, DebugSeverity::Low, "b");
        assert_eq!(first_b, ThrottleDecision::Log { count: 1 });
        assert_eq!(log.count(DebugSource::Device, "a"), 15);
        assert_eq!(log.count(DebugSource::ShaderCompiler, "a"), 0);
    }

    // ── severity ──────────────────────────────────────────────────────────

    #[test]
    fn severity_maps_to_levels() {
        assert_eq!(DebugSeverity::High.level(), log::Level::Error);
        assert_eq!(DebugSeverity::Medium.level(), log::Level::Warn);
        assert_eq!(DebugSeverity::Low.level(), log::Level::Info);
        assert_eq!(DebugSeverity::Notification.level(), log::Level::Debug);
    }

    #[test]
    fn pending_errors_count_high_severity_only() {
        let log = DebugMessageLog::new();
        log.record(DebugSource::Device, DebugSeverity::High, "x");
        log.record(DebugSource::Device, DebugSeverity::Medium, "y");
        log.record(DebugSource::Device, DebugSeverity::High, "x");
        assert_eq!(log.take_pending_errors(), 2);
        assert_eq!(log.take_pending_errors(), 0);
    }
}
