//! Clock and capture pacing utilities.
//!
//! Exports are timestamped against a monotonic epoch taken when the export
//! starts. The video backend samples its capture surface at a fixed rate;
//! the helpers here convert frame display durations into sample counts.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Monotonic clock anchored to the start of one export.
#[derive(Debug, Clone)]
pub struct ExportClock {
    epoch: Instant,
    started_at: DateTime<Utc>,
}

impl ExportClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Wall-clock time at export start.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Milliseconds elapsed since export start.
    pub fn elapsed_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Interval between two capture samples at `fps`.
pub fn capture_interval(fps: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / fps.max(1) as u64)
}

/// Number of capture samples needed to show a frame for `duration_ms`.
///
/// Every frame yields at least one sample so short frames never vanish
/// from the recording.
pub fn capture_samples(duration_ms: u64, fps: u32) -> u64 {
    let exact = duration_ms as f64 * fps.max(1) as f64 / 1000.0;
    (exact.round() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = ExportClock::start();
        assert!(clock.elapsed_ms() < 1_000);
        assert!(clock.started_at() <= Utc::now());
    }

    #[test]
    fn test_capture_interval() {
        assert_eq!(capture_interval(25), Duration::from_millis(40));
        assert_eq!(capture_interval(0), Duration::from_secs(1));
    }

    #[test]
    fn test_capture_samples() {
        assert_eq!(capture_samples(800, 30), 24);
        assert_eq!(capture_samples(1000, 30), 30);
        assert_eq!(capture_samples(50, 30), 2); // 1.5 rounds up
        assert_eq!(capture_samples(1, 30), 1); // never zero
    }
}
