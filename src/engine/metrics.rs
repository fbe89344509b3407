use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Number of memory peaks kept for [`MetricsSnapshot::recent_memory_peaks`].
pub const RECENT_PEAKS: usize = 20;

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    errors: u64,
    total_duration: Duration,
    peaks: VecDeque<u64>,
    last_analysis: Option<DateTime<Utc>>,
}

/// Running counters for one engine instance.
///
/// Each update happens under one short lock, so concurrent analyses never
/// interleave a read-modify-write.
#[derive(Debug, Default)]
pub struct Metrics {
    counters: Mutex<Counters>,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_analyzed: u64,
    pub total_errors: u64,
    /// `total_errors / total_analyzed`, 0 before the first analysis
    pub error_rate: f64,
    pub average_duration_ms: f64,
    /// Oldest first
    pub recent_memory_peaks: Vec<u64>,
    pub last_analysis: Option<DateTime<Utc>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, duration: Duration, success: bool, memory_peak: u64) {
        let mut c = self.counters.lock();
        c.total += 1;
        if !success {
            c.errors += 1;
        }
        c.total_duration += duration;
        if c.peaks.len() == RECENT_PEAKS {
            c.peaks.pop_front();
        }
        c.peaks.push_back(memory_peak);
        c.last_analysis = Some(Utc::now());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = self.counters.lock();
        let (error_rate, average_duration_ms) = if c.total == 0 {
            (0.0, 0.0)
        } else {
            (
                c.errors as f64 / c.total as f64,
                c.total_duration.as_secs_f64() * 1000.0 / c.total as f64,
            )
        };
        MetricsSnapshot {
            total_analyzed: c.total,
            total_errors: c.errors,
            error_rate,
            average_duration_ms,
            recent_memory_peaks: c.peaks.iter().copied().collect(),
            last_analysis: c.last_analysis,
        }
    }

    pub fn reset(&self) {
        *self.counters.lock() = Counters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_and_error_rate() {
        let metrics = Metrics::new();
        metrics.record(Duration::from_millis(10), true, 100);
        metrics.record(Duration::from_millis(30), false, 200);
        let snap = metrics.snapshot();
        assert_eq!(snap.total_analyzed, 2);
        assert_eq!(snap.total_errors, 1);
        assert_eq!(snap.error_rate, 0.5);
        assert!((snap.average_duration_ms - 20.0).abs() < 1e-9);
        assert_eq!(snap.recent_memory_peaks, vec![100, 200]);
        assert!(snap.last_analysis.is_some());
    }

    #[test]
    fn test_peaks_are_bounded() {
        let metrics = Metrics::new();
        for i in 0..(RECENT_PEAKS as u64 + 5) {
            metrics.record(Duration::ZERO, true, i);
        }
        let peaks = metrics.snapshot().recent_memory_peaks;
        assert_eq!(peaks.len(), RECENT_PEAKS);
        assert_eq!(peaks[0], 5);
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record(Duration::from_millis(5), false, 1);
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
