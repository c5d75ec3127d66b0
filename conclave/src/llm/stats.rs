use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Time-to-first-chunk measurement the gateway exposes, tracked against a
/// first-chunk-within-500ms target.
#[derive(Default)]
pub struct TtfcStats {
    count: AtomicU64,
    sum_millis: AtomicU64,
    max_millis: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TtfcSnapshot {
    pub count: u64,
    pub mean_millis: f64,
    pub max_millis: u64,
}

impl TtfcStats {
    pub fn record(&self, latency: Duration) {
        let millis = latency.as_millis() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_millis.fetch_add(millis, Ordering::Relaxed);
        self.max_millis.fetch_max(millis, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TtfcSnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let sum = self.sum_millis.load(Ordering::Relaxed);
        let mean_millis = if count == 0 { 0.0 } else { sum as f64 / count as f64 };
        TtfcSnapshot { count, mean_millis, max_millis: self.max_millis.load(Ordering::Relaxed) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_max_reflect_recorded_samples() {
        let stats = TtfcStats::default();
        stats.record(Duration::from_millis(100));
        stats.record(Duration::from_millis(300));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.mean_millis, 200.0);
        assert_eq!(snapshot.max_millis, 300);
    }
}
