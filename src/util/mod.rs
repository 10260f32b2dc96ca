//! Timing utilities shared by the `src/bin` drivers for the serial-vs-parallel
//! speedup comparisons called for in the library's design notes.

use std::collections::HashMap;

/// Accumulates named timing samples, e.g. one call to `record_timing` per
/// reduce/scan invocation, so a driver can report an average at the end.
pub struct PerformanceMonitor {
    timings: HashMap<String, Vec<std::time::Duration>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self { timings: HashMap::new() }
    }

    pub fn start_timer(&self, name: &str) -> Timer {
        Timer::new(name.to_string())
    }

    pub fn record_timing(&mut self, name: String, duration: std::time::Duration) {
        self.timings.entry(name).or_insert_with(Vec::new).push(duration);
    }

    pub fn get_stats(&self, name: &str) -> Option<TimingStats> {
        self.timings.get(name).map(|durations| {
            if durations.is_empty() {
                return TimingStats {
                    count: 0,
                    average: std::time::Duration::ZERO,
                    min: std::time::Duration::ZERO,
                    max: std::time::Duration::ZERO,
                };
            }

            let count = durations.len();
            let total: std::time::Duration = durations.iter().sum();
            let average = total / count as u32;
            let min = *durations.iter().min().unwrap();
            let max = *durations.iter().max().unwrap();

            TimingStats { count, average, min, max }
        })
    }

    pub fn clear(&mut self) {
        self.timings.clear();
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs its own elapsed time at drop, so a scope just needs
/// `let _t = monitor.start_timer("reduce");` and no explicit teardown.
pub struct Timer {
    name: String,
    start: std::time::Instant,
}

impl Timer {
    pub fn new(name: String) -> Self {
        Self { name, start: std::time::Instant::now() }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        tracing::debug!("timer '{}' finished in {:?}", self.name, self.elapsed());
    }
}

#[derive(Debug, Clone)]
pub struct TimingStats {
    pub count: usize,
    pub average: std::time::Duration,
    pub min: std::time::Duration,
    pub max: std::time::Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_are_none_for_unknown_name() {
        let monitor = PerformanceMonitor::new();
        assert!(monitor.get_stats("never recorded").is_none());
    }

    #[test]
    fn stats_average_over_recorded_samples() {
        let mut monitor = PerformanceMonitor::new();
        monitor.record_timing("reduce".to_string(), std::time::Duration::from_millis(10));
        monitor.record_timing("reduce".to_string(), std::time::Duration::from_millis(20));
        let stats = monitor.get_stats("reduce").unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.average, std::time::Duration::from_millis(15));
        assert_eq!(stats.min, std::time::Duration::from_millis(10));
        assert_eq!(stats.max, std::time::Duration::from_millis(20));
    }
}
