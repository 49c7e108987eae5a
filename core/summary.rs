use indexmap::IndexMap;
#[cfg(feature = "serde_support")]
use serde::Serialize;
use std::time::{Duration, Instant};

/// Counters and stage timings for one run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "camelCase"))]
pub struct ProcessingSummary {
    /// Files that survived collection (before binary filtering).
    pub total_files: usize,
    /// Text files merged into the document.
    pub processed_files: usize,
    /// Bytes of the merged files.
    pub total_size: u64,
    pub estimated_tokens: usize,
    /// Stage name to elapsed time, in execution order.
    pub timings: IndexMap<String, Duration>,
}

impl ProcessingSummary {
    pub fn record_timing(&mut self, stage: &str, elapsed: Duration) {
        log::debug!("Stage '{}' took {:?}", stage, elapsed);
        *self.timings.entry(stage.to_string()).or_default() += elapsed;
    }

    /// Runs `f` and records its wall-clock time under `stage`.
    pub fn time<T>(&mut self, stage: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let value = f();
        self.record_timing(stage, started.elapsed());
        value
    }

    pub fn total_time(&self) -> Duration {
        self.timings.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timings_keep_stage_order_and_accumulate() {
        let mut summary = ProcessingSummary::default();
        summary.record_timing("collect", Duration::from_millis(5));
        summary.record_timing("read", Duration::from_millis(7));
        summary.record_timing("collect", Duration::from_millis(1));

        let stages: Vec<_> = summary.timings.keys().cloned().collect();
        assert_eq!(stages, vec!["collect".to_string(), "read".to_string()]);
        assert_eq!(summary.timings["collect"], Duration::from_millis(6));
        assert_eq!(summary.total_time(), Duration::from_millis(13));
    }

    #[test]
    fn time_returns_closure_value() {
        let mut summary = ProcessingSummary::default();
        let value = summary.time("tree", || 41 + 1);
        assert_eq!(value, 42);
        assert!(summary.timings.contains_key("tree"));
    }
}
