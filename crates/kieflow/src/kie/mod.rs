//! Key information extraction: job planning, batch execution, attribution
//! of OCR boxes and dashboard metrics.

pub mod box_matcher;
pub mod job_config;
pub mod metrics;
pub mod progress;
pub mod runner;
pub mod throttle;

pub use box_matcher::{BoxMatch, BoxMatcher};
pub use job_config::{
    FileSelection, JobConfig, JobConfigBuilder, JobRequest, SkipReason, SkippedItem, WorkItem,
};
pub use metrics::{Metric, Metrics, MetricsAggregator};
pub use progress::{
    BatchEvent, BatchKind, BroadcastProgress, ItemOutcome, NoopProgress, ProgressReporter,
    ProgressTracker, TracingProgress,
};
pub use runner::{BatchReport, ItemNote, JobRunner};
pub use throttle::Throttle;

/// `round(part / whole * 100)` with ties to even, 0 when `whole` is 0.
pub(crate) fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round_ties_even() as u32
}

#[cfg(test)]
mod tests {
    use super::percentage;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 12);
        assert_eq!(percentage(4, 10), 40);
        assert_eq!(percentage(5, 5), 100);
    }
}
