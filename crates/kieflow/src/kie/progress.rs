use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use super::percentage;
use super::runner::BatchReport;

/// Completed-item counter for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTracker {
    progress: usize,
    total: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self { progress: 0, total }
    }

    /// Advances by one and returns the new count.
    pub fn increment(&mut self) -> usize {
        self.progress += 1;
        self.progress
    }

    pub fn progress(&self) -> usize {
        self.progress
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Rounded percentage of completed items, 0 for an empty batch.
    pub fn percentage(&self) -> u32 {
        percentage(self.progress, self.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Ocr,
    Kie,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Ocr => write!(f, "OCR"),
            BatchKind::Kie => write!(f, "KIE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Processed,
    Skipped,
    Failed,
}

/// Events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        kind: BatchKind,
        total: usize,
    },
    ItemFinished {
        kind: BatchKind,
        label: String,
        outcome: ItemOutcome,
        progress: usize,
        total: usize,
        percentage: u32,
    },
    Finished {
        kind: BatchKind,
        report: BatchReport,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: BatchEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: BatchEvent) {}
}

/// Logs each event through `tracing`.
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, event: BatchEvent) {
        match event {
            BatchEvent::Started { kind, total } => {
                tracing::info!(%kind, total, "batch started");
            }
            BatchEvent::ItemFinished {
                kind,
                label,
                outcome,
                progress,
                total,
                percentage,
            } => {
                tracing::info!(
                    %kind,
                    item = %label,
                    ?outcome,
                    "{}/{} ({}%)",
                    progress,
                    total,
                    percentage
                );
            }
            BatchEvent::Finished { kind, report } => {
                tracing::info!(
                    %kind,
                    processed = report.processed.len(),
                    skipped = report.skipped.len(),
                    failed = report.failed.len(),
                    "batch finished"
                );
            }
        }
    }
}

/// Forwards events to a broadcast channel. Send errors (no subscribers) are ignored.
pub struct BroadcastProgress {
    sender: Arc<broadcast::Sender<BatchEvent>>,
}

impl BroadcastProgress {
    pub fn new(sender: Arc<broadcast::Sender<BatchEvent>>) -> Self {
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: BatchEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counts_increments() {
        let mut tracker = ProgressTracker::new(7);
        for expected in 1..=5 {
            assert_eq!(tracker.increment(), expected);
        }
        assert_eq!(tracker.progress(), 5);
        assert_eq!(tracker.total(), 7);
    }

    #[test]
    fn test_percentage_rounds_to_nearest() {
        let mut tracker = ProgressTracker::new(3);
        tracker.increment();
        assert_eq!(tracker.percentage(), 33);
        tracker.increment();
        assert_eq!(tracker.percentage(), 67);
        tracker.increment();
        assert_eq!(tracker.percentage(), 100);
    }

    #[test]
    fn test_empty_batch_is_zero_percent() {
        assert_eq!(ProgressTracker::new(0).percentage(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_progress_delivers_events() {
        let (tx, _) = broadcast::channel(8);
        let reporter = BroadcastProgress::new(Arc::new(tx));
        let mut rx = reporter.subscribe();

        reporter.report(BatchEvent::Started {
            kind: BatchKind::Ocr,
            total: 2,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            BatchEvent::Started {
                kind: BatchKind::Ocr,
                total: 2
            }
        );
    }

    #[test]
    fn test_broadcast_without_subscribers_does_not_panic() {
        let (tx, rx) = broadcast::channel(1);
        drop(rx);
        BroadcastProgress::new(Arc::new(tx)).report(BatchEvent::Started {
            kind: BatchKind::Kie,
            total: 0,
        });
    }
}
