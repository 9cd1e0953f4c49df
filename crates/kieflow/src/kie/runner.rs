//! Sequential OCR and extraction batches.
//!
//! A failing item is recorded and the batch moves on. Progress is reported
//! after every finished item.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use super::job_config::JobConfig;
use super::progress::{
    BatchEvent, BatchKind, ItemOutcome, NoopProgress, ProgressReporter, ProgressTracker,
};
use super::throttle::Throttle;
use crate::error::{CollaboratorError, KieflowError, ResolutionError, Result};
use crate::llm::Extractor;
use crate::ocr::{is_supported_image, OcrEngine};
use crate::pipeline::ExtractionSchema;
use crate::store::Store;

/// An item that was not processed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemNote {
    pub item: String,
    pub reason: String,
}

impl ItemNote {
    fn new(item: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            item: item.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: Vec<String>,
    pub skipped: Vec<ItemNote>,
    pub failed: Vec<ItemNote>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// One-line summary, e.g. `3 processed, 1 skipped, 0 failed`.
    pub fn summary(&self) -> String {
        format!(
            "{} processed, {} skipped, {} failed",
            self.processed.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}

enum Outcome {
    Processed,
    Skipped(String),
    Failed(String),
}

impl From<std::result::Result<(), KieflowError>> for Outcome {
    fn from(result: std::result::Result<(), KieflowError>) -> Self {
        match result {
            Ok(()) => Outcome::Processed,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

/// Runs batches against the store and the OCR and extraction services.
pub struct JobRunner {
    store: Arc<dyn Store>,
    ocr: Arc<dyn OcrEngine>,
    extractor: Arc<dyn Extractor>,
    reporter: Arc<dyn ProgressReporter>,
    min_interval: Duration,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn Store>,
        ocr: Arc<dyn OcrEngine>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            store,
            ocr,
            extractor,
            reporter: Arc::new(NoopProgress),
            min_interval: Duration::ZERO,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Minimum delay between two service calls.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Runs OCR over the given storage paths and stores the output.
    ///
    /// Unknown paths and files that are not images are skipped.
    pub async fn run_ocr(&self, filepaths: &[String]) -> Result<BatchReport> {
        let snapshot = self.store.snapshot()?;
        let kind = BatchKind::Ocr;
        let mut report = BatchReport::default();
        let mut tracker = ProgressTracker::new(filepaths.len());
        let mut throttle = Throttle::new(self.min_interval);

        self.reporter.report(BatchEvent::Started {
            kind,
            total: filepaths.len(),
        });

        async {
            for filepath in filepaths {
                let outcome = match snapshot.file_by_name(filepath) {
                    None => Outcome::Skipped(
                        ResolutionError::UnknownFile(filepath.clone()).to_string(),
                    ),
                    Some(_) if !is_supported_image(filepath) => {
                        Outcome::Skipped(format!("{} is not an image", filepath))
                    }
                    Some(file) => {
                        throttle.wait().await;
                        self.ocr_one(&file.id, filepath).await.into()
                    }
                };
                self.finish_item(kind, filepath, outcome, &mut tracker, &mut report);
            }
        }
        .instrument(info_span!("batch.ocr", total = filepaths.len()))
        .await;

        info!("OCR batch done: {}", report.summary());
        self.reporter.report(BatchEvent::Finished {
            kind,
            report: report.clone(),
        });
        Ok(report)
    }

    async fn ocr_one(&self, file_id: &str, filepath: &str) -> Result<()> {
        let bytes = self.store.download_file(filepath)?;
        let document = self.ocr.perform_ocr(&bytes).await?;
        let text = document.reconstruct_text();
        self.store.create_ocr_result(file_id, &document, &text)?;
        Ok(())
    }

    /// Extracts every work item and stores the results.
    ///
    /// Items already skipped by the job configuration are carried into the
    /// report. Each pipeline's schema is looked up once.
    pub async fn run_kie(&self, job: &JobConfig) -> Result<BatchReport> {
        let snapshot = self.store.snapshot()?;
        let kind = BatchKind::Kie;
        let total = job.work_items.len();
        let mut report = BatchReport::default();
        let mut tracker = ProgressTracker::new(total);
        let mut throttle = Throttle::new(self.min_interval);

        report.skipped.extend(job.skipped.iter().map(|s| {
            ItemNote::new(format!("{} / {}", s.filepath, s.pipeline_name), s.reason)
        }));

        let mut schemas: HashMap<&str, &ExtractionSchema> = HashMap::new();
        for item in &job.work_items {
            if let Some(pipeline) = snapshot.pipeline_by_id(&item.pipeline_id) {
                schemas.entry(item.pipeline_id.as_str()).or_insert(&pipeline.config);
            }
        }

        self.reporter.report(BatchEvent::Started { kind, total });

        async {
            for item in &job.work_items {
                let label = format!("{} / {}", item.filepath, item.pipeline_name);
                let text = snapshot
                    .file_by_id(&item.file_id)
                    .and_then(|f| f.ocr_text.as_deref())
                    .filter(|t| !t.trim().is_empty());

                let outcome = match (schemas.get(item.pipeline_id.as_str()), text) {
                    (None, _) => Outcome::Failed(
                        ResolutionError::UnknownPipeline(item.pipeline_name.clone()).to_string(),
                    ),
                    (Some(_), None) => Outcome::Skipped(
                        CollaboratorError::MissingOcrText(item.filepath.clone()).to_string(),
                    ),
                    (Some(schema), Some(text)) => {
                        throttle.wait().await;
                        self.kie_one(schema, text, &item.file_id, &item.pipeline_id)
                            .await
                            .into()
                    }
                };
                self.finish_item(kind, &label, outcome, &mut tracker, &mut report);
            }
        }
        .instrument(info_span!("batch.kie", total))
        .await;

        info!("KIE batch done: {}", report.summary());
        self.reporter.report(BatchEvent::Finished {
            kind,
            report: report.clone(),
        });
        Ok(report)
    }

    async fn kie_one(
        &self,
        schema: &ExtractionSchema,
        text: &str,
        file_id: &str,
        pipeline_id: &str,
    ) -> Result<()> {
        let fields = self.extractor.extract(schema, text).await?;
        self.store.create_llm_result(file_id, pipeline_id, &fields)?;
        Ok(())
    }

    fn finish_item(
        &self,
        kind: BatchKind,
        label: &str,
        outcome: Outcome,
        tracker: &mut ProgressTracker,
        report: &mut BatchReport,
    ) {
        let outcome = match outcome {
            Outcome::Processed => {
                report.processed.push(label.to_string());
                ItemOutcome::Processed
            }
            Outcome::Skipped(reason) => {
                info!("Skipping {}: {}", label, reason);
                report.skipped.push(ItemNote::new(label, reason));
                ItemOutcome::Skipped
            }
            Outcome::Failed(reason) => {
                warn!("{} failed for {}: {}", kind, label, reason);
                report.failed.push(ItemNote::new(label, reason));
                ItemOutcome::Failed
            }
        };

        tracker.increment();
        self.reporter.report(BatchEvent::ItemFinished {
            kind,
            label: label.to_string(),
            outcome,
            progress: tracker.progress(),
            total: tracker.total(),
            percentage: tracker.percentage(),
        });
    }
}
