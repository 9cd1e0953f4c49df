//! The operations behind every user-facing action.
//!
//! Each call reads a fresh snapshot of the tables, so decisions such as
//! "already processed" always see the latest state.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::Config;
use crate::error::{ResolutionError, Result};
use crate::export;
use crate::kie::{
    BatchReport, BoxMatch, BoxMatcher, FileSelection, JobConfig, JobConfigBuilder, JobRequest,
    JobRunner, Metrics, MetricsAggregator, NoopProgress, ProgressReporter,
};
use crate::llm::{ChatExtractor, Extractor};
use crate::model::{ExtractedFields, FileRecord, PipelineRecord, ResultRecord};
use crate::ocr::{HttpOcrClient, OcrEngine};
use crate::pipeline::{ExtractionSchema, PipelineDraft};
use crate::session::SessionStore;
use crate::store::{LocalStore, Snapshot, Store};

/// Outcome of an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<FileRecord>,
    /// Storage paths that already existed and were left alone.
    pub skipped: Vec<String>,
}

/// Extracted fields of one `(file, pipeline)` pair with the OCR boxes that
/// support them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributionView {
    pub file: String,
    pub pipeline: String,
    /// Extracted fields sorted by name.
    pub fields: Vec<(String, String)>,
    pub matches: BoxMatch,
    /// Rectangles to draw over the page images, one per matched box.
    pub highlights: Vec<Highlight>,
    /// Base64 page renderings by page number.
    pub page_images: BTreeMap<u32, String>,
}

/// An axis-aligned rectangle around a matched box, labelled with its field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    pub page: u32,
    pub field: String,
    pub text: String,
    /// `(min_x, min_y, max_x, max_y)` in page pixels.
    pub bounds: (f64, f64, f64, f64),
}

impl Highlight {
    fn from_matches(matches: &BoxMatch) -> Vec<Highlight> {
        matches
            .filtered_boxes
            .iter()
            .flat_map(|(page, boxes)| boxes.iter().map(move |b| (*page, b)))
            .filter_map(|(page, ocr_box)| {
                matches.field_for(&ocr_box.text).map(|field| Highlight {
                    page,
                    field: field.to_string(),
                    text: ocr_box.text.clone(),
                    bounds: ocr_box.bounding_box.bounds(),
                })
            })
            .collect()
    }
}

pub struct Workspace {
    store: Arc<dyn Store>,
    ocr: Arc<dyn OcrEngine>,
    extractor: Arc<dyn Extractor>,
    reporter: Arc<dyn ProgressReporter>,
    min_interval: Duration,
    sessions: SessionStore,
}

impl Workspace {
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
            sessions: SessionStore::from_config(&Default::default()),
        }
    }

    /// Local storage plus the HTTP services named by the config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = LocalStore::open(config)?;
        let ocr = HttpOcrClient::new(&config.ocr)?;
        let extractor = ChatExtractor::new(&config.llm)?;

        let mut workspace = Self::new(Arc::new(store), Arc::new(ocr), Arc::new(extractor));
        workspace.min_interval = Duration::from_millis(config.batch.min_interval_ms);
        workspace.sessions = SessionStore::from_config(&config.session);
        Ok(workspace)
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        self.store.snapshot()
    }

    fn runner(&self) -> JobRunner {
        JobRunner::new(
            Arc::clone(&self.store),
            Arc::clone(&self.ocr),
            Arc::clone(&self.extractor),
        )
        .with_reporter(Arc::clone(&self.reporter))
        .with_min_interval(self.min_interval)
    }

    // Files

    /// Uploads `(filename, bytes)` pairs. Names that already exist in storage,
    /// or repeat within the batch, are skipped.
    pub fn upload_files<'a, I>(&self, uploads: I) -> Result<UploadReport>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let snapshot = self.store.snapshot()?;
        let mut taken: HashSet<String> = snapshot.files.into_iter().map(|f| f.name).collect();
        let mut report = UploadReport::default();

        for (filename, content) in uploads {
            let object_path = self.store.object_path(filename);
            if !taken.insert(object_path.clone()) {
                log::info!("Skipping upload of existing file {}", object_path);
                report.skipped.push(object_path);
                continue;
            }
            report.uploaded.push(self.store.upload_file(filename, content)?);
        }
        Ok(report)
    }

    /// Deletes files by storage path. All paths are resolved before anything
    /// is deleted.
    pub fn delete_files(&self, filepaths: &[String]) -> Result<usize> {
        let snapshot = self.store.snapshot()?;
        let ids = filepaths
            .iter()
            .map(|path| {
                snapshot
                    .file_by_name(path)
                    .map(|f| f.id.clone())
                    .ok_or_else(|| ResolutionError::UnknownFile(path.clone()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for id in &ids {
            self.store.delete_file(id)?;
        }
        Ok(ids.len())
    }

    /// The selected files as one ZIP archive, entries named by filename.
    pub fn download_zip(&self, filepaths: &[String]) -> Result<Vec<u8>> {
        let snapshot = self.store.snapshot()?;
        let mut entries = Vec::with_capacity(filepaths.len());
        for path in filepaths {
            let file = snapshot
                .file_by_name(path)
                .ok_or_else(|| ResolutionError::UnknownFile(path.clone()))?;
            entries.push((file.filename().to_string(), self.store.download_file(path)?));
        }
        export::create_zip(
            entries
                .iter()
                .map(|(name, bytes)| (name.as_str(), bytes.as_slice())),
        )
    }

    // Pipelines

    fn pipeline_named(&self, name: &str) -> Result<PipelineRecord> {
        self.store
            .list_pipelines()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ResolutionError::UnknownPipeline(name.to_string()).into())
    }

    pub fn save_pipeline(&self, draft: &PipelineDraft) -> Result<PipelineRecord> {
        let (name, schema) = draft.build()?;
        self.store.create_pipeline(&name, &schema, None)
    }

    /// Applies an edit form to an existing pipeline.
    pub fn update_pipeline(
        &self,
        pipeline_id: &str,
        draft: &PipelineDraft,
    ) -> Result<PipelineRecord> {
        let (name, schema) = draft.build()?;
        self.store.update_pipeline_name_by_id(pipeline_id, &name)?;
        self.store.update_config_by_id(pipeline_id, &schema)?;
        self.store
            .list_pipelines()?
            .into_iter()
            .find(|p| p.id == pipeline_id)
            .ok_or_else(|| ResolutionError::UnknownPipeline(pipeline_id.to_string()).into())
    }

    /// Saves the session's new-pipeline form and clears it.
    pub fn save_session_pipeline(&self, session_id: &str) -> Result<PipelineRecord> {
        let draft = self
            .sessions
            .with_session(session_id, |s| s.new_pipeline().clone())
            .ok_or_else(|| ResolutionError::UnknownSession(session_id.to_string()))?;
        let record = self.save_pipeline(&draft)?;
        self.sessions
            .with_session(session_id, |s| s.new_pipeline().reset());
        Ok(record)
    }

    /// Saves the session's edit form of a pipeline and drops the form.
    pub fn save_session_edit(
        &self,
        session_id: &str,
        pipeline_id: &str,
    ) -> Result<PipelineRecord> {
        let pipeline = self
            .store
            .list_pipelines()?
            .into_iter()
            .find(|p| p.id == pipeline_id)
            .ok_or_else(|| ResolutionError::UnknownPipeline(pipeline_id.to_string()))?;
        let draft = self
            .sessions
            .with_session(session_id, |s| s.edit_draft(&pipeline).clone())
            .ok_or_else(|| ResolutionError::UnknownSession(session_id.to_string()))?;
        let record = self.update_pipeline(pipeline_id, &draft)?;
        self.sessions
            .with_session(session_id, |s| s.discard_edit(pipeline_id));
        Ok(record)
    }

    pub fn rename_pipeline(&self, name: &str, new_name: &str) -> Result<PipelineRecord> {
        let pipeline = self.pipeline_named(name)?;
        self.store.update_pipeline_name_by_id(&pipeline.id, new_name)?;
        self.pipeline_named(new_name.trim())
    }

    pub fn set_pipeline_config(&self, name: &str, schema_json: &str) -> Result<PipelineRecord> {
        let pipeline = self.pipeline_named(name)?;
        let schema = ExtractionSchema::from_json(schema_json)?;
        self.store.update_config_by_id(&pipeline.id, &schema)?;
        self.pipeline_named(name)
    }

    pub fn delete_pipeline(&self, name: &str) -> Result<()> {
        let pipeline = self.pipeline_named(name)?;
        self.store.delete_pipeline(&pipeline.id)
    }

    pub fn search_pipelines(&self, query: &str) -> Result<Vec<PipelineRecord>> {
        self.store.search_pipelines(query)
    }

    // Batches

    pub async fn run_ocr(&self, filepaths: &[String]) -> Result<BatchReport> {
        self.runner().run_ocr(filepaths).await
    }

    /// OCR over every file that has no OCR output yet.
    pub async fn run_ocr_unprocessed(&self) -> Result<BatchReport> {
        let pending: Vec<String> = self
            .store
            .list_files()?
            .into_iter()
            .filter(|f| !f.has_ocr())
            .map(|f| f.name)
            .collect();
        self.run_ocr(&pending).await
    }

    /// Builds a request pairing the selected files with `pipelines`.
    pub fn select_for_kie(
        &self,
        selection: &FileSelection,
        pipelines: &[String],
    ) -> Result<JobRequest> {
        let snapshot = self.store.snapshot()?;
        Ok(selection.request(&snapshot, pipelines.iter().cloned()))
    }

    pub fn plan_kie(&self, requests: &[JobRequest]) -> Result<JobConfig> {
        let snapshot = self.store.snapshot()?;
        Ok(JobConfigBuilder::from_snapshot(&snapshot).build(requests))
    }

    pub async fn run_kie(&self, requests: &[JobRequest]) -> Result<BatchReport> {
        let job = self.plan_kie(requests)?;
        self.runner().run_kie(&job).await
    }

    // Results

    pub fn metrics(&self) -> Result<Metrics> {
        let snapshot = self.store.snapshot()?;
        Ok(MetricsAggregator::compute(
            &snapshot.files,
            &snapshot.pipelines,
            &snapshot.results,
        ))
    }

    fn result_for(
        &self,
        snapshot: &Snapshot,
        pipeline: &str,
        filepath: &str,
    ) -> Result<(FileRecord, PipelineRecord, ResultRecord)> {
        let file = snapshot
            .file_by_name(filepath)
            .ok_or_else(|| ResolutionError::UnknownFile(filepath.to_string()))?;
        let pipeline_record = snapshot
            .pipeline_by_name(pipeline)
            .ok_or_else(|| ResolutionError::UnknownPipeline(pipeline.to_string()))?;
        let result = self
            .store
            .find_result(&file.id, &pipeline_record.id)?
            .ok_or_else(|| ResolutionError::UnknownResult {
                file: filepath.to_string(),
                pipeline: pipeline.to_string(),
            })?;
        Ok((file.clone(), pipeline_record.clone(), result))
    }

    /// Which OCR boxes of `filepath` support the fields `pipeline` extracted.
    pub fn attribution(&self, pipeline: &str, filepath: &str) -> Result<AttributionView> {
        let snapshot = self.store.snapshot()?;
        let (file, pipeline_record, result) = self.result_for(&snapshot, pipeline, filepath)?;
        let extracted = result.llm_json.ok_or_else(|| ResolutionError::UnknownResult {
            file: filepath.to_string(),
            pipeline: pipeline.to_string(),
        })?;

        let (boxes, page_images) = file
            .ocr_json
            .as_ref()
            .map(|doc| (doc.boxes_by_page(), doc.page_images()))
            .unwrap_or_default();
        let matches = BoxMatcher::match_extraction(&boxes, &pipeline_record.config, &extracted);
        let highlights = Highlight::from_matches(&matches);

        let mut fields: Vec<(String, String)> = extracted.into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(AttributionView {
            file: file.name,
            pipeline: pipeline_record.name,
            fields,
            matches,
            highlights,
            page_images,
        })
    }

    pub fn export_results(&self) -> Result<String> {
        let snapshot = self.store.snapshot()?;
        export::export_results(&snapshot.files, &snapshot.pipelines, &snapshot.results)
    }

    /// Stores a reviewed version of a result and marks it completed.
    pub fn record_validation(
        &self,
        pipeline: &str,
        filepath: &str,
        corrected: &ExtractedFields,
        score: Option<f64>,
    ) -> Result<()> {
        let snapshot = self.store.snapshot()?;
        let (_, _, result) = self.result_for(&snapshot, pipeline, filepath)?;
        self.store.record_validation(&result.id, corrected, score)
    }
}
