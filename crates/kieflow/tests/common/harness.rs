//! Workspace over an in-memory database and a temporary object store.

#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use kieflow::{ExtractionSchema, LocalStore, PipelineRecord, Workspace};

use super::fakes::{FakeExtractor, FakeOcr, RecordingProgress};

pub const BUCKET: &str = "kyc-files";

pub struct TestHarness {
    _temp_dir: TempDir,
    pub store: Arc<LocalStore>,
    pub ocr: Arc<FakeOcr>,
    pub extractor: Arc<FakeExtractor>,
    pub progress: Arc<RecordingProgress>,
    pub workspace: Workspace,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_extractor(FakeExtractor::default())
    }

    pub fn with_extractor(extractor: FakeExtractor) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(
            LocalStore::in_memory(temp_dir.path(), BUCKET).expect("Failed to open store"),
        );
        let ocr = Arc::new(FakeOcr::default());
        let extractor = Arc::new(extractor);
        let progress = Arc::new(RecordingProgress::default());

        let workspace = Workspace::new(store.clone(), ocr.clone(), extractor.clone())
            .with_reporter(progress.clone());

        Self {
            _temp_dir: temp_dir,
            store,
            ocr,
            extractor,
            progress,
            workspace,
        }
    }

    /// Uploads a file and returns its storage path.
    pub fn upload(&self, filename: &str, content: &str) -> String {
        let report = self
            .workspace
            .upload_files([(filename, content.as_bytes())])
            .expect("Failed to upload");
        report.uploaded[0].name.clone()
    }

    pub fn pipeline(&self, name: &str, fields: &[(&str, &str)]) -> PipelineRecord {
        use kieflow::Store;
        self.store
            .create_pipeline(name, &ExtractionSchema::from_pairs(fields.iter().copied()), None)
            .expect("Failed to create pipeline")
    }

    pub fn object_path(filename: &str) -> String {
        format!("{}/{}", BUCKET, filename)
    }
}
