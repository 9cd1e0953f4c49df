pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod kie;
pub mod llm;
pub mod model;
pub mod ocr;
pub mod pipeline;
pub mod secrets;
pub mod service;
pub mod session;
pub mod storage;
pub mod store;

pub use config::{load_config, load_config_from_str, Config};
pub use error::{
    CollaboratorError, ConfigError, KieflowError, ResolutionError, Result, SchemaError,
    StorageError,
};
pub use kie::{
    BatchReport, BoxMatch, BoxMatcher, FileSelection, JobConfig, JobConfigBuilder, JobRequest,
    JobRunner, Metrics, MetricsAggregator, ProgressReporter, ProgressTracker, SkipReason, WorkItem,
};
pub use llm::{ChatExtractor, Extractor};
pub use model::{ExtractedFields, FileRecord, FileStatus, PipelineRecord, ResultRecord, ResultStatus};
pub use ocr::{BoundingBox, HttpOcrClient, OcrBox, OcrDocument, OcrEngine};
pub use pipeline::{ExtractionSchema, PipelineDraft};
pub use service::{AttributionView, Highlight, UploadReport, Workspace};
pub use session::{Session, SessionStore};
pub use store::{LocalStore, Snapshot, Store};
