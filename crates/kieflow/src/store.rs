//! Storage and table service used by the workflow.
//!
//! [`Store`] is the seam between the workflow and persistence. [`LocalStore`]
//! keeps rows in SQLite and file bytes in a directory-backed object store.

use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{file_repo, pipeline_repo, result_repo, Database};
use crate::error::{KieflowError, ResolutionError, Result, SchemaError};
use crate::model::{
    ExtractedFields, FileRecord, FileStatus, PipelineRecord, ResultRecord, ResultStatus,
};
use crate::ocr::OcrDocument;
use crate::pipeline::ExtractionSchema;
use crate::storage::ObjectStorage;

/// Point-in-time copy of the three tables.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub files: Vec<FileRecord>,
    pub pipelines: Vec<PipelineRecord>,
    pub results: Vec<ResultRecord>,
}

impl Snapshot {
    pub fn file_by_name(&self, name: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn file_by_id(&self, id: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn pipeline_by_name(&self, name: &str) -> Option<&PipelineRecord> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    pub fn pipeline_by_id(&self, id: &str) -> Option<&PipelineRecord> {
        self.pipelines.iter().find(|p| p.id == id)
    }
}

pub trait Store: Send + Sync {
    fn list_files(&self) -> Result<Vec<FileRecord>>;
    fn list_pipelines(&self) -> Result<Vec<PipelineRecord>>;
    fn list_results(&self) -> Result<Vec<ResultRecord>>;

    fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            files: self.list_files()?,
            pipelines: self.list_pipelines()?,
            results: self.list_results()?,
        })
    }

    /// The storage path (`bucket/filename`) an upload of `filename` gets.
    fn object_path(&self, filename: &str) -> String;

    fn upload_file(&self, filename: &str, content: &[u8]) -> Result<FileRecord>;
    fn download_file(&self, object_path: &str) -> Result<Vec<u8>>;
    /// Deletes the file, its stored bytes and its results.
    fn delete_file(&self, file_id: &str) -> Result<()>;

    fn create_ocr_result(
        &self,
        file_id: &str,
        ocr_json: &OcrDocument,
        ocr_text: &str,
    ) -> Result<FileRecord>;

    /// Stores an extraction and marks the file as used. Returns the result id.
    fn create_llm_result(
        &self,
        file_id: &str,
        pipeline_id: &str,
        fields: &ExtractedFields,
    ) -> Result<String>;

    fn create_pipeline(
        &self,
        name: &str,
        config: &ExtractionSchema,
        prompt: Option<&str>,
    ) -> Result<PipelineRecord>;
    fn update_pipeline_name_by_id(&self, pipeline_id: &str, name: &str) -> Result<()>;
    fn update_config_by_id(&self, pipeline_id: &str, config: &ExtractionSchema) -> Result<()>;
    /// Deletes the pipeline and its results.
    fn delete_pipeline(&self, pipeline_id: &str) -> Result<()>;
    fn search_pipelines(&self, query: &str) -> Result<Vec<PipelineRecord>>;

    fn find_result(&self, file_id: &str, pipeline_id: &str) -> Result<Option<ResultRecord>>;
    fn record_validation(
        &self,
        result_id: &str,
        corrected: &ExtractedFields,
        corrected_score: Option<f64>,
    ) -> Result<()>;
}

pub struct LocalStore {
    db: Database,
    objects: ObjectStorage,
}

impl LocalStore {
    pub fn new(db: Database, objects: ObjectStorage) -> Self {
        Self { db, objects }
    }

    /// Opens the database and object store named by the config.
    pub fn open(config: &Config) -> Result<Self> {
        let db_path = config.database_path().ok_or_else(|| {
            KieflowError::Config(crate::error::ConfigError::Validation {
                message: "Cannot determine database path: no home directory".to_string(),
            })
        })?;
        let db = Database::open(&db_path)?;
        let objects = ObjectStorage::new(config.storage.root_path(), &config.storage.bucket);
        Ok(Self::new(db, objects))
    }

    /// In-memory database with objects under `root`.
    pub fn in_memory<P: AsRef<Path>>(root: P, bucket: &str) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::new(db, ObjectStorage::new(root, bucket)))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn require_pipeline(&self, pipeline_id: &str) -> Result<PipelineRecord> {
        pipeline_repo::find_by_id(&self.db, pipeline_id)?
            .ok_or_else(|| ResolutionError::UnknownPipeline(pipeline_id.to_string()).into())
    }

    fn ensure_name_free(&self, name: &str, except_id: Option<&str>) -> Result<()> {
        match pipeline_repo::find_by_name(&self.db, name)? {
            Some(existing) if Some(existing.id.as_str()) != except_id => {
                Err(SchemaError::PipelineNameTaken(name.to_string()).into())
            }
            _ => Ok(()),
        }
    }
}

fn validated_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SchemaError::EmptyPipelineName.into());
    }
    Ok(name.to_string())
}

impl Store for LocalStore {
    fn list_files(&self) -> Result<Vec<FileRecord>> {
        Ok(file_repo::list_all(&self.db)?)
    }

    fn list_pipelines(&self) -> Result<Vec<PipelineRecord>> {
        Ok(pipeline_repo::list_all(&self.db)?)
    }

    fn list_results(&self) -> Result<Vec<ResultRecord>> {
        Ok(result_repo::list_all(&self.db)?)
    }

    fn object_path(&self, filename: &str) -> String {
        self.objects.object_path(filename)
    }

    fn upload_file(&self, filename: &str, content: &[u8]) -> Result<FileRecord> {
        let name = self.objects.put(filename, content)?;
        let record = FileRecord {
            id: Uuid::new_v4().to_string(),
            name,
            created_at: Utc::now(),
            ocr_json: None,
            ocr_text: None,
            storage_id: Uuid::new_v4().to_string(),
            status: FileStatus::Unused,
        };

        if let Err(e) = file_repo::insert(&self.db, &record) {
            // Keep storage and table in step.
            if let Err(cleanup) = self.objects.remove(&record.name) {
                log::warn!("Failed to remove orphaned object {}: {}", record.name, cleanup);
            }
            return Err(e.into());
        }

        log::info!("Uploaded {}", record.name);
        Ok(record)
    }

    fn download_file(&self, object_path: &str) -> Result<Vec<u8>> {
        Ok(self.objects.get(object_path)?)
    }

    fn delete_file(&self, file_id: &str) -> Result<()> {
        let file = file_repo::find_by_id(&self.db, file_id)?
            .ok_or_else(|| ResolutionError::UnknownFile(file_id.to_string()))?;
        file_repo::delete(&self.db, file_id)?;
        if let Err(e) = self.objects.remove(&file.name) {
            log::warn!("Deleted {} but its stored object remains: {}", file.name, e);
        }
        log::info!("Deleted {}", file.name);
        Ok(())
    }

    fn create_ocr_result(
        &self,
        file_id: &str,
        ocr_json: &OcrDocument,
        ocr_text: &str,
    ) -> Result<FileRecord> {
        if !file_repo::update_ocr(&self.db, file_id, ocr_json, ocr_text)? {
            return Err(ResolutionError::UnknownFile(file_id.to_string()).into());
        }
        file_repo::find_by_id(&self.db, file_id)?
            .ok_or_else(|| ResolutionError::UnknownFile(file_id.to_string()).into())
    }

    fn create_llm_result(
        &self,
        file_id: &str,
        pipeline_id: &str,
        fields: &ExtractedFields,
    ) -> Result<String> {
        if file_repo::find_by_id(&self.db, file_id)?.is_none() {
            return Err(ResolutionError::UnknownFile(file_id.to_string()).into());
        }
        self.require_pipeline(pipeline_id)?;

        let record = ResultRecord {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            pipeline_id: pipeline_id.to_string(),
            file_id: file_id.to_string(),
            llm_json: Some(fields.clone()),
            llm_score: None,
            status: ResultStatus::PendingValidation,
            corrected: None,
            corrected_score: None,
        };
        result_repo::insert(&self.db, &record)?;
        file_repo::update_status(&self.db, file_id, FileStatus::Used)?;
        Ok(record.id)
    }

    fn create_pipeline(
        &self,
        name: &str,
        config: &ExtractionSchema,
        prompt: Option<&str>,
    ) -> Result<PipelineRecord> {
        let name = validated_name(name)?;
        config.validate()?;
        self.ensure_name_free(&name, None)?;

        let record = PipelineRecord {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            name,
            config: config.clone(),
            prompt: prompt.map(str::to_string),
        };
        pipeline_repo::insert(&self.db, &record)?;
        log::info!("Created pipeline '{}' with {} fields", record.name, config.len());
        Ok(record)
    }

    fn update_pipeline_name_by_id(&self, pipeline_id: &str, name: &str) -> Result<()> {
        let name = validated_name(name)?;
        self.require_pipeline(pipeline_id)?;
        self.ensure_name_free(&name, Some(pipeline_id))?;
        pipeline_repo::update_name(&self.db, pipeline_id, &name)?;
        Ok(())
    }

    fn update_config_by_id(&self, pipeline_id: &str, config: &ExtractionSchema) -> Result<()> {
        config.validate()?;
        if !pipeline_repo::update_config(&self.db, pipeline_id, config)? {
            return Err(ResolutionError::UnknownPipeline(pipeline_id.to_string()).into());
        }
        Ok(())
    }

    fn delete_pipeline(&self, pipeline_id: &str) -> Result<()> {
        if !pipeline_repo::delete(&self.db, pipeline_id)? {
            return Err(ResolutionError::UnknownPipeline(pipeline_id.to_string()).into());
        }
        Ok(())
    }

    fn search_pipelines(&self, query: &str) -> Result<Vec<PipelineRecord>> {
        Ok(pipeline_repo::search_by_name(&self.db, query)?)
    }

    fn find_result(&self, file_id: &str, pipeline_id: &str) -> Result<Option<ResultRecord>> {
        Ok(result_repo::find_by_pair(&self.db, file_id, pipeline_id)?)
    }

    fn record_validation(
        &self,
        result_id: &str,
        corrected: &ExtractedFields,
        corrected_score: Option<f64>,
    ) -> Result<()> {
        if !result_repo::record_validation(&self.db, result_id, corrected, corrected_score)? {
            return Err(ResolutionError::UnknownResultId(result_id.to_string()).into());
        }
        Ok(())
    }
}
