use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KieflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline configuration error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to resolve secret for '{name}': {source}")]
    Secret {
        name: String,
        #[source]
        source: crate::secrets::SecretError,
    },
}

/// Malformed pipeline configuration, rejected when the pipeline is saved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Pipeline has no fields")]
    Empty,

    #[error("Pipeline name must not be empty")]
    EmptyPipelineName,

    #[error("Field #{index} has an empty name")]
    EmptyFieldName { index: usize },

    #[error("Field '{field}' has no description")]
    EmptyDescription { field: String },

    #[error("Field '{field}' is defined more than once")]
    DuplicateField { field: String },

    #[error("Invalid pipeline config JSON: {0}")]
    InvalidJson(String),

    #[error("A pipeline named '{0}' already exists")]
    PipelineNameTaken(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No file named '{0}'")]
    UnknownFile(String),

    #[error("No pipeline named '{0}'")]
    UnknownPipeline(String),

    #[error("No result for file '{file}' with pipeline '{pipeline}'")]
    UnknownResult { file: String, pipeline: String },

    #[error("No result with id '{0}'")]
    UnknownResultId(String),

    #[error("Session '{0}' does not exist or has expired")]
    UnknownSession(String),
}

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} returned a malformed response: {message}")]
    MalformedResponse {
        service: &'static str,
        message: String,
    },

    #[error("Extraction output is missing fields after repair: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("File '{0}' has no OCR text")]
    MissingOcrText(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file '{path}': {source}")]
    DeleteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid object path '{0}', expected 'bucket/filename'")]
    InvalidObjectPath(String),

    #[error("Object already exists: {0}")]
    ObjectExists(String),

    #[error("Failed to build archive: {0}")]
    Archive(String),
}

pub type Result<T> = std::result::Result<T, KieflowError>;
