//! Persisted records: files, pipelines and extraction results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ocr::OcrDocument;
use crate::pipeline::ExtractionSchema;

/// Field name to extracted value, in the order the fields were produced.
pub type ExtractedFields = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    /// Uploaded, no extraction result yet.
    Unused,
    /// At least one extraction result references the file.
    Used,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Unused => "Unused",
            FileStatus::Used => "Used",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unused" => Ok(FileStatus::Unused),
            "Used" => Ok(FileStatus::Used),
            other => Err(format!("unknown file status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    PendingValidation,
    Completed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::PendingValidation => "pending Val",
            ResultStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending Val" => Ok(ResultStatus::PendingValidation),
            "completed" => Ok(ResultStatus::Completed),
            other => Err(format!("unknown result status '{}'", other)),
        }
    }
}

/// An uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    /// Storage path, `bucket/filename`.
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub ocr_json: Option<OcrDocument>,
    pub ocr_text: Option<String>,
    pub storage_id: String,
    pub status: FileStatus,
}

impl FileRecord {
    /// The filename part of the storage path.
    pub fn filename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr_json.is_some()
    }
}

/// A named extraction schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub config: ExtractionSchema,
    pub prompt: Option<String>,
}

/// Output of one extraction run for a `(file, pipeline)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub pipeline_id: String,
    pub file_id: String,
    pub llm_json: Option<ExtractedFields>,
    pub llm_score: Option<f64>,
    pub status: ResultStatus,
    pub corrected: Option<ExtractedFields>,
    pub corrected_score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_status_round_trip() {
        for status in [FileStatus::Unused, FileStatus::Used] {
            assert_eq!(status.as_str().parse::<FileStatus>(), Ok(status));
        }
        assert!("Archived".parse::<FileStatus>().is_err());
    }

    #[test]
    fn test_result_status_uses_stored_labels() {
        assert_eq!(ResultStatus::PendingValidation.to_string(), "pending Val");
        assert_eq!(
            "completed".parse::<ResultStatus>(),
            Ok(ResultStatus::Completed)
        );
    }

    #[test]
    fn test_filename_strips_bucket() {
        let file = FileRecord {
            id: "f1".to_string(),
            name: "kyc-files/passport.png".to_string(),
            created_at: Utc::now(),
            ocr_json: None,
            ocr_text: None,
            storage_id: "s1".to_string(),
            status: FileStatus::Unused,
        };
        assert_eq!(file.filename(), "passport.png");
        assert!(!file.has_ocr());
    }
}
