//! Downloads and exports: ZIP archives of stored files and a JSON dump of
//! extraction results.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, StorageError};
use crate::model::{ExtractedFields, FileRecord, PipelineRecord, ResultRecord, ResultStatus};

fn archive_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Archive(e.to_string())
}

/// Builds a deflated ZIP archive in memory from `(entry name, bytes)` pairs.
pub fn create_zip<'a, I>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, content) in entries {
        writer.start_file(name, options).map_err(archive_error)?;
        writer.write_all(content).map_err(archive_error)?;
    }

    let cursor = writer.finish().map_err(archive_error)?;
    Ok(cursor.into_inner())
}

/// One exported result, with the file and pipeline resolved to names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedResult {
    pub id: String,
    pub file: String,
    pub pipeline: String,
    pub created_at: DateTime<Utc>,
    pub status: ResultStatus,
    pub llm_json: Option<ExtractedFields>,
    pub llm_score: Option<f64>,
    pub corrected: Option<ExtractedFields>,
    pub corrected_score: Option<f64>,
}

/// Joins results with their file and pipeline names.
///
/// Results whose file or pipeline is gone are left out.
pub fn exported_results(
    files: &[FileRecord],
    pipelines: &[PipelineRecord],
    results: &[ResultRecord],
) -> Vec<ExportedResult> {
    let file_names: HashMap<&str, &str> =
        files.iter().map(|f| (f.id.as_str(), f.name.as_str())).collect();
    let pipeline_names: HashMap<&str, &str> = pipelines
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()))
        .collect();

    results
        .iter()
        .filter_map(|r| {
            let file = file_names.get(r.file_id.as_str())?;
            let pipeline = pipeline_names.get(r.pipeline_id.as_str())?;
            Some(ExportedResult {
                id: r.id.clone(),
                file: file.to_string(),
                pipeline: pipeline.to_string(),
                created_at: r.created_at,
                status: r.status,
                llm_json: r.llm_json.clone(),
                llm_score: r.llm_score,
                corrected: r.corrected.clone(),
                corrected_score: r.corrected_score,
            })
        })
        .collect()
}

/// Renders [`exported_results`] as pretty-printed JSON.
pub fn export_results(
    files: &[FileRecord],
    pipelines: &[PipelineRecord],
    results: &[ResultRecord],
) -> Result<String> {
    let rows = exported_results(files, pipelines, results);
    serde_json::to_string_pretty(&rows).map_err(|e| archive_error(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use crate::model::FileStatus;
    use crate::pipeline::ExtractionSchema;

    #[test]
    fn test_zip_contains_entries() {
        let bytes = create_zip([
            ("a.png", b"first".as_slice()),
            ("b.jpg", b"second".as_slice()),
        ])
        .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("b.jpg")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "second");
    }

    #[test]
    fn test_empty_zip() {
        let bytes = create_zip(std::iter::empty()).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn test_export_joins_names() {
        let now = Utc::now();
        let files = vec![FileRecord {
            id: "f1".to_string(),
            name: "kyc-files/id.png".to_string(),
            created_at: now,
            ocr_json: None,
            ocr_text: None,
            storage_id: "s1".to_string(),
            status: FileStatus::Used,
        }];
        let pipelines = vec![PipelineRecord {
            id: "p1".to_string(),
            created_at: now,
            name: "passport".to_string(),
            config: ExtractionSchema::from_pairs([("name", "Holder name")]),
            prompt: None,
        }];
        let mut fields = ExtractedFields::new();
        fields.insert("name".to_string(), "Jane".to_string());
        let result = |id: &str, file_id: &str| ResultRecord {
            id: id.to_string(),
            created_at: now,
            pipeline_id: "p1".to_string(),
            file_id: file_id.to_string(),
            llm_json: Some(fields.clone()),
            llm_score: None,
            status: ResultStatus::PendingValidation,
            corrected: None,
            corrected_score: None,
        };
        let results = vec![result("r1", "f1"), result("r2", "gone")];

        let json = export_results(&files, &pipelines, &results).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["file"], "kyc-files/id.png");
        assert_eq!(rows[0]["pipeline"], "passport");
        assert_eq!(rows[0]["llm_json"]["name"], "Jane");
        assert_eq!(rows[0]["status"], "pending_validation");
    }
}
