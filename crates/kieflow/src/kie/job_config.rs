//! Expands file × pipeline selections into concrete extraction work.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{FileRecord, PipelineRecord, ResultRecord};
use crate::store::Snapshot;

/// One selection: every listed file against every listed pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub filepaths: Vec<String>,
    pub pipelines: Vec<String>,
}

impl JobRequest {
    pub fn new<F, P>(filepaths: F, pipelines: P) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            filepaths: filepaths.into_iter().map(Into::into).collect(),
            pipelines: pipelines.into_iter().map(Into::into).collect(),
        }
    }

    fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.filepaths.iter().flat_map(move |file| {
            self.pipelines
                .iter()
                .map(move |pipeline| (file.as_str(), pipeline.as_str()))
        })
    }
}

/// Which files a selection covers.
///
/// `All` and `AllUnprocessed` only take files that already have OCR output.
/// `AllUnprocessed` further drops files that have a result with any pipeline.
/// Explicit paths are taken as given, so a missing OCR run shows up as a
/// skipped item instead of disappearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    All,
    AllUnprocessed,
    Paths(Vec<String>),
}

impl FileSelection {
    /// Storage paths this selection covers, in upload order.
    pub fn filepaths(&self, snapshot: &Snapshot) -> Vec<String> {
        let with_results: HashSet<&str> = snapshot
            .results
            .iter()
            .map(|r| r.file_id.as_str())
            .collect();
        match self {
            FileSelection::Paths(paths) => paths.clone(),
            FileSelection::All => snapshot
                .files
                .iter()
                .filter(|f| f.has_ocr())
                .map(|f| f.name.clone())
                .collect(),
            FileSelection::AllUnprocessed => snapshot
                .files
                .iter()
                .filter(|f| f.has_ocr() && !with_results.contains(f.id.as_str()))
                .map(|f| f.name.clone())
                .collect(),
        }
    }

    /// Pairs the covered files with `pipelines`.
    pub fn request<P>(&self, snapshot: &Snapshot, pipelines: P) -> JobRequest
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        JobRequest::new(self.filepaths(snapshot), pipelines)
    }
}

/// A resolved `(file, pipeline)` pair waiting for extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub filepath: String,
    pub pipeline_name: String,
    pub file_id: String,
    pub pipeline_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyProcessed,
    UnknownFile,
    UnknownPipeline,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => write!(f, "already processed with this pipeline"),
            SkipReason::UnknownFile => write!(f, "no such file"),
            SkipReason::UnknownPipeline => write!(f, "no such pipeline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub filepath: String,
    pub pipeline_name: String,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is {} ({})",
            self.filepath, self.reason, self.pipeline_name
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobConfig {
    pub work_items: Vec<WorkItem>,
    pub skipped: Vec<SkippedItem>,
}

impl JobConfig {
    pub fn is_empty(&self) -> bool {
        self.work_items.is_empty()
    }
}

/// Builds a [`JobConfig`] from table snapshots.
///
/// Pairs are expanded per request, de-duplicated in first-seen order and
/// resolved by exact name. Unknown names and pairs that already have a
/// result become [`SkippedItem`]s. The output depends only on the inputs.
pub struct JobConfigBuilder<'a> {
    file_ids: HashMap<&'a str, &'a str>,
    pipeline_ids: HashMap<&'a str, &'a str>,
    processed: HashSet<(&'a str, &'a str)>,
}

impl<'a> JobConfigBuilder<'a> {
    pub fn new(
        files: &'a [FileRecord],
        pipelines: &'a [PipelineRecord],
        results: &'a [ResultRecord],
    ) -> Self {
        let mut file_ids = HashMap::new();
        for file in files {
            file_ids.entry(file.name.as_str()).or_insert(file.id.as_str());
        }
        let mut pipeline_ids = HashMap::new();
        for pipeline in pipelines {
            pipeline_ids
                .entry(pipeline.name.as_str())
                .or_insert(pipeline.id.as_str());
        }
        let processed = results
            .iter()
            .map(|r| (r.file_id.as_str(), r.pipeline_id.as_str()))
            .collect();

        Self {
            file_ids,
            pipeline_ids,
            processed,
        }
    }

    pub fn from_snapshot(snapshot: &'a Snapshot) -> Self {
        Self::new(&snapshot.files, &snapshot.pipelines, &snapshot.results)
    }

    pub fn build(&self, requests: &[JobRequest]) -> JobConfig {
        let mut seen = HashSet::new();
        let mut config = JobConfig::default();

        for (filepath, pipeline_name) in requests.iter().flat_map(|r| r.pairs()) {
            if !seen.insert((filepath, pipeline_name)) {
                continue;
            }

            let skip = |reason| SkippedItem {
                filepath: filepath.to_string(),
                pipeline_name: pipeline_name.to_string(),
                reason,
            };

            let Some(&file_id) = self.file_ids.get(filepath) else {
                config.skipped.push(skip(SkipReason::UnknownFile));
                continue;
            };
            let Some(&pipeline_id) = self.pipeline_ids.get(pipeline_name) else {
                config.skipped.push(skip(SkipReason::UnknownPipeline));
                continue;
            };

            if self.processed.contains(&(file_id, pipeline_id)) {
                config.skipped.push(skip(SkipReason::AlreadyProcessed));
                continue;
            }

            config.work_items.push(WorkItem {
                filepath: filepath.to_string(),
                pipeline_name: pipeline_name.to_string(),
                file_id: file_id.to_string(),
                pipeline_id: pipeline_id.to_string(),
            });
        }

        log::debug!(
            "Job config: {} work items, {} skipped",
            config.work_items.len(),
            config.skipped.len()
        );
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtractedFields, FileStatus, ResultStatus};
    use crate::pipeline::ExtractionSchema;
    use chrono::Utc;

    fn file(id: &str, name: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
            ocr_json: None,
            ocr_text: Some("text".to_string()),
            storage_id: id.to_string(),
            status: FileStatus::Unused,
        }
    }

    fn pipeline(id: &str, name: &str) -> PipelineRecord {
        PipelineRecord {
            id: id.to_string(),
            created_at: Utc::now(),
            name: name.to_string(),
            config: ExtractionSchema::from_pairs([("name", "Holder name")]),
            prompt: None,
        }
    }

    fn result(file_id: &str, pipeline_id: &str) -> ResultRecord {
        ResultRecord {
            id: format!("{}-{}", file_id, pipeline_id),
            created_at: Utc::now(),
            pipeline_id: pipeline_id.to_string(),
            file_id: file_id.to_string(),
            llm_json: Some(ExtractedFields::new()),
            llm_score: None,
            status: ResultStatus::PendingValidation,
            corrected: None,
            corrected_score: None,
        }
    }

    fn tables() -> (Vec<FileRecord>, Vec<PipelineRecord>) {
        (
            vec![file("f1", "kyc-files/a.png"), file("f2", "kyc-files/b.png")],
            vec![pipeline("p1", "Passport"), pipeline("p2", "Invoice")],
        )
    }

    fn pairs(config: &JobConfig) -> Vec<(&str, &str)> {
        config
            .work_items
            .iter()
            .map(|w| (w.filepath.as_str(), w.pipeline_name.as_str()))
            .collect()
    }

    #[test]
    fn test_group_is_full_cross_product() {
        let (files, pipelines) = tables();
        let builder = JobConfigBuilder::new(&files, &pipelines, &[]);
        let config = builder.build(&[JobRequest::new(
            ["kyc-files/a.png", "kyc-files/b.png"],
            ["Passport", "Invoice"],
        )]);

        assert_eq!(
            pairs(&config),
            vec![
                ("kyc-files/a.png", "Passport"),
                ("kyc-files/a.png", "Invoice"),
                ("kyc-files/b.png", "Passport"),
                ("kyc-files/b.png", "Invoice"),
            ]
        );
        assert_eq!(config.work_items[3].file_id, "f2");
        assert_eq!(config.work_items[3].pipeline_id, "p2");
        assert!(config.skipped.is_empty());
    }

    #[test]
    fn test_processed_pairs_are_skipped() {
        let (files, pipelines) = tables();
        let results = vec![result("f1", "p1")];
        let builder = JobConfigBuilder::new(&files, &pipelines, &results);
        let config = builder.build(&[JobRequest::new(
            ["kyc-files/a.png"],
            ["Passport", "Invoice"],
        )]);

        assert_eq!(pairs(&config), vec![("kyc-files/a.png", "Invoice")]);
        assert_eq!(
            config.skipped,
            vec![SkippedItem {
                filepath: "kyc-files/a.png".to_string(),
                pipeline_name: "Passport".to_string(),
                reason: SkipReason::AlreadyProcessed,
            }]
        );
        assert_eq!(
            config.skipped[0].to_string(),
            "kyc-files/a.png is already processed with this pipeline (Passport)"
        );
    }

    #[test]
    fn test_duplicates_across_groups_collapse() {
        let (files, pipelines) = tables();
        let builder = JobConfigBuilder::new(&files, &pipelines, &[]);
        let config = builder.build(&[
            JobRequest::new(["kyc-files/b.png"], ["Invoice"]),
            JobRequest::new(["kyc-files/a.png", "kyc-files/b.png"], ["Invoice"]),
        ]);

        assert_eq!(
            pairs(&config),
            vec![
                ("kyc-files/b.png", "Invoice"),
                ("kyc-files/a.png", "Invoice"),
            ]
        );
    }

    #[test]
    fn test_unknown_names_are_skipped_not_nulled() {
        let (files, pipelines) = tables();
        let builder = JobConfigBuilder::new(&files, &pipelines, &[]);
        let config = builder.build(&[
            JobRequest::new(["kyc-files/ghost.png"], ["Passport"]),
            JobRequest::new(["kyc-files/a.png"], ["Ghost"]),
        ]);

        assert!(config.is_empty());
        let reasons: Vec<SkipReason> = config.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![SkipReason::UnknownFile, SkipReason::UnknownPipeline]
        );
    }

    #[test]
    fn test_empty_request_lists() {
        let (files, pipelines) = tables();
        let builder = JobConfigBuilder::new(&files, &pipelines, &[]);
        let config = builder.build(&[JobRequest::new(["kyc-files/a.png"], Vec::<String>::new())]);
        assert_eq!(config, JobConfig::default());
    }

    #[test]
    fn test_file_selection_modes() {
        let mut files = vec![
            file("f1", "kyc-files/a.png"),
            file("f2", "kyc-files/b.png"),
            file("f3", "kyc-files/c.png"),
        ];
        files[0].ocr_json = Some(crate::ocr::OcrDocument::default());
        files[1].ocr_json = Some(crate::ocr::OcrDocument::default());
        let snapshot = Snapshot {
            files,
            pipelines: vec![pipeline("p1", "Passport")],
            results: vec![result("f1", "p1")],
        };

        assert_eq!(
            FileSelection::All.filepaths(&snapshot),
            vec!["kyc-files/a.png", "kyc-files/b.png"]
        );
        assert_eq!(
            FileSelection::AllUnprocessed.filepaths(&snapshot),
            vec!["kyc-files/b.png"]
        );
        let explicit = FileSelection::Paths(vec!["kyc-files/c.png".to_string()]);
        assert_eq!(
            explicit.request(&snapshot, ["Passport"]),
            JobRequest::new(["kyc-files/c.png"], ["Passport"])
        );
    }
}
