use std::collections::HashSet;

use serde::Serialize;

use super::percentage;
use crate::model::{FileRecord, PipelineRecord, ResultRecord};

/// A count and, where meaningful, its share of all files in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metric(pub usize, pub Option<u32>);

impl Metric {
    pub fn count(&self) -> usize {
        self.0
    }

    pub fn percentage(&self) -> Option<u32> {
        self.1
    }
}

/// Dashboard summary. Serializes as
/// `{"Files":[n,null],"OCR":[n,pct],"KIE":[n,pct],"Pipelines":[n,null]}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metrics {
    #[serde(rename = "Files")]
    pub files: Metric,
    #[serde(rename = "OCR")]
    pub ocr: Metric,
    #[serde(rename = "KIE")]
    pub kie: Metric,
    #[serde(rename = "Pipelines")]
    pub pipelines: Metric,
}

pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn compute(
        files: &[FileRecord],
        pipelines: &[PipelineRecord],
        results: &[ResultRecord],
    ) -> Metrics {
        let total = files.len();

        let ocr_done = files
            .iter()
            .filter(|f| f.has_ocr())
            .map(|f| f.id.as_str())
            .collect::<HashSet<_>>()
            .len();

        let kie_done = results
            .iter()
            .filter(|r| r.llm_json.is_some())
            .map(|r| r.file_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        Metrics {
            files: Metric(total, None),
            ocr: Metric(ocr_done, Some(percentage(ocr_done, total))),
            kie: Metric(kie_done, Some(percentage(kie_done, total))),
            pipelines: Metric(pipelines.len(), None),
        }
    }
}
