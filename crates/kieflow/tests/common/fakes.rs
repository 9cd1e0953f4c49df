//! Fake collaborators with call counting.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use kieflow::error::CollaboratorError;
use kieflow::kie::{BatchEvent, ProgressReporter};
use kieflow::{ExtractedFields, ExtractionSchema, Extractor, OcrDocument, OcrEngine};

/// Image content that makes [`FakeOcr`] fail.
pub const BROKEN_IMAGE: &[u8] = b"<broken>";

/// Builds an OCR document with one layout block and one page-1 box per line.
pub fn document_from_lines(lines: &[&str]) -> OcrDocument {
    let boxes: Vec<_> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let y = i as f64 * 20.0;
            json!({
                "bbox": [[0.0, y], [100.0, y], [100.0, y + 15.0], [0.0, y + 15.0]],
                "text": line,
            })
        })
        .collect();

    let mut elements = vec![json!({
        "type": "Paddle_BBox",
        "metadata": { "page_number": 1, "paddle_bbox": boxes },
    })];
    elements.extend(lines.iter().map(|line| json!({ "type": "NarrativeText", "text": line })));
    elements.push(json!({
        "type": "Page_Images",
        "metadata": { "images": [{ "page_number": 1, "image": "aW1n" }] },
    }));

    OcrDocument::from_json(&serde_json::Value::Array(elements).to_string()).unwrap()
}

/// Reads the image bytes as text, one line per OCR box.
#[derive(Default)]
pub struct FakeOcr {
    calls: AtomicUsize,
}

impl FakeOcr {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn perform_ocr(&self, image: &[u8]) -> Result<OcrDocument, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image == BROKEN_IMAGE {
            return Err(CollaboratorError::Status {
                service: "OCR service",
                status: 500,
            });
        }
        let text = String::from_utf8_lossy(image);
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        Ok(document_from_lines(&lines))
    }
}

/// Answers every schema field from a fixed table, with "" for unknown fields.
///
/// Text containing `FAIL` makes the extraction fail.
#[derive(Default)]
pub struct FakeExtractor {
    answers: HashMap<String, String>,
    texts: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn with_answers(answers: &[(&str, &str)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(
        &self,
        schema: &ExtractionSchema,
        text: &str,
    ) -> Result<ExtractedFields, CollaboratorError> {
        self.texts.lock().unwrap().push(text.to_string());
        if text.contains("FAIL") {
            return Err(CollaboratorError::SchemaMismatch {
                missing: schema.field_names().map(str::to_string).collect(),
            });
        }
        Ok(schema
            .field_names()
            .map(|name| {
                let value = self.answers.get(name).cloned().unwrap_or_default();
                (name.to_string(), value)
            })
            .collect())
    }
}

/// Keeps every reported event.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<BatchEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<BatchEvent> {
        self.events.lock().unwrap().clone()
    }

    /// `progress` values of the item events, in order.
    pub fn progress_values(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BatchEvent::ItemFinished { progress, .. } => Some(progress),
                _ => None,
            })
            .collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: BatchEvent) {
        self.events.lock().unwrap().push(event);
    }
}
