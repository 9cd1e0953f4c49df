//! Structured output of the OCR service.
//!
//! The service answers with a flat JSON array of elements. Two element types
//! carry page-level payloads in their `metadata`:
//!
//! - `Paddle_BBox`: the individual text boxes of one page,
//! - `Page_Images`: base64 renderings of every page.
//!
//! Every other element is a layout block (title, paragraph, table cell, ...)
//! with its recognized `text`, in reading order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BOX_ELEMENT_TYPE: &str = "Paddle_BBox";
pub const PAGE_IMAGES_ELEMENT_TYPE: &str = "Page_Images";

/// Four corner points, clockwise from top-left as reported by the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundingBox(pub [[f64; 2]; 4]);

impl BoundingBox {
    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for [x, y] in self.0 {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        (min_x, min_y, max_x, max_y)
    }
}

/// A single detected text fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrBox {
    #[serde(rename = "bbox")]
    pub bounding_box: BoundingBox,
    pub text: String,
}

/// One element of the OCR response, kept verbatim so the document can be
/// persisted and re-read without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrElement {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct PageBoxes {
    page_number: u32,
    paddle_bbox: Vec<OcrBox>,
}

#[derive(Deserialize)]
struct PageImages {
    images: Vec<PageImage>,
}

#[derive(Deserialize)]
struct PageImage {
    page_number: u32,
    image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OcrDocument {
    pub elements: Vec<OcrElement>,
}

impl OcrDocument {
    pub fn new(elements: Vec<OcrElement>) -> Self {
        Self { elements }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.elements)
    }

    /// Text boxes grouped by page number. Malformed box payloads are skipped.
    pub fn boxes_by_page(&self) -> BTreeMap<u32, Vec<OcrBox>> {
        let mut pages: BTreeMap<u32, Vec<OcrBox>> = BTreeMap::new();
        for element in self.elements.iter().filter(|e| e.kind == BOX_ELEMENT_TYPE) {
            match serde_json::from_value::<PageBoxes>(element.metadata.clone()) {
                Ok(page) => pages
                    .entry(page.page_number)
                    .or_default()
                    .extend(page.paddle_bbox),
                Err(e) => tracing::warn!("Skipping malformed OCR box element: {}", e),
            }
        }
        pages
    }

    /// Base64 page renderings keyed by page number.
    pub fn page_images(&self) -> BTreeMap<u32, String> {
        let mut images = BTreeMap::new();
        for element in self
            .elements
            .iter()
            .filter(|e| e.kind == PAGE_IMAGES_ELEMENT_TYPE)
        {
            match serde_json::from_value::<PageImages>(element.metadata.clone()) {
                Ok(payload) => {
                    for image in payload.images {
                        images.insert(image.page_number, image.image);
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed page image element: {}", e),
            }
        }
        images
    }

    /// Layout blocks in reading order.
    pub fn layout_elements(&self) -> impl Iterator<Item = &OcrElement> {
        self.elements
            .iter()
            .filter(|e| e.kind != BOX_ELEMENT_TYPE && e.kind != PAGE_IMAGES_ELEMENT_TYPE)
    }

    /// Plain text rebuilt from the layout blocks, one block per line.
    pub fn reconstruct_text(&self) -> String {
        let mut text = String::new();
        for element in self.layout_elements() {
            if let Some(ref t) = element.text {
                text.push_str(t);
                text.push('\n');
            }
        }
        text
    }
}
