pub mod client;
pub mod document;

use std::path::Path;

use async_trait::async_trait;

use crate::error::CollaboratorError;

pub use client::HttpOcrClient;
pub use document::{BoundingBox, OcrBox, OcrDocument, OcrElement};

/// Turns page images into structured OCR output.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn perform_ocr(&self, image: &[u8]) -> Result<OcrDocument, CollaboratorError>;
}

/// Whether the OCR service accepts this file (PNG and JPEG images).
pub fn is_supported_image(path: &str) -> bool {
    mime_guess::from_path(Path::new(path))
        .iter()
        .any(|m| m == mime_guess::mime::IMAGE_PNG || m == mime_guess::mime::IMAGE_JPEG)
}
