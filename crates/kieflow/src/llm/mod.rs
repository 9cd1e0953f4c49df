pub mod client;
pub mod parse;

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::model::ExtractedFields;
use crate::pipeline::ExtractionSchema;

pub use client::{ChatExtractor, OpenAiChatClient};
pub use parse::DEFAULT_PROMPT_TEMPLATE;

/// Pulls schema fields out of document text.
///
/// Implementations return a value for every schema field or fail.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        schema: &ExtractionSchema,
        text: &str,
    ) -> Result<ExtractedFields, CollaboratorError>;
}

/// A single-prompt text completion.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError>;
}
