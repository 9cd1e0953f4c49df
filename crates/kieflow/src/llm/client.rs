use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};

use super::parse::{parse_completion, render_prompt, repair_prompt, ParseFailure};
use super::{ChatCompletion, Extractor, DEFAULT_PROMPT_TEMPLATE};
use crate::config::LlmConfig;
use crate::error::{CollaboratorError, ConfigError};
use crate::model::ExtractedFields;
use crate::pipeline::ExtractionSchema;

const SERVICE: &str = "LLM service";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatClient {
    url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    api_key: Option<SecretString>,
    client: Client,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ConfigError> {
        let api_key = config.resolve_api_key()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Validation {
                message: format!("Failed to build LLM HTTP client: {}", e),
            })?;

        Ok(Self {
            url: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            api_key,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| CollaboratorError::Http {
            service: SERVICE,
            source: e,
        })?;
        if !response.status().is_success() {
            return Err(CollaboratorError::Status {
                service: SERVICE,
                status: response.status().as_u16(),
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::MalformedResponse {
                    service: SERVICE,
                    message: e.to_string(),
                })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CollaboratorError::MalformedResponse {
                service: SERVICE,
                message: "response has no message content".to_string(),
            })
    }
}

/// Schema-guided extraction on top of a chat model.
///
/// The first completion is parsed against the schema. If it does not fit, the
/// model gets exactly one repair request; a second failure is an error.
pub struct ChatExtractor {
    backend: Arc<dyn ChatCompletion>,
    prompt_template: String,
}

impl ChatExtractor {
    pub fn new(config: &LlmConfig) -> Result<Self, ConfigError> {
        let backend = OpenAiChatClient::new(config)?;
        Ok(Self::with_backend(
            Arc::new(backend),
            config.prompt_template.as_deref(),
        ))
    }

    pub fn with_backend(backend: Arc<dyn ChatCompletion>, prompt_template: Option<&str>) -> Self {
        Self {
            backend,
            prompt_template: prompt_template
                .unwrap_or(DEFAULT_PROMPT_TEMPLATE)
                .to_string(),
        }
    }
}

fn into_error(failure: ParseFailure) -> CollaboratorError {
    match failure {
        ParseFailure::Missing(missing) => CollaboratorError::SchemaMismatch { missing },
        ParseFailure::Malformed(message) => CollaboratorError::MalformedResponse {
            service: SERVICE,
            message,
        },
    }
}

#[async_trait]
impl Extractor for ChatExtractor {
    async fn extract(
        &self,
        schema: &ExtractionSchema,
        text: &str,
    ) -> Result<ExtractedFields, CollaboratorError> {
        let prompt = render_prompt(&self.prompt_template, schema, text);

        async {
            let completion = self.backend.complete(&prompt).await?;
            let failure = match parse_completion(schema, &completion) {
                Ok(fields) => return Ok(fields),
                Err(failure) => failure,
            };

            warn!("Completion did not fit the schema ({}), asking for a repair", failure);
            let repaired = self
                .backend
                .complete(&repair_prompt(schema, &completion, &failure))
                .await?;
            let fields = parse_completion(schema, &repaired).map_err(into_error)?;
            debug!("Repair succeeded with {} fields", fields.len());
            Ok::<_, CollaboratorError>(fields)
        }
        .instrument(info_span!("llm.extract", fields = schema.len()))
        .await
    }
}
