use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info_span, Instrument};

use super::{OcrDocument, OcrEngine};
use crate::config::schema::OcrConfig;
use crate::error::{CollaboratorError, ConfigError};

const SERVICE: &str = "OCR service";

#[derive(Serialize)]
struct OcrRequest<'a> {
    image: &'a str,
}

/// Client for the remote OCR service.
///
/// Sends the image as base64 JSON and expects the element array described in
/// [`OcrDocument`].
pub struct HttpOcrClient {
    endpoint: String,
    token: Option<SecretString>,
    client: Client,
}

impl HttpOcrClient {
    pub fn new(config: &OcrConfig) -> Result<Self, ConfigError> {
        let token = config.resolve_token()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::Validation {
                message: format!("Failed to build OCR HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            token,
            client,
        })
    }
}

#[async_trait]
impl OcrEngine for HttpOcrClient {
    async fn perform_ocr(&self, image: &[u8]) -> Result<OcrDocument, CollaboratorError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        debug!("Sending {} bytes to OCR service", image.len());

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&OcrRequest { image: &encoded });
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        async move {
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

            response
                .json::<OcrDocument>()
                .await
                .map_err(|e| CollaboratorError::MalformedResponse {
                    service: SERVICE,
                    message: e.to_string(),
                })
        }
        .instrument(info_span!("ocr.request", bytes = image.len()))
        .await
    }
}
