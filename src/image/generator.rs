use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::retry::RetryPolicy;

use super::error::ImageError;

const API_URL: &str = "https://api.openai.com/v1";

/// Parameters for [`ImageGenerator`].
#[derive(Debug, Clone)]
pub struct ImageGeneratorConfig {
    pub api_key: String,
    pub org_id: Option<String>,
    pub project_id: Option<String>,
    pub model: String,
    pub size: String,
    pub quality: String,
    pub retry: RetryPolicy,
}

/// Client for the images endpoint; returns decoded raw bytes.
#[derive(Clone)]
pub struct ImageGenerator {
    http: Client,
    base_url: String,
    config: ImageGeneratorConfig,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GenerationPayload>,
}

#[derive(Debug, Deserialize)]
struct GenerationPayload {
    b64_json: Option<String>,
}

impl ImageGenerator {
    pub fn new(config: ImageGeneratorConfig) -> Self {
        Self::with_base_url(config, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(config: ImageGeneratorConfig, base_url: String) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(180))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url,
            config,
        }
    }

    /// Generate one image for `prompt` and return its decoded bytes.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<u8>, ImageError> {
        debug!(model = %self.config.model, size = %self.config.size, "requesting image generation");
        let this = self.clone();
        let prompt = prompt.to_string();
        self.config
            .retry
            .run("image-generation", async move || this.generate_once(&prompt).await)
            .await
    }

    async fn generate_once(&self, prompt: &str) -> Result<Vec<u8>, ImageError> {
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "size": self.config.size,
            "quality": self.config.quality,
        });
        let mut request = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(org) = &self.config.org_id {
            request = request.header("OpenAI-Organization", org);
        }
        if let Some(project) = &self.config.project_id {
            request = request.header("OpenAI-Project", project);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ImageError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let payload = response.json::<GenerationResponse>().await?;
        let encoded = payload
            .data
            .into_iter()
            .next()
            .and_then(|entry| entry.b64_json)
            .filter(|value| !value.is_empty())
            .ok_or(ImageError::EmptyData)?;
        Ok(BASE64.decode(encoded)?)
    }
}
