use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::error::ImageError;

const UPLOAD_URL: &str = "https://freeimage.host/api/1/upload";

/// Minimal freeimage.host upload client.
pub struct FreeImageClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    status_code: Option<u64>,
    // The host serialises this as either a bool or the string "true".
    success: Option<serde_json::Value>,
    error: Option<UploadError>,
    image: Option<UploadImage>,
}

#[derive(Debug, Deserialize)]
struct UploadError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadImage {
    url: Option<String>,
    display_url: Option<String>,
}

impl UploadResponse {
    fn succeeded(&self) -> bool {
        let flag = match &self.success {
            Some(serde_json::Value::Bool(value)) => *value,
            Some(serde_json::Value::String(value)) => value == "true",
            _ => false,
        };
        self.status_code == Some(200) && flag
    }
}

/// Turn a row title into a safe upload filename with a timestamp suffix.
fn build_filename(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut previous_replaced = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            slug.push(ch);
            previous_replaced = false;
        } else if !previous_replaced {
            slug.push('_');
            previous_replaced = true;
        }
    }
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "image" } else { slug };
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    format!("{slug}_{timestamp}.png")
}

impl FreeImageClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_endpoint(api_key, UPLOAD_URL.to_string())
    }

    /// Create a client pointing at a custom endpoint (useful for testing).
    pub fn with_endpoint(api_key: Option<String>, endpoint: String) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            endpoint,
            api_key,
        }
    }

    /// Upload image bytes and return the public URL.
    pub async fn upload(&self, data: Vec<u8>, title: &str) -> Result<String, ImageError> {
        let filename = build_filename(title);
        debug!(%filename, bytes = data.len(), "uploading image");

        let source = Part::bytes(data)
            .file_name(filename)
            .mime_str("image/png")
            .expect("static mime type is valid");
        let mut form = Form::new().part("source", source).text("type", "file");
        if let Some(key) = &self.api_key {
            form = form.text("key", key.clone());
        }

        let response = self.http.post(&self.endpoint).multipart(form).send().await?;
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

        let payload = response.json::<UploadResponse>().await?;
        if !payload.succeeded() {
            let message = payload
                .error
                .and_then(|error| error.message)
                .unwrap_or_else(|| "image host reported a failure".to_string());
            return Err(ImageError::UploadRejected(message));
        }

        payload
            .image
            .and_then(|image| image.url.or(image.display_url))
            .filter(|url| !url.is_empty())
            .ok_or(ImageError::MissingUrl)
    }
}
