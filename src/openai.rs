use async_trait::async_trait;
use reqwest::{multipart::{Form, Part}, Client};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::images::{preview, ImageBlob};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const IMAGE_QUALITY: &str = "high";

#[derive(Debug, Clone)]
pub struct ImageRequest {
    /// Product image(s) first, layout template last.
    pub images: Vec<ImageBlob>,
    pub prompt: String,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutput {
    Base64(String),
    Url(String),
}

impl ImageOutput {
    pub fn into_inner(self) -> String {
        match self {
            ImageOutput::Base64(data) | ImageOutput::Url(data) => data,
        }
    }
}

/// An image model that composes or edits ads from a prompt and a set of images.
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn render(&self, request: ImageRequest) -> Result<ImageOutput>;
}

pub struct OpenAiImageClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiImageClient {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self { client, api_key, base_url: DEFAULT_BASE_URL.to_string(), model }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn edit_form(&self, request: ImageRequest) -> Result<Form> {
        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("prompt", request.prompt)
            .text("size", request.size)
            .text("quality", IMAGE_QUALITY);
        for image in request.images {
            let part = Part::bytes(image.bytes.to_vec())
                .file_name(image.file_name)
                .mime_str(image.mime_type)
                .map_err(|e| AppError::UpstreamImage(e.to_string()))?;
            form = form.part("image[]", part);
        }
        Ok(form)
    }
}

#[derive(Debug, Serialize)]
struct GenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[async_trait]
impl ImageModel for OpenAiImageClient {
    async fn render(&self, request: ImageRequest) -> Result<ImageOutput> {
        let pending = if request.images.is_empty() {
            let url = format!("{}/images/generations", self.base_url);
            info!("🎨 Generating image with {} ({})", self.model, request.size);
            let body = GenerationBody {
                model: &self.model,
                prompt: &request.prompt,
                size: &request.size,
                quality: IMAGE_QUALITY,
                n: 1,
            };
            self.client.post(&url).bearer_auth(&self.api_key).json(&body).send().await
        } else {
            let url = format!("{}/images/edits", self.base_url);
            info!("🎨 Editing {} image(s) with {} ({})", request.images.len(), self.model, request.size);
            let form = self.edit_form(request)?;
            self.client.post(&url).bearer_auth(&self.api_key).multipart(form).send().await
        };

        let response = pending.map_err(|e| AppError::from_reqwest(e, AppError::UpstreamImage))?;
        let status = response.status();
        let response_text = response.text().await
            .map_err(|e| AppError::from_reqwest(e, AppError::UpstreamImage))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&response_text)
                .map(|body| body.error.message)
                .unwrap_or_else(|_| preview(&response_text, 500));
            error!("❌ Image API error {}: {}", status, message);
            return Err(AppError::UpstreamImage(format!("status={status}: {message}")));
        }

        let parsed: ImagesResponse = serde_json::from_str(&response_text)
            .map_err(|e| AppError::UpstreamImage(format!("parse error: {}: {}", e, preview(&response_text, 500))))?;

        let output = parsed.first_output()?;
        match &output {
            ImageOutput::Base64(data) => info!("✅ Received base64 image: {}", preview(data, 50)),
            ImageOutput::Url(url) => info!("✅ Received hosted image URL: {}", url),
        }
        Ok(output)
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl ImagesResponse {
    /// Base64 wins over a hosted URL; neither is `NoImageData`.
    fn first_output(self) -> Result<ImageOutput> {
        let datum = self.data.into_iter().next().ok_or(AppError::NoImageData)?;
        match (datum.b64_json, datum.url) {
            (Some(b64), _) if !b64.is_empty() => Ok(ImageOutput::Base64(b64)),
            (_, Some(url)) if !url.is_empty() => Ok(ImageOutput::Url(url)),
            _ => Err(AppError::NoImageData),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
