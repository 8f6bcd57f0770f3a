use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::images::preview;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// A multimodal chat model that turns a rough request plus images into a refined prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the text of the first choice.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn user(content: Vec<ContentPart>) -> Self {
        Self { role: "user", content }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl { image_url: ImageUrl { url: url.into() } }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: Option<u32>,
}

pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
}

impl OpenRouterClient {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self { client, api_key, base_url: DEFAULT_BASE_URL.to_string(), model, max_tokens: None }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let image_count: usize = messages.iter()
            .flat_map(|m| &m.content)
            .filter(|p| matches!(p, ContentPart::ImageUrl { .. }))
            .count();
        info!("🔗 Refining prompt with {} ({} image block(s))", self.model, image_count);

        let body = ChatRequest { model: &self.model, messages: &messages, max_tokens: self.max_tokens };

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, AppError::UpstreamModel))?;

        let status = response.status();
        let response_text = response.text().await
            .map_err(|e| AppError::from_reqwest(e, AppError::UpstreamModel))?;

        if !status.is_success() {
            error!("❌ Chat completion failed with status {}: {}", status, preview(&response_text, 500));
            return Err(AppError::UpstreamModel(format!("status={} body={}", status, response_text)));
        }

        let parsed: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| AppError::UpstreamModel(format!("parse error: {}: {}", e, preview(&response_text, 500))))?;

        let refined = parsed.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::UpstreamModel("response contained no text content".into()))?;

        info!("📝 Refined prompt: {}", preview(&refined, 200));
        Ok(refined)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: ResponseMessage,
}

#[derive(Debug, Deserialize, Default)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::{http::{HeaderMap, StatusCode}, routing::post, Json, Router};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn client(base: &str) -> OpenRouterClient {
        OpenRouterClient::new(Client::new(), "or-key".into(), "vision-model".into()).with_base_url(base)
    }

    #[test]
    fn content_parts_use_openai_wire_shape() {
        let message = ChatMessage::user(vec![
            ContentPart::text("hello"),
            ContentPart::image("data:image/png;base64,QUJD"),
        ]);
        assert_eq!(serde_json::to_value(&message).unwrap(), json!({
            "role": "user",
            "content": [
                { "type": "text", "text": "hello" },
                { "type": "image_url", "image_url": { "url": "data:image/png;base64,QUJD" } }
            ]
        }));
    }

    #[test]
    fn unset_max_tokens_is_omitted() {
        let body = ChatRequest { model: "m", messages: &[], max_tokens: None };
        assert_eq!(serde_json::to_value(&body).unwrap(), json!({ "model": "m", "messages": [] }));
    }

    #[tokio::test]
    async fn returns_first_choice_text() {
        let app = Router::new().route("/chat/completions", post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default().to_string();
            let images = body["messages"][0]["content"].as_array().map(|c| c.len() - 1).unwrap_or(0);
            Json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": format!("  {} | {} | {} images  ", auth, body["model"], images) } },
                    { "message": { "role": "assistant", "content": "second" } }
                ]
            }))
        }));
        let base = spawn_server(app).await;

        let message = ChatMessage::user(vec![ContentPart::text("x"), ContentPart::image("https://cdn/u.png")]);
        let refined = client(&base).complete(vec![message]).await.unwrap();
        assert_eq!(refined, "Bearer or-key | \"vision-model\" | 1 images");
    }

    #[tokio::test]
    async fn error_status_is_upstream_model_error() {
        let app = Router::new().route("/chat/completions", post(|| async {
            (StatusCode::TOO_MANY_REQUESTS, "rate limited")
        }));
        let base = spawn_server(app).await;

        let err = client(&base).complete(vec![]).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_model_error");
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn empty_choices_are_rejected() {
        let app = Router::new().route("/chat/completions", post(|| async {
            Json(json!({ "choices": [ { "message": { "content": null } } ] }))
        }));
        let base = spawn_server(app).await;

        let err = client(&base).complete(vec![]).await.unwrap_err();
        assert_eq!(err, AppError::UpstreamModel("response contained no text content".into()));
    }
}
