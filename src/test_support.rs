//! Shared fixtures for the unit tests: a local HTTP server and recording fakes
//! for the two external models.

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::openai::{ImageModel, ImageOutput, ImageRequest};
use crate::openrouter::{ChatMessage, ChatModel};

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nproduct-photo";
pub const TEMPLATE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\ntemplate-42";
pub const CANVAS_BYTES: &[u8] = b"\x89PNG\r\n\x1a\ncanvas";

/// Serves `app` on an ephemeral localhost port and returns its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub struct RecordingChat {
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
    pub reply: Result<String>,
}

impl RecordingChat {
    pub fn replying(reply: &str) -> Self {
        Self { calls: Mutex::new(Vec::new()), reply: Ok(reply.to_string()) }
    }

    pub fn failing(err: AppError) -> Self {
        Self { calls: Mutex::new(Vec::new()), reply: Err(err) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ChatModel for RecordingChat {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        self.calls.lock().push(messages);
        self.reply.clone()
    }
}

pub struct RecordingImages {
    pub calls: Mutex<Vec<ImageRequest>>,
    pub reply: Result<ImageOutput>,
    pub delay: Duration,
}

impl RecordingImages {
    pub fn replying(output: ImageOutput) -> Self {
        Self { calls: Mutex::new(Vec::new()), reply: Ok(output), delay: Duration::ZERO }
    }

    pub fn failing(err: AppError) -> Self {
        Self { calls: Mutex::new(Vec::new()), reply: Err(err), delay: Duration::ZERO }
    }

    /// Makes every render take `delay`, like a slow upstream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_call(&self) -> ImageRequest {
        self.calls.lock().last().cloned().expect("image model was never called")
    }
}

#[async_trait]
impl ImageModel for RecordingImages {
    async fn render(&self, request: ImageRequest) -> Result<ImageOutput> {
        self.calls.lock().push(request);
        tokio::time::sleep(self.delay).await;
        self.reply.clone()
    }
}
