use base64::{
    alphabet,
    engine::{general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD}, DecodePaddingMode},
    Engine,
};
use bytes::Bytes;
use reqwest::Client;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Every image forwarded to the image API is labelled PNG, whatever it really is.
pub const IMAGE_MIME: &str = "image/png";

/// A resolved image, held in memory for the duration of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlob {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Bytes,
}

impl ImageBlob {
    pub fn new(label: &str, bytes: impl Into<Bytes>) -> Self {
        Self { file_name: format!("{label}.png"), mime_type: IMAGE_MIME, bytes: bytes.into() }
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

pub fn is_remote(reference: &str) -> bool {
    let r = reference.trim_start();
    r.starts_with("http://") || r.starts_with("https://")
}

/// Drops a leading `data:<mime>;base64,` prefix if there is one.
pub fn strip_data_uri(data: &str) -> &str {
    let data = data.trim();
    if data.starts_with("data:") {
        if let Some(idx) = data.find(";base64,") {
            return &data[idx + ";base64,".len()..];
        }
    }
    data
}

/// Accepts padded or unpadded, standard or URL-safe, and line-wrapped base64.
pub fn decode_base64(label: &str, data: &str) -> Result<Bytes> {
    let cleaned: String = strip_data_uri(data).chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let engine = if cleaned.contains(['-', '_']) { &URL_SAFE_LENIENT } else { &STANDARD_LENIENT };
    engine
        .decode(cleaned.as_bytes())
        .map(Bytes::from)
        .map_err(|e| AppError::InvalidImageData(format!("{label}: {e}")))
}

/// Data URIs pass through; bare base64 gets a PNG data-URI prefix.
pub fn as_data_uri(data: &str) -> String {
    let data = data.trim();
    if data.starts_with("data:") {
        data.to_string()
    } else {
        format!("data:{IMAGE_MIME};base64,{data}")
    }
}

/// File name of a template that lives in the template directory, or `None` for inline data.
///
/// URLs map to their last path segment. Bare names are recognised by having an
/// extension dot and no path separators, neither of which base64 or data URIs can
/// satisfy.
pub fn template_file_name(reference: &str) -> Option<&str> {
    let reference = reference.trim();
    let name = if is_remote(reference) {
        let path = reference.split(['?', '#']).next().unwrap_or(reference);
        path.rsplit('/').next()?
    } else if !reference.starts_with("data:") && !reference.contains(['/', '\\']) && reference.contains('.') {
        reference
    } else {
        return None;
    };
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Short, log-safe rendering of a possibly huge string.
pub fn preview(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[{} chars total]", &s[..end], s.len())
}

/// Turns image references into in-memory blobs. Nothing is cached: every call
/// re-reads the template directory or re-fetches the URL.
#[derive(Clone)]
pub struct ImageResolver {
    client: Client,
    template_dir: PathBuf,
}

impl ImageResolver {
    pub fn new(client: Client, template_dir: impl Into<PathBuf>) -> Self {
        Self { client, template_dir: template_dir.into() }
    }

    /// Uploaded product photos: remote URLs are downloaded, anything else is inline base64.
    pub async fn resolve_upload(&self, label: String, reference: &str) -> Result<ImageBlob> {
        if is_remote(reference) {
            self.fetch(&label, reference.trim()).await
        } else {
            Ok(ImageBlob::new(&label, decode_base64(&label, reference)?))
        }
    }

    /// Templates: URLs and file names resolve against the template directory.
    pub async fn resolve_template(&self, label: String, reference: &str) -> Result<ImageBlob> {
        match template_file_name(reference) {
            Some(name) => self.read_template(&label, name).await,
            None => Ok(ImageBlob::new(&label, decode_base64(&label, reference)?)),
        }
    }

    async fn fetch(&self, label: &str, url: &str) -> Result<ImageBlob> {
        debug!("⬇️ Fetching {} from {}", label, url);
        let fetch_failed = |reason: String| AppError::ImageFetchFailed { url: url.to_string(), reason };

        let response = self.client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, fetch_failed))?;

        let status = response.status();
        if !status.is_success() {
            warn!("❌ Image fetch {} returned {}", url, status);
            return Err(fetch_failed(format!("status {status}")));
        }

        let bytes = response.bytes().await.map_err(|e| AppError::from_reqwest(e, fetch_failed))?;
        info!("🖼️ Fetched {} ({} bytes)", label, bytes.len());
        Ok(ImageBlob::new(label, bytes))
    }

    async fn read_template(&self, label: &str, name: &str) -> Result<ImageBlob> {
        let path = self.template_dir.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("📄 Read template {} ({} bytes)", path.display(), bytes.len());
                Ok(ImageBlob::new(label, bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("❌ Template {} missing from {}", name, self.template_dir.display());
                Err(AppError::ImageNotFound(name.to_string()))
            }
            Err(e) => Err(AppError::ImageFetchFailed { url: path.display().to_string(), reason: e.to_string() }),
        }
    }
}
