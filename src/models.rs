use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, OneOrMany, formats::PreferMany};

use crate::error::{AppError, Result};

pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AdCreatorData {
    /// Product photos: remote URLs of uploaded files or inline base64.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub uploaded_images: Vec<String>,
    /// Layout templates: URLs pointing at template assets, bare file names, or inline base64.
    #[serde_as(as = "DefaultOnNull<OneOrMany<_, PreferMany>>")]
    #[serde(default)]
    pub selected_template_url: Vec<String>,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Percentage; range-checked by `validate`, not by the deserializer.
    #[serde(default = "default_level")]
    pub creativity_level: i64,
    #[serde(default = "default_level")]
    pub detail_level: i64,
    #[serde(default)]
    pub target_platform: TargetPlatform,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub image_size: Option<String>,
}

fn default_level() -> i64 { 50 }

impl Default for Settings {
    fn default() -> Self {
        Self {
            creativity_level: default_level(),
            detail_level: default_level(),
            target_platform: TargetPlatform::default(),
            aspect_ratio: AspectRatio::default(),
            image_size: None,
        }
    }
}

impl Settings {
    /// Size sent to the image API and echoed back to the client.
    pub fn effective_size(&self) -> &str {
        match self.image_size.as_deref().map(str::trim) {
            Some(size) if !size.is_empty() => size,
            _ => DEFAULT_IMAGE_SIZE,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0..=100).contains(&self.creativity_level) {
            return Err(AppError::InvalidRequest(format!("creativityLevel must be 0-100, got {}", self.creativity_level)));
        }
        if !(0..=100).contains(&self.detail_level) {
            return Err(AppError::InvalidRequest(format!("detailLevel must be 0-100, got {}", self.detail_level)));
        }
        let size = self.effective_size();
        if size != "auto" && parse_dimensions(size).is_none() {
            return Err(AppError::InvalidRequest(format!("imageSize must look like WxH, got '{}'", size)));
        }
        Ok(())
    }
}

fn parse_dimensions(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.split_once('x')?;
    let w: u32 = w.parse().ok()?;
    let h: u32 = h.parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    Instagram,
    Facebook,
    Twitter,
    Linkedin,
    Tiktok,
    Pinterest,
    Youtube,
    #[default]
    #[serde(other)]
    General,
}

impl TargetPlatform {
    pub fn label(self) -> &'static str {
        match self {
            TargetPlatform::Instagram => "Instagram",
            TargetPlatform::Facebook => "Facebook",
            TargetPlatform::Twitter => "Twitter / X",
            TargetPlatform::Linkedin => "LinkedIn",
            TargetPlatform::Tiktok => "TikTok",
            TargetPlatform::Pinterest => "Pinterest",
            TargetPlatform::Youtube => "YouTube",
            TargetPlatform::General => "general use",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:5")]
    Portrait,
    #[serde(rename = "9:16")]
    Story,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(other, rename = "custom")]
    Custom,
}

impl AspectRatio {
    pub fn label(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "4:5",
            AspectRatio::Story => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Classic => "4:3",
            AspectRatio::Custom => "custom",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// Base64 image data, or a hosted URL when the image API returns one.
    pub image_data: String,
    pub image_size: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub ad_creator_data: AdCreatorData,
    pub user_email: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub prompt: String,
    #[serde(default)]
    pub ad_creator_data: AdCreatorData,
    /// The composite canvas, base64 with or without a data-URI prefix.
    pub current_image: String,
    pub user_email: String,
    #[serde(default)]
    pub canvas_edit_data: Option<String>,
}
