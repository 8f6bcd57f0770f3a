use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use crate::error::{AppError, Result};
use crate::images::{decode_base64, ImageBlob, ImageResolver};
use crate::models::{AdCreatorData, GenerationResult};
use crate::openai::{ImageModel, ImageRequest};
use crate::openrouter::ChatModel;
use crate::prompts;

/// The images for one image-API call, kept apart until they are flattened.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    pub current: Option<ImageBlob>,
    pub products: Vec<ImageBlob>,
    pub templates: Vec<ImageBlob>,
}

impl ImageSet {
    /// Current canvas (edit path only), then products, then templates.
    pub fn into_ordered(self) -> Vec<ImageBlob> {
        self.current.into_iter().chain(self.products).chain(self.templates).collect()
    }
}

/// Refines the user's prompt with the chat model, then composes or edits the ad
/// with the image model. Stateless: every request resolves its own images.
pub struct Orchestrator {
    resolver: ImageResolver,
    chat: Arc<dyn ChatModel>,
    images: Arc<dyn ImageModel>,
}

impl Orchestrator {
    pub fn new(resolver: ImageResolver, chat: Arc<dyn ChatModel>, images: Arc<dyn ImageModel>) -> Self {
        Self { resolver, chat, images }
    }

    /// Resolves every image for a request.
    ///
    /// Templates go first and are local reads or inline decodes, so a missing
    /// template aborts before any product photo is downloaded. Within each group
    /// the lookups run concurrently, keep their order and fail on the first error.
    pub async fn assemble(&self, current_image: Option<&str>, data: &AdCreatorData) -> Result<ImageSet> {
        let current = current_image
            .map(|image| decode_base64("canvas", image).map(|bytes| ImageBlob::new("canvas", bytes)))
            .transpose()?;

        let templates = try_join_all(data.selected_template_url.iter().enumerate().map(|(i, reference)| {
            self.resolver.resolve_template(format!("template-{}", i + 1), reference)
        }))
        .await?;

        let products = try_join_all(data.uploaded_images.iter().enumerate().map(|(i, reference)| {
            self.resolver.resolve_upload(format!("product-{}", i + 1), reference)
        }))
        .await?;

        debug!("🧩 Assembled {} product image(s) and {} template(s)", products.len(), templates.len());
        Ok(ImageSet { current, products, templates })
    }

    pub async fn generate(&self, prompt: &str, data: &AdCreatorData, user_email: &str) -> Result<GenerationResult> {
        let span = tracing::info_span!("orchestrate_generate", user = %user_email);
        async move {
            validate_prompt(prompt)?;
            data.settings.validate()?;
            let size = data.settings.effective_size().to_string();
            info!(
                "🚀 Generating ad: {} product image(s), {} template(s), size {}",
                data.uploaded_images.len(), data.selected_template_url.len(), size
            );

            let set = self.assemble(None, data).await?;
            let message = prompts::generation_message(prompt, data, &set.templates);
            let refined = self.chat.complete(vec![message]).await?;

            let output = self.images
                .render(ImageRequest { images: set.into_ordered(), prompt: refined, size: size.clone() })
                .await?;
            info!("✅ Ad generated");
            Ok(GenerationResult { image_data: output.into_inner(), image_size: size })
        }
        .instrument(span)
        .await
    }

    /// `canvas_edit_data` is accepted for API compatibility; the canvas marks are
    /// already rasterised into `current_image`.
    pub async fn edit(
        &self,
        prompt: &str,
        data: &AdCreatorData,
        current_image: &str,
        user_email: &str,
        canvas_edit_data: Option<&str>,
    ) -> Result<GenerationResult> {
        let span = tracing::info_span!("orchestrate_edit", user = %user_email);
        async move {
            validate_prompt(prompt)?;
            data.settings.validate()?;
            if current_image.trim().is_empty() {
                return Err(AppError::InvalidRequest("currentImage is required".into()));
            }
            if canvas_edit_data.is_some() {
                debug!("Ignoring canvasEditData; edits are read from the canvas image");
            }
            let size = data.settings.effective_size().to_string();
            info!(
                "🖌️ Editing ad: canvas + {} product image(s) + {} template(s), size {}",
                data.uploaded_images.len(), data.selected_template_url.len(), size
            );

            let set = self.assemble(Some(current_image), data).await?;
            let refined = self.chat.complete(vec![prompts::edit_message(prompt, current_image)]).await?;

            let output = self.images
                .render(ImageRequest { images: set.into_ordered(), prompt: refined, size: size.clone() })
                .await?;
            info!("✅ Ad edited");
            Ok(GenerationResult { image_data: output.into_inner(), image_size: size })
        }
        .instrument(span)
        .await
    }
}

fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(AppError::InvalidRequest("prompt must not be empty".into()));
    }
    Ok(())
}
