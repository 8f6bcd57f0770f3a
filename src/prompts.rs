use crate::images::{as_data_uri, is_remote, template_file_name, ImageBlob};
use crate::models::{AdCreatorData, Settings};
use crate::openrouter::{ChatMessage, ContentPart};

/// Instruction for the vision model on the generation path.
pub fn generation_instruction(prompt: &str, settings: &Settings, product_count: usize, template_count: usize) -> String {
    let products = match product_count {
        0 => "No product photo was supplied; build the ad from the user's request alone.".to_string(),
        1 => "The FIRST image is the product photo.".to_string(),
        n => format!("The FIRST {n} images are product photos."),
    };
    let template = if template_count == 0 {
        "No layout template was supplied; choose a clean, conventional ad layout."
    } else {
        "The LAST image is the layout template the product must be placed into."
    };

    format!(
        "You are an expert advertising art director. Turn the user's request into one precise, \
self-contained prompt for an image model that composes a product advertisement.

User request: \"{prompt}\"

Creativity level: {creativity}% (0% = follow the template literally with no reinterpretation, 100% = bold, highly original reinterpretation of the template)
Detail level: {detail}% (0% = clean and minimal, 100% = richly detailed, intricate scene)
Target platform: {platform}
Aspect ratio: {ratio}

{products}
{template}

Rules:
1. Keep the product EXACTLY as it appears in its photo: same shape, colors, materials, labels, logos and printed text. Never redraw, restyle or replace it.
2. Compose the product into the template layout, keeping the template's structure, text zones and overall composition.
3. The result must look like a real photograph or professional ad render, with consistent lighting, shadows, reflections and perspective.
4. Every piece of text in the ad must be sharp, correctly spelled and legible.
5. Reply with the final image prompt only, without preamble or explanation.",
        creativity = settings.creativity_level,
        detail = settings.detail_level,
        platform = settings.target_platform.label(),
        ratio = settings.aspect_ratio.label(),
    )
}

/// One chat message: the instruction, then product images, then template images.
///
/// Uploaded images are forwarded as-is (the vision model fetches URLs itself);
/// file-backed templates are inlined from their resolved blobs.
pub fn generation_message(prompt: &str, data: &AdCreatorData, templates: &[ImageBlob]) -> ChatMessage {
    let instruction = generation_instruction(prompt, &data.settings, data.uploaded_images.len(), data.selected_template_url.len());
    let mut content = vec![ContentPart::text(instruction)];

    for upload in &data.uploaded_images {
        let url = if is_remote(upload) { upload.trim().to_string() } else { as_data_uri(upload) };
        content.push(ContentPart::image(url));
    }
    for (reference, blob) in data.selected_template_url.iter().zip(templates) {
        let url = if template_file_name(reference).is_some() { blob.to_data_uri() } else { as_data_uri(reference) };
        content.push(ContentPart::image(url));
    }

    ChatMessage::user(content)
}

/// Instruction for the vision model on the edit path.
pub fn edit_instruction(prompt: &str) -> String {
    format!(
        "The attached image is an advertisement the user has marked up by hand: brush strokes, scribbles, \
shapes or added text show where and what should change.

User instruction: \"{prompt}\"

Write one precise prompt for an image editing model that applies the requested change ONLY inside the \
regions the user visibly marked. Everything outside those regions (the product, background, layout, \
colors, typography and existing text) must stay exactly as it is. Describe what the marked regions \
should become, not how they look now.

Reply with the final edit prompt only, without preamble or explanation."
    )
}

pub fn edit_message(prompt: &str, current_image: &str) -> ChatMessage {
    ChatMessage::user(vec![
        ContentPart::text(edit_instruction(prompt)),
        ContentPart::image(as_data_uri(current_image)),
    ])
}
