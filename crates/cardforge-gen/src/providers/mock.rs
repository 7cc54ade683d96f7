//! Mock provider for offline runs and tests
//!
//! Encodes a solid-color PNG whose color is derived from the prompt, so the
//! same request always yields the same bytes.

use crate::provider::{GeneratedImage, ImageProvider, ImageRequest};
use async_trait::async_trait;
use cardforge_core::{CardForgeError, Result};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};

pub const MOCK_MODEL: &str = "mock-solid-v1";

/// A provider that synthesizes placeholder artwork locally
#[derive(Debug, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let bytes = solid_png(&request.prompt, request.width, request.height)?;
        tracing::debug!(card = %request.file_stem, bytes = bytes.len(), "mock image generated");
        Ok(GeneratedImage {
            bytes,
            extension: "png".to_string(),
            model: MOCK_MODEL.to_string(),
            revised_prompt: None,
            seed: request.seed,
        })
    }
}

fn solid_png(prompt: &str, width: u32, height: u32) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(CardForgeError::ProviderError(format!(
            "Invalid image size {}x{}",
            width, height
        )));
    }

    let hash_val = prompt
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let color = Rgba([
        ((hash_val >> 16) & 0xFF) as u8,
        ((hash_val >> 8) & 0xFF) as u8,
        (hash_val & 0xFF) as u8,
        255,
    ]);
    let img = RgbaImage::from_pixel(width, height, color);

    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)?;
    Ok(bytes)
}
