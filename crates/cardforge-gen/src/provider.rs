//! Image generation provider trait and request/response types

use async_trait::async_trait;
use cardforge_core::Result;
use serde::{Deserialize, Serialize};

/// A request for one piece of card artwork
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    /// File stem the raw image will be written under (the card id)
    pub file_stem: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ImageRequest {
    pub fn new(prompt: &str, negative_prompt: Option<&str>, file_stem: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            negative_prompt: negative_prompt.map(str::to_string),
            file_stem: file_stem.to_string(),
            width: 1024,
            height: 1024,
            seed: None,
        }
    }
}

/// Encoded image returned by a provider
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot (e.g. "png")
    pub extension: String,
    /// Model id that produced the image
    pub model: String,
    pub revised_prompt: Option<String>,
    pub seed: Option<u64>,
}

/// Something that turns a prompt into image bytes.
///
/// Implementations are shared across the concurrent calls of one chunk, so
/// `generate` takes `&self`. Any error is treated as a (possibly retryable)
/// task failure by the batch manager.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name (e.g. "mock")
    fn name(&self) -> &str;

    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage>;
}
