//! Image inspection and validation
//!
//! Cheap header-only checks used before feeding generated artwork into the
//! transform stage.

use cardforge_core::{CardForgeError, Result};
use image::ImageReader;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Basic facts about an image file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Detected container format (e.g. "png", "jpeg", "webp")
    pub format: Option<String>,
    pub size_bytes: u64,
}

/// Result of [`validate_image`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageValidation {
    pub valid: bool,
    pub issues: Vec<String>,
}

/// Read dimensions, format and size without decoding pixel data
pub fn get_image_info(path: &Path) -> Result<ImageInfo> {
    let size_bytes = std::fs::metadata(path)?.len();
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader
        .format()
        .map(|f| format!("{:?}", f).to_lowercase());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|_| CardForgeError::DimensionError(path.display().to_string()))?;

    Ok(ImageInfo {
        width,
        height,
        format,
        size_bytes,
    })
}

/// Check that an image exists, is non-empty, is readable and meets minimum
/// dimensions. Every failed check adds one human-readable issue.
pub fn validate_image(path: &Path, min_width: u32, min_height: u32) -> ImageValidation {
    let mut issues = Vec::new();

    match std::fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => issues.push("File is empty".to_string()),
        Ok(_) => match get_image_info(path) {
            Ok(info) => {
                if info.width < min_width {
                    issues.push(format!(
                        "Width {}px is below minimum {}px",
                        info.width, min_width
                    ));
                }
                if info.height < min_height {
                    issues.push(format!(
                        "Height {}px is below minimum {}px",
                        info.height, min_height
                    ));
                }
            }
            Err(e) => issues.push(format!("Unreadable image: {}", e)),
        },
        Err(e) => issues.push(format!("Cannot access file: {}", e)),
    }

    ImageValidation {
        valid: issues.is_empty(),
        issues,
    }
}
