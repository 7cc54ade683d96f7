//! Output specification and result types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One of the three output sizes produced per card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeName {
    Small,
    Medium,
    Large,
}

impl SizeName {
    /// All sizes, in output order
    pub const ALL: [SizeName; 3] = [SizeName::Small, SizeName::Medium, SizeName::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeName::Small => "small",
            SizeName::Medium => "medium",
            SizeName::Large => "large",
        }
    }
}

impl fmt::Display for SizeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact pixel dimensions for one output size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Encoded file format for processed outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    /// File extension used for outputs of this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
        }
    }

    /// Parse a user-facing format name ("png", "jpeg"/"jpg", "webp")
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            "webp" => Some(OutputFormat::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Per-size targets plus encoding options for one processing run.
///
/// All three sizes are expected to share one aspect ratio: the crop region is
/// derived from `medium` only and reused for `small` and `large`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub small: TargetSize,
    pub medium: TargetSize,
    pub large: TargetSize,
    pub format: OutputFormat,
    /// Quality for lossy formats (1-100). Ignored by lossless encoders.
    pub quality: u8,
    pub with_frame: bool,
}

impl OutputSpec {
    pub fn size(&self, name: SizeName) -> TargetSize {
        match name {
            SizeName::Small => self.small,
            SizeName::Medium => self.medium,
            SizeName::Large => self.large,
        }
    }

    /// Sizes whose aspect ratio differs noticeably from `medium`
    pub fn mismatched_sizes(&self) -> Vec<SizeName> {
        let reference = self.medium.aspect_ratio();
        [SizeName::Small, SizeName::Large]
            .into_iter()
            .filter(|s| (self.size(*s).aspect_ratio() - reference).abs() > 0.01)
            .collect()
    }
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            small: TargetSize::new(200, 280),
            medium: TargetSize::new(400, 560),
            large: TargetSize::new(800, 1120),
            format: OutputFormat::Webp,
            quality: 90,
            with_frame: true,
        }
    }
}

/// One path per output size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedPaths {
    pub small: PathBuf,
    pub medium: PathBuf,
    pub large: PathBuf,
}

impl SizedPaths {
    pub fn get(&self, size: SizeName) -> &Path {
        match size {
            SizeName::Small => &self.small,
            SizeName::Medium => &self.medium,
            SizeName::Large => &self.large,
        }
    }
}

/// Output of one transform run for a single card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub card_id: String,
    pub input_path: PathBuf,
    pub output_paths: SizedPaths,
    /// Present only when framing was requested
    #[serde(default)]
    pub framed_paths: Option<SizedPaths>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec_shares_aspect_ratio() {
        let spec = OutputSpec::default();
        assert!(spec.mismatched_sizes().is_empty());
        assert_eq!(spec.size(SizeName::Large), TargetSize::new(800, 1120));
    }

    #[test]
    fn test_mismatched_sizes_detected() {
        let spec = OutputSpec {
            small: TargetSize::new(100, 100),
            ..OutputSpec::default()
        };
        assert_eq!(spec.mismatched_sizes(), vec![SizeName::Small]);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("JPG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::parse("webp"), Some(OutputFormat::Webp));
        assert_eq!(OutputFormat::parse("gif"), None);
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
    }
}
