//! Aspect-ratio crop region calculation

use serde::{Deserialize, Serialize};

/// Rectangular sub-area of a source image, in source pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute the centered crop of a `source_width` x `source_height` image that
/// matches the `target_width:target_height` aspect ratio.
///
/// A source wider than the target keeps its full height and loses equal
/// slices on the left and right; a taller source keeps its full width.
/// Rounding is half away from zero.
pub fn calculate_crop_region(
    source_width: u32,
    source_height: u32,
    target_width: u32,
    target_height: u32,
) -> CropRegion {
    let source_ratio = source_width as f64 / source_height as f64;
    let target_ratio = target_width as f64 / target_height as f64;

    if source_ratio > target_ratio {
        let width = ((source_height as f64 * target_ratio).round() as u32).clamp(1, source_width);
        let left = ((source_width - width) as f64 / 2.0).round() as u32;
        CropRegion {
            left,
            top: 0,
            width,
            height: source_height,
        }
    } else if source_ratio < target_ratio {
        let height = ((source_width as f64 / target_ratio).round() as u32).clamp(1, source_height);
        let top = ((source_height - height) as f64 / 2.0).round() as u32;
        CropRegion {
            left: 0,
            top,
            width: source_width,
            height,
        }
    } else {
        CropRegion {
            left: 0,
            top: 0,
            width: source_width,
            height: source_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_source_centers_horizontally() {
        let region = calculate_crop_region(1000, 500, 3, 4);
        assert_eq!(region.height, 500);
        assert_eq!(region.width, 375);
        assert_eq!(region.left, 313);
        assert_eq!(region.top, 0);
    }

    #[test]
    fn test_tall_source_centers_vertically() {
        let region = calculate_crop_region(500, 1000, 1, 1);
        assert_eq!(
            region,
            CropRegion {
                left: 0,
                top: 250,
                width: 500,
                height: 500
            }
        );
    }

    #[test]
    fn test_matching_ratio_keeps_everything() {
        let region = calculate_crop_region(800, 1120, 400, 560);
        assert_eq!(
            region,
            CropRegion {
                left: 0,
                top: 0,
                width: 800,
                height: 1120
            }
        );
    }

    #[test]
    fn test_square_source_card_target() {
        // 1024 * 400/560 = 731.43 -> 731; (1024 - 731) / 2 = 146.5 -> 147
        let region = calculate_crop_region(1024, 1024, 400, 560);
        assert_eq!(region.width, 731);
        assert_eq!(region.left, 147);
        assert!(region.left + region.width <= 1024);
    }

    #[test]
    fn test_region_stays_inside_tiny_source() {
        let region = calculate_crop_region(3, 1, 1, 100);
        assert!(region.width >= 1);
        assert!(region.left + region.width <= 3);
        assert_eq!(region.height, 1);
    }
}
