//! CardForge Image - transform stage for generated card artwork
//!
//! Takes one raw generated image and produces small/medium/large crops,
//! optionally composited with a rarity- and size-appropriate frame template.
//! Frame templates are decoded and resized once per processor instance and
//! kept in an in-memory cache until explicitly cleared.

pub mod crop;
pub mod frames;
pub mod inspect;
pub mod output;
pub mod processor;

pub use crop::{calculate_crop_region, CropRegion};
pub use frames::{find_frame_template, FrameCache};
pub use inspect::{get_image_info, validate_image, ImageInfo, ImageValidation};
pub use output::{OutputFormat, OutputSpec, ProcessingResult, SizeName, SizedPaths, TargetSize};
pub use processor::{ImageProcessor, ProcessItem};
