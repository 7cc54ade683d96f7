//! Crop, resize and frame compositing pipeline

use crate::crop::calculate_crop_region;
use crate::frames::{find_frame_template, FrameCache};
use crate::output::{OutputFormat, OutputSpec, ProcessingResult, SizeName, SizedPaths};
use cardforge_core::{CardForgeError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// One entry of a [`ImageProcessor::process_batch`] call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessItem {
    pub input_path: PathBuf,
    pub id: String,
    #[serde(default)]
    pub rarity: Option<String>,
}

/// Transform stage for raw generated artwork.
///
/// Owns the frame template cache; the cache lives as long as the processor
/// and is only emptied by [`ImageProcessor::clear_frames_cache`]. A processor
/// may be shared between threads.
pub struct ImageProcessor {
    spec: OutputSpec,
    frames_dir: Option<PathBuf>,
    frames: FrameCache,
}

impl ImageProcessor {
    pub fn new(spec: OutputSpec) -> Self {
        let mismatched = spec.mismatched_sizes();
        if !mismatched.is_empty() {
            tracing::warn!(
                sizes = ?mismatched,
                "output sizes differ in aspect ratio from medium; they will be stretched"
            );
        }
        Self {
            spec,
            frames_dir: None,
            frames: FrameCache::new(),
        }
    }

    /// Set the directory frame templates are looked up in
    pub fn with_frames_dir<P: Into<PathBuf>>(mut self, frames_dir: P) -> Self {
        self.frames_dir = Some(frames_dir.into());
        self
    }

    pub fn spec(&self) -> &OutputSpec {
        &self.spec
    }

    /// Produce small/medium/large outputs for one raw image, plus framed
    /// variants when `with_frame` is set.
    #[tracing::instrument(skip(self, input_path, output_dir), fields(input = %input_path.display()))]
    pub fn process(
        &self,
        input_path: &Path,
        output_dir: &Path,
        id: &str,
        rarity: Option<&str>,
    ) -> Result<ProcessingResult> {
        let source = decode_source(input_path)?;
        let (width, height) = source.dimensions();

        let medium = self.spec.medium;
        let region = calculate_crop_region(width, height, medium.width, medium.height);
        let cropped = source.crop_imm(region.left, region.top, region.width, region.height);

        std::fs::create_dir_all(output_dir)?;
        let ext = self.spec.format.extension();

        let mut plain = Vec::with_capacity(SizeName::ALL.len());
        for size in SizeName::ALL {
            let target = self.spec.size(size);
            let resized = cropped.resize_exact(target.width, target.height, FilterType::Lanczos3);
            let path = output_dir.join(format!("{}-{}.{}", id, size, ext));
            encode_image(&resized, &path, self.spec.format, self.spec.quality)?;
            tracing::debug!(path = %path.display(), "wrote output");
            plain.push((size, resized, path));
        }

        let framed_paths = if self.spec.with_frame {
            let mut framed = Vec::with_capacity(plain.len());
            for (size, image, path) in &plain {
                let framed_path = output_dir.join(format!("{}-{}-framed.{}", id, size, ext));
                self.write_framed(*size, image, path, &framed_path, rarity)?;
                framed.push(framed_path);
            }
            Some(sized_paths(framed))
        } else {
            None
        };

        Ok(ProcessingResult {
            card_id: id.to_string(),
            input_path: input_path.to_path_buf(),
            output_paths: sized_paths(plain.into_iter().map(|(_, _, p)| p).collect()),
            framed_paths,
        })
    }

    /// Process items one after another. Failed items are logged and left out
    /// of the result; `on_progress(processed, total)` runs after every item.
    pub fn process_batch<F>(
        &self,
        items: &[ProcessItem],
        output_dir: &Path,
        mut on_progress: F,
    ) -> Vec<ProcessingResult>
    where
        F: FnMut(usize, usize),
    {
        let total = items.len();
        let mut results = Vec::with_capacity(total);

        for (index, item) in items.iter().enumerate() {
            match self.process(&item.input_path, output_dir, &item.id, item.rarity.as_deref()) {
                Ok(result) => results.push(result),
                Err(e) => tracing::warn!(card = %item.id, error = %e, "skipping card"),
            }
            on_progress(index + 1, total);
        }

        tracing::info!(processed = results.len(), total, "batch processed");
        results
    }

    pub fn clear_frames_cache(&self) {
        self.frames.clear();
    }

    pub fn frames_cache_len(&self) -> usize {
        self.frames.len()
    }

    /// Number of template decodes since the processor was created
    pub fn frame_template_loads(&self) -> usize {
        self.frames.loads()
    }

    fn write_framed(
        &self,
        size: SizeName,
        plain: &DynamicImage,
        plain_path: &Path,
        framed_path: &Path,
        rarity: Option<&str>,
    ) -> Result<()> {
        let template = self
            .frames_dir
            .as_deref()
            .and_then(|dir| find_frame_template(dir, rarity, size));

        if let Some(template) = template {
            match self.composite(size, plain, &template, framed_path) {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!(
                    template = %template.display(),
                    error = %e,
                    "framing failed, using unframed output"
                ),
            }
        } else {
            tracing::debug!(%size, ?rarity, "no frame template, using unframed output");
        }

        std::fs::copy(plain_path, framed_path)?;
        Ok(())
    }

    fn composite(&self, size: SizeName, plain: &DynamicImage, template: &Path, out: &Path) -> Result<()> {
        let frame = self.frames.get_or_load(template, size, self.spec.size(size))?;
        let mut base = plain.to_rgba8();
        image::imageops::overlay(&mut base, frame.as_ref(), 0, 0);
        encode_image(&DynamicImage::ImageRgba8(base), out, self.spec.format, self.spec.quality)
    }
}

fn decode_source(path: &Path) -> Result<DynamicImage> {
    let image = image::open(path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "decode failed");
        CardForgeError::DimensionError(path.display().to_string())
    })?;
    if image.width() == 0 || image.height() == 0 {
        return Err(CardForgeError::DimensionError(path.display().to_string()));
    }
    Ok(image)
}

fn sized_paths(mut paths: Vec<PathBuf>) -> SizedPaths {
    let large = paths.pop().unwrap_or_default();
    let medium = paths.pop().unwrap_or_default();
    let small = paths.pop().unwrap_or_default();
    SizedPaths { small, medium, large }
}

fn encode_image(image: &DynamicImage, path: &Path, format: OutputFormat, quality: u8) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    match format {
        OutputFormat::Png => image.write_with_encoder(PngEncoder::new(writer))?,
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(writer, quality.clamp(1, 100)))?
        }
        // The image crate only ships a lossless WebP encoder.
        OutputFormat::Webp => image.write_with_encoder(WebPEncoder::new_lossless(writer))?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::TargetSize;
    use image::{Rgba, RgbaImage};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cardforge_processor_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn small_spec(with_frame: bool) -> OutputSpec {
        OutputSpec {
            small: TargetSize::new(30, 40),
            medium: TargetSize::new(60, 80),
            large: TargetSize::new(120, 160),
            format: OutputFormat::Png,
            quality: 90,
            with_frame,
        }
    }

    fn write_source(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn write_frame(path: &Path, color: [u8; 4]) {
        RgbaImage::from_pixel(50, 50, Rgba(color)).save(path).unwrap();
    }

    #[test]
    fn test_process_writes_all_sizes() {
        let dir = temp_dir();
        let input = write_source(&dir, "raw.png");
        let out = dir.join("out");
        let processor = ImageProcessor::new(small_spec(false));

        let result = processor.process(&input, &out, "fire-imp", None).unwrap();
        assert_eq!(result.card_id, "fire-imp");
        assert_eq!(result.input_path, input);
        assert!(result.framed_paths.is_none());
        assert_eq!(result.output_paths.large, out.join("fire-imp-large.png"));

        for size in SizeName::ALL {
            let target = processor.spec().size(size);
            let written = image::open(result.output_paths.get(size)).unwrap();
            assert_eq!(written.dimensions(), (target.width, target.height));
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_process_missing_input_is_dimension_error() {
        let dir = temp_dir();
        let processor = ImageProcessor::new(small_spec(false));
        let err = processor
            .process(&dir.join("nope.png"), &dir, "ghost", None)
            .unwrap_err();
        assert!(matches!(err, CardForgeError::DimensionError(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_frame_fallback_resizes_once_and_reuses_cache() {
        let dir = temp_dir();
        let frames = dir.join("frames");
        std::fs::create_dir_all(&frames).unwrap();
        write_frame(&frames.join("rare.png"), [255, 0, 0, 255]);

        let out = dir.join("out");
        let processor = ImageProcessor::new(small_spec(true)).with_frames_dir(&frames);

        let first_input = write_source(&dir, "a.png");
        let first = processor.process(&first_input, &out, "a", Some("rare")).unwrap();
        let framed = first.framed_paths.clone().unwrap();
        let large = image::open(&framed.large).unwrap().to_rgba8();
        assert_eq!(large.dimensions(), (120, 160));
        assert_eq!(processor.frame_template_loads(), 3);
        assert_eq!(processor.frames_cache_len(), 3);

        // Changing the file on disk must not matter until the cache is cleared.
        write_frame(&frames.join("rare.png"), [0, 0, 255, 255]);
        let second_input = write_source(&dir, "b.png");
        let second = processor.process(&second_input, &out, "b", Some("rare")).unwrap();
        assert_eq!(processor.frame_template_loads(), 3);

        let pixel = image::open(&second.framed_paths.unwrap().large)
            .unwrap()
            .to_rgba8()
            .get_pixel(60, 80)
            .0;
        assert!(pixel[0] > 200 && pixel[2] < 50, "expected cached red frame, got {:?}", pixel);

        processor.clear_frames_cache();
        assert_eq!(processor.frames_cache_len(), 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_template_copies_plain_output() {
        let dir = temp_dir();
        let frames = dir.join("frames");
        std::fs::create_dir_all(&frames).unwrap();
        let input = write_source(&dir, "raw.png");
        let out = dir.join("out");
        let processor = ImageProcessor::new(small_spec(true)).with_frames_dir(&frames);

        let result = processor.process(&input, &out, "c", Some("rare")).unwrap();
        let framed = result.framed_paths.unwrap();
        for size in SizeName::ALL {
            assert_eq!(
                std::fs::read(framed.get(size)).unwrap(),
                std::fs::read(result.output_paths.get(size)).unwrap()
            );
        }
        assert_eq!(processor.frames_cache_len(), 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_translucent_frame_blends_over_art() {
        let dir = temp_dir();
        let frames = dir.join("frames");
        std::fs::create_dir_all(&frames).unwrap();
        RgbaImage::from_pixel(30, 40, Rgba([0, 0, 0, 0]))
            .save(frames.join("common-small.png"))
            .unwrap();
        let input = write_source(&dir, "raw.png");
        let out = dir.join("out");
        let processor = ImageProcessor::new(small_spec(true)).with_frames_dir(&frames);

        let result = processor.process(&input, &out, "d", None).unwrap();
        let framed = image::open(&result.framed_paths.unwrap().small).unwrap().to_rgba8();
        let pixel = framed.get_pixel(15, 20).0;
        assert!(pixel.iter().all(|c| *c >= 250), "art should show through, got {:?}", pixel);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_batch_skips_failures_and_reports_progress() {
        let dir = temp_dir();
        let out = dir.join("out");
        let items = vec![
            ProcessItem {
                input_path: write_source(&dir, "one.png"),
                id: "one".to_string(),
                rarity: None,
            },
            ProcessItem {
                input_path: dir.join("missing.png"),
                id: "two".to_string(),
                rarity: None,
            },
            ProcessItem {
                input_path: write_source(&dir, "three.png"),
                id: "three".to_string(),
                rarity: Some("rare".to_string()),
            },
        ];
        let processor = ImageProcessor::new(small_spec(false));

        let mut progress = Vec::new();
        let results = processor.process_batch(&items, &out, |done, total| progress.push((done, total)));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].card_id, "one");
        assert_eq!(results[1].card_id, "three");
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_jpeg_output_extension() {
        let dir = temp_dir();
        let input = write_source(&dir, "raw.png");
        let out = dir.join("out");
        let spec = OutputSpec {
            format: OutputFormat::Jpeg,
            quality: 80,
            ..small_spec(false)
        };
        let processor = ImageProcessor::new(spec);

        let result = processor.process(&input, &out, "e", None).unwrap();
        assert_eq!(result.output_paths.small, out.join("e-small.jpg"));
        assert!(image::open(&result.output_paths.small).is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }
}
