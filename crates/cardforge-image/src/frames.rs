//! Frame template lookup and cache
//!
//! Templates live in a single directory and are picked by rarity and output
//! size with a fixed fallback order:
//! `<rarity>-<size>.png`, `<rarity>.png`, `common-<size>.png`, `common.png`.

use crate::output::{SizeName, TargetSize};
use cardforge_core::Result;
use image::imageops::FilterType;
use image::RgbaImage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const FALLBACK_RARITY: &str = "common";

/// Candidate template paths for a rarity/size pair, in lookup order
pub fn template_candidates(frames_dir: &Path, rarity: Option<&str>, size: SizeName) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(4);
    if let Some(rarity) = rarity.filter(|r| !r.is_empty()) {
        candidates.push(frames_dir.join(format!("{}-{}.png", rarity, size)));
        candidates.push(frames_dir.join(format!("{}.png", rarity)));
    }
    candidates.push(frames_dir.join(format!("{}-{}.png", FALLBACK_RARITY, size)));
    candidates.push(frames_dir.join(format!("{}.png", FALLBACK_RARITY)));
    candidates
}

/// First existing template for a rarity/size pair, if any
pub fn find_frame_template(frames_dir: &Path, rarity: Option<&str>, size: SizeName) -> Option<PathBuf> {
    template_candidates(frames_dir, rarity, size)
        .into_iter()
        .find(|p| p.is_file())
}

/// Decoded frame templates keyed by `(template path, size)`.
///
/// Entries hold the template already resized to the size's target
/// dimensions. There is no staleness detection: if template files change on
/// disk, call [`FrameCache::clear`].
#[derive(Default)]
pub struct FrameCache {
    entries: Mutex<HashMap<(PathBuf, SizeName), Arc<RgbaImage>>>,
    loads: AtomicUsize,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the template for `size`, decoding and resizing it on first use.
    ///
    /// The lock is held across the load so concurrent callers never decode the
    /// same template twice.
    pub fn get_or_load(&self, template: &Path, size: SizeName, target: TargetSize) -> Result<Arc<RgbaImage>> {
        let mut entries = self.entries.lock();
        let key = (template.to_path_buf(), size);
        if let Some(hit) = entries.get(&key) {
            tracing::debug!(template = %template.display(), %size, "frame cache hit");
            return Ok(Arc::clone(hit));
        }

        let mut frame = image::open(template)?.to_rgba8();
        if frame.dimensions() != (target.width, target.height) {
            tracing::debug!(
                template = %template.display(),
                %size,
                from = ?frame.dimensions(),
                to = ?(target.width, target.height),
                "resizing frame template"
            );
            frame = image::imageops::resize(&frame, target.width, target.height, FilterType::Lanczos3);
        }
        self.loads.fetch_add(1, Ordering::Relaxed);

        let frame = Arc::new(frame);
        entries.insert(key, Arc::clone(&frame));
        Ok(frame)
    }

    /// Drop every cached template
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times a template file was decoded since creation
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cardforge_frames_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_frame(dir: &Path, name: &str, w: u32, h: u32) {
        RgbaImage::from_pixel(w, h, Rgba([200, 30, 30, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_lookup_order() {
        let dir = temp_dir();
        write_frame(&dir, "rare-large.png", 4, 4);
        write_frame(&dir, "rare.png", 4, 4);
        write_frame(&dir, "common.png", 4, 4);

        assert_eq!(
            find_frame_template(&dir, Some("rare"), SizeName::Large),
            Some(dir.join("rare-large.png"))
        );
        assert_eq!(
            find_frame_template(&dir, Some("rare"), SizeName::Small),
            Some(dir.join("rare.png"))
        );
        assert_eq!(
            find_frame_template(&dir, Some("epic"), SizeName::Small),
            Some(dir.join("common.png"))
        );
        assert_eq!(
            find_frame_template(&dir, None, SizeName::Medium),
            Some(dir.join("common.png"))
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_common_size_beats_common() {
        let dir = temp_dir();
        write_frame(&dir, "common-medium.png", 4, 4);
        write_frame(&dir, "common.png", 4, 4);

        assert_eq!(
            find_frame_template(&dir, Some("legendary"), SizeName::Medium),
            Some(dir.join("common-medium.png"))
        );
        assert_eq!(
            find_frame_template(&dir, Some("legendary"), SizeName::Small),
            Some(dir.join("common.png"))
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_no_template_found() {
        let dir = temp_dir();
        assert!(find_frame_template(&dir, Some("rare"), SizeName::Large).is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_cache_resizes_once_per_size() {
        let dir = temp_dir();
        write_frame(&dir, "rare.png", 10, 10);
        let path = dir.join("rare.png");
        let cache = FrameCache::new();

        let first = cache.get_or_load(&path, SizeName::Large, TargetSize::new(30, 40)).unwrap();
        assert_eq!(first.dimensions(), (30, 40));
        let again = cache.get_or_load(&path, SizeName::Large, TargetSize::new(30, 40)).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.loads(), 1);

        cache.get_or_load(&path, SizeName::Small, TargetSize::new(10, 10)).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.loads(), 2);

        cache.clear();
        assert!(cache.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unreadable_template_errors() {
        let dir = temp_dir();
        let path = dir.join("common.png");
        std::fs::write(&path, b"not a png").unwrap();
        let cache = FrameCache::new();
        assert!(cache.get_or_load(&path, SizeName::Small, TargetSize::new(4, 4)).is_err());
        assert!(cache.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
