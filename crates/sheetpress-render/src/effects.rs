// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-card effect overrides, with results kept in the effect cache.

use image::{DynamicImage, RgbaImage};
use sheetpress_cache::{EffectCache, effect_cache_key, has_effects};
use sheetpress_core::types::{EffectOverrides, ImageRef};
use tracing::{debug, warn};

use crate::image::ImageProcessor;

/// Apply every override that differs from neutral, in a fixed order.
pub fn apply_overrides(image: RgbaImage, overrides: &EffectOverrides) -> RgbaImage {
    let mut proc = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(image));
    if overrides.grayscale == Some(true) {
        proc = proc.grayscale();
    }
    if let Some(brightness) = overrides.brightness {
        proc = proc.adjust_brightness(brightness);
    }
    if let Some(contrast) = overrides.contrast {
        proc = proc.adjust_contrast(contrast);
    }
    if let Some(saturation) = overrides.saturation {
        proc = proc.adjust_saturation(saturation);
    }
    if let Some(gamma) = overrides.gamma {
        proc = proc.adjust_gamma(gamma);
    }
    if let Some(sharpness) = overrides.sharpness {
        proc = proc.sharpen(sharpness);
    }
    if let Some(strength) = overrides.holographic {
        proc = proc.holographic(strength);
    }
    proc.into_rgba()
}

/// Applies overrides through an optional effect cache.
#[derive(Clone, Default)]
pub struct EffectApplier {
    cache: Option<EffectCache>,
}

impl EffectApplier {
    pub fn new(cache: Option<EffectCache>) -> Self {
        Self { cache }
    }

    /// Adjusted copy of `source` for `image`. Cache entries whose size does
    /// not match `source` are ignored.
    pub fn adjusted(
        &self,
        image: &ImageRef,
        source: RgbaImage,
        overrides: &EffectOverrides,
        dpi: u32,
    ) -> RgbaImage {
        if !has_effects(overrides) {
            return source;
        }
        let Some(cache) = &self.cache else {
            return apply_overrides(source, overrides);
        };

        let key = effect_cache_key(image, overrides, dpi);
        let dimensions = source.dimensions();
        if let Some(bytes) = cache.lookup(&key) {
            match ImageProcessor::from_bytes(&bytes) {
                Ok(proc) if (proc.width(), proc.height()) == dimensions => {
                    return proc.into_rgba();
                }
                Ok(_) => debug!(key = %key, "cached effect has a different size, recomputing"),
                Err(e) => warn!(key = %key, error = %e, "cached effect unreadable, recomputing"),
            }
        }

        let adjusted = apply_overrides(source, overrides);
        let encoded = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(adjusted.clone()))
            .to_png_bytes();
        match encoded {
            Ok(bytes) => {
                // Detached; the render never waits on this write.
                let _ = cache.put_detached(key, bytes);
            }
            Err(e) => warn!(error = %e, "could not encode effect result for caching"),
        }
        adjusted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use sheetpress_cache::MemoryEffectStore;
    use sheetpress_core::types::DarkenMode;
    use std::sync::Arc;

    fn source() -> RgbaImage {
        RgbaImage::from_pixel(6, 4, Rgba([100, 150, 200, 255]))
    }

    fn brighter() -> EffectOverrides {
        EffectOverrides {
            brightness: Some(10.0),
            ..Default::default()
        }
    }

    #[test]
    fn neutral_overrides_leave_image_alone() {
        let applier = EffectApplier::new(Some(EffectCache::in_memory()));
        let out = applier.adjusted(
            &ImageRef::new("a.png"),
            source(),
            &EffectOverrides::default(),
            300,
        );
        assert_eq!(out, source());
    }

    #[test]
    fn darken_only_card_skips_the_cache() {
        let store = Arc::new(MemoryEffectStore::new());
        let applier = EffectApplier::new(Some(EffectCache::new(store.clone())));
        let overrides = EffectOverrides {
            darken: Some(DarkenMode::ContrastFullImage),
            ..Default::default()
        };
        let out = applier.adjusted(&ImageRef::new("a.png"), source(), &overrides, 300);
        assert_eq!(out, source());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn overrides_apply_in_order() {
        let overrides = EffectOverrides {
            grayscale: Some(true),
            brightness: Some(5.0),
            ..Default::default()
        };
        let out = apply_overrides(source(), &overrides);
        let [r, g, b, a] = out.get_pixel(0, 0).0;
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, 255);
    }

    #[test]
    fn result_is_cached_and_reused() {
        let store = Arc::new(MemoryEffectStore::new());
        let cache = EffectCache::new(store.clone());
        let applier = EffectApplier::new(Some(cache.clone()));
        let image = ImageRef::new("a.png");

        let first = applier.adjusted(&image, source(), &brighter(), 300);
        assert_eq!(first.get_pixel(0, 0).0, [110, 160, 210, 255]);

        // Wait for the detached writer by polling the store.
        let key = effect_cache_key(&image, &brighter(), 300);
        for _ in 0..200 {
            if cache.lookup(&key).is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(store.len(), 1);

        // A poisoned source proves the second call reads from the cache.
        let different = RgbaImage::from_pixel(6, 4, Rgba([0, 0, 0, 255]));
        let second = applier.adjusted(&image, different, &brighter(), 300);
        assert_eq!(second, first);
    }

    #[test]
    fn size_mismatch_is_a_miss() {
        let cache = EffectCache::in_memory();
        let image = ImageRef::new("a.png");
        let key = effect_cache_key(&image, &brighter(), 300);
        let tiny = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            1,
            1,
            Rgba([1, 2, 3, 255]),
        )))
        .to_png_bytes()
        .expect("encode");
        // No runtime here, so the write lands before this returns.
        assert!(cache.put_detached(key, tiny).is_none());

        let applier = EffectApplier::new(Some(cache));
        let out = applier.adjusted(&image, source(), &brighter(), 300);
        assert_eq!(out.dimensions(), (6, 4));
        assert_eq!(out.get_pixel(0, 0).0, [110, 160, 210, 255]);
    }
}
