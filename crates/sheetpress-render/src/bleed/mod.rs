// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bleed synthesis: turns a card image carrying `existing` px of margin into a
// tile carrying exactly `target` px, then shades it.

pub mod context;
pub mod flood;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod shading;

use std::sync::Arc;

use image::{Rgba, RgbaImage, imageops};
use sheetpress_core::config::DarkenSettings;
use sheetpress_core::error::{Result, SheetpressError};
use sheetpress_core::types::{DarkenMode, mm_to_px};
use tracing::{debug, instrument, warn};

pub use context::{ContextPool, PooledContext};
pub use flood::{FloodContext, KnownRect, SoftwareFlood};
pub use shading::{DarknessMemo, ShadeParams};

/// Pixel geometry of one synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    pub content_width: u32,
    pub content_height: u32,
    /// Margin baked into the source image.
    pub existing_px: u32,
    /// Margin the finished tile must carry.
    pub target_px: u32,
}

impl TileGeometry {
    pub fn source_size(&self) -> (u32, u32) {
        (
            self.content_width + 2 * self.existing_px,
            self.content_height + 2 * self.existing_px,
        )
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (
            self.content_width + 2 * self.target_px,
            self.content_height + 2 * self.target_px,
        )
    }

    /// Content rectangle inside the finished tile.
    pub fn content_rect(&self) -> KnownRect {
        KnownRect {
            x: self.target_px,
            y: self.target_px,
            width: self.content_width,
            height: self.content_height,
        }
    }
}

/// Which of the three margin paths a request takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleedPath {
    Trim,
    Passthrough,
    Generate,
}

pub fn choose_path(existing_px: u32, target_px: u32) -> BleedPath {
    use std::cmp::Ordering;
    match existing_px.cmp(&target_px) {
        Ordering::Greater => BleedPath::Trim,
        Ordering::Equal => BleedPath::Passthrough,
        Ordering::Less => BleedPath::Generate,
    }
}

/// Produces bleed tiles for one export.
pub struct BleedEngine {
    pool: Arc<ContextPool>,
    darken: DarkenSettings,
    falloff_px: u32,
    darkness: DarknessMemo,
}

impl BleedEngine {
    pub fn new(pool: Arc<ContextPool>, darken: DarkenSettings, dpi: u32) -> Self {
        let falloff_px = mm_to_px(darken.edge_falloff_mm, dpi);
        Self {
            pool,
            darken,
            falloff_px,
            darkness: DarknessMemo::new(),
        }
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Shading for one card; `mode` is the card's effective darken mode.
    pub fn shade_params(&self, image_id: &str, source: &RgbaImage, mode: DarkenMode) -> ShadeParams {
        if mode == DarkenMode::None {
            return ShadeParams::none();
        }
        let params = ShadeParams {
            mode,
            brightness: self.darken.brightness,
            contrast: self.darken.contrast,
            falloff_px: self.falloff_px,
        };
        if !self.darken.auto_detect {
            return params;
        }
        let factor = self
            .darkness
            .get_or_compute(image_id, || shading::darkness_factor(source));
        params.scaled(factor)
    }

    /// Build the finished tile for `source`.
    ///
    /// `source` must measure `geometry.source_size()`. The result measures
    /// `geometry.tile_size()`; content pixels are never resampled.
    #[instrument(skip(self, source))]
    pub fn synthesize(
        &self,
        image_id: &str,
        source: &RgbaImage,
        geometry: TileGeometry,
        mode: DarkenMode,
    ) -> Result<RgbaImage> {
        if source.dimensions() != geometry.source_size() {
            return Err(SheetpressError::ImageError(format!(
                "bleed source is {:?}, expected {:?}",
                source.dimensions(),
                geometry.source_size()
            )));
        }

        let path = choose_path(geometry.existing_px, geometry.target_px);
        let mut tile = match path {
            BleedPath::Passthrough => source.clone(),
            BleedPath::Trim => {
                let inset = geometry.existing_px - geometry.target_px;
                let (w, h) = geometry.tile_size();
                imageops::crop_imm(source, inset, inset, w, h).to_image()
            }
            BleedPath::Generate => self.generate(source, geometry)?,
        };
        debug!(?path, existing = geometry.existing_px, target = geometry.target_px, "bleed path");

        let params = self.shade_params(image_id, source, mode);
        shading::shade(&mut tile, geometry.content_rect(), &params);
        Ok(tile)
    }

    fn generate(&self, source: &RgbaImage, geometry: TileGeometry) -> Result<RgbaImage> {
        let (w, h) = geometry.tile_size();
        let offset = geometry.target_px - geometry.existing_px;
        let mut canvas = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]));
        imageops::replace(&mut canvas, source, offset as i64, offset as i64);

        let known = KnownRect {
            x: offset,
            y: offset,
            width: source.width(),
            height: source.height(),
        };
        let mut seeds = flood::init_seeds(w, h, known);

        // One retry on a fresh context when the first one is lost mid-pass.
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut context = self.pool.acquire()?;
            match context.propagate(&mut seeds, w, h) {
                Ok(()) => break,
                Err(SheetpressError::ContextLost(reason)) if attempts < 2 => {
                    warn!(%reason, backend = context.backend(), "retrying flood on a new context");
                    context.mark_lost();
                    seeds = flood::init_seeds(w, h, known);
                }
                Err(e) => {
                    if matches!(e, SheetpressError::ContextLost(_)) {
                        context.mark_lost();
                    }
                    return Err(e);
                }
            }
        }

        Ok(flood::resolve_colors(&canvas, &seeds))
    }
}

/// Flat grey tile used when synthesis is unavailable for a card.
pub fn flat_placeholder(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([200, 200, 200, 255]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(mode_settings: DarkenSettings) -> BleedEngine {
        BleedEngine::new(Arc::new(ContextPool::software()), mode_settings, 300)
    }

    /// A source with a distinct colour per pixel so trims can be checked.
    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    fn geometry(existing_px: u32, target_px: u32) -> TileGeometry {
        TileGeometry {
            content_width: 40,
            content_height: 56,
            existing_px,
            target_px,
        }
    }

    #[test]
    fn path_selection() {
        assert_eq!(choose_path(37, 12), BleedPath::Trim);
        assert_eq!(choose_path(12, 12), BleedPath::Passthrough);
        assert_eq!(choose_path(0, 24), BleedPath::Generate);
        assert_eq!(choose_path(0, 0), BleedPath::Passthrough);
    }

    #[test]
    fn passthrough_equals_copy_plus_shade() {
        let darken = DarkenSettings {
            mode: DarkenMode::ContrastEdgesOnly,
            ..DarkenSettings::default()
        };
        let engine = engine(darken);
        let g = geometry(5, 5);
        let (sw, sh) = g.source_size();
        let source = gradient(sw, sh);

        let tile = engine
            .synthesize("a.png", &source, g, DarkenMode::ContrastEdgesOnly)
            .expect("synthesize");

        let mut expected = source.clone();
        let params = engine.shade_params("a.png", &source, DarkenMode::ContrastEdgesOnly);
        shading::shade(&mut expected, g.content_rect(), &params);
        assert_eq!(tile.as_raw(), expected.as_raw());
    }

    #[test]
    fn built_in_margin_is_trimmed_to_target() {
        let dpi = 300;
        let existing = mm_to_px(3.0, dpi);
        let target = mm_to_px(1.0, dpi);
        let g = TileGeometry {
            content_width: mm_to_px(63.0, dpi),
            content_height: mm_to_px(88.0, dpi),
            existing_px: existing,
            target_px: target,
        };
        let (sw, sh) = g.source_size();
        let source = gradient(sw, sh);
        let tile = engine(DarkenSettings::default())
            .synthesize("b.png", &source, g, DarkenMode::None)
            .expect("synthesize");

        let margin_px = (tile.width() - g.content_width) / 2;
        assert!((margin_px as i64 - mm_to_px(1.0, dpi) as i64).abs() <= 1);
        // Top-left of the tile is the source pixel `existing - target` in.
        let inset = existing - target;
        assert_eq!(tile.get_pixel(0, 0), source.get_pixel(inset, inset));
    }

    #[test]
    fn generated_margin_keeps_content_intact() {
        let dpi = 300;
        let target = mm_to_px(2.0, dpi);
        assert_eq!(target, 24);
        let g = TileGeometry {
            content_width: 120,
            content_height: 160,
            existing_px: 0,
            target_px: target,
        };
        let source = gradient(120, 160);
        let tile = engine(DarkenSettings::default())
            .synthesize("c.png", &source, g, DarkenMode::None)
            .expect("synthesize");

        assert_eq!(tile.dimensions(), (120 + 48, 160 + 48));
        for y in 0..160 {
            for x in 0..120 {
                assert_eq!(tile.get_pixel(x + 24, y + 24), source.get_pixel(x, y));
            }
        }
        // Margin pixels take the colour of the nearest edge pixel.
        assert_eq!(tile.get_pixel(0, 30), source.get_pixel(0, 6));
        assert_eq!(tile.get_pixel(0, 0), source.get_pixel(0, 0));
        assert_eq!(tile.get_pixel(167, 207), source.get_pixel(119, 159));
    }

    #[test]
    fn generated_tile_has_no_transparent_gaps() {
        let g = geometry(0, 10);
        let source = gradient(40, 56);
        let tile = engine(DarkenSettings::default())
            .synthesize("d.png", &source, g, DarkenMode::None)
            .expect("synthesize");
        assert!(tile.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn zero_margin_is_passthrough() {
        let g = geometry(0, 0);
        let source = gradient(40, 56);
        let tile = engine(DarkenSettings::default())
            .synthesize("e.png", &source, g, DarkenMode::None)
            .expect("synthesize");
        assert_eq!(tile, source);
    }

    #[test]
    fn synthesis_is_reproducible() {
        let darken = DarkenSettings {
            auto_detect: true,
            ..DarkenSettings::default()
        };
        let engine = engine(darken);
        let g = geometry(2, 9);
        let (sw, sh) = g.source_size();
        let source = gradient(sw, sh);
        let a = engine
            .synthesize("f.png", &source, g, DarkenMode::DarkenAll)
            .expect("a");
        let b = engine
            .synthesize("f.png", &source, g, DarkenMode::DarkenAll)
            .expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_source_size_is_rejected() {
        let g = geometry(3, 3);
        let source = gradient(10, 10);
        assert!(matches!(
            engine(DarkenSettings::default()).synthesize("g.png", &source, g, DarkenMode::None),
            Err(SheetpressError::ImageError(_))
        ));
    }

    #[test]
    fn unavailable_context_surfaces_as_typed_error() {
        let pool = ContextPool::new(Box::new(|| {
            Err(SheetpressError::SynthesisUnavailable("no device".into()))
        }));
        let engine = BleedEngine::new(Arc::new(pool), DarkenSettings::default(), 300);
        let source = gradient(40, 56);
        assert!(matches!(
            engine.synthesize("h.png", &source, geometry(0, 4), DarkenMode::None),
            Err(SheetpressError::SynthesisUnavailable(_))
        ));
    }

    struct FlakyFlood {
        fail: bool,
    }

    impl FloodContext for FlakyFlood {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn propagate(&mut self, seeds: &mut Vec<i32>, width: u32, height: u32) -> Result<()> {
            if self.fail {
                return Err(SheetpressError::ContextLost("device reset".into()));
            }
            SoftwareFlood::new().propagate(seeds, width, height)
        }
    }

    #[test]
    fn lost_context_is_replaced_and_retried() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let pool = ContextPool::new(Box::new(move || {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Box::new(FlakyFlood { fail: n == 0 }) as Box<dyn FloodContext>)
        }));
        let engine = BleedEngine::new(Arc::new(pool), DarkenSettings::default(), 300);
        let source = gradient(40, 56);
        let tile = engine
            .synthesize("i.png", &source, geometry(0, 4), DarkenMode::None)
            .expect("retry succeeds");
        assert_eq!(tile.dimensions(), (48, 64));
        assert_eq!(engine.pool().lost(), 1);
        assert_eq!(engine.pool().created(), 2);
    }
}
