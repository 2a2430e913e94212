// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tile preparation: fetch, decode, resize, adjust, and bleed one card.
//
// Per-card failures never fail the page. A missing or unreadable image
// becomes a labelled placeholder; a synthesis failure becomes a flat grey tile.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use sheetpress_core::config::ExportSettings;
use sheetpress_core::error::{FailureScope, Result, SheetpressError, classify_error};
use sheetpress_core::types::{CardRenderItem, mm_to_px};
use tracing::{debug, warn};

use crate::bleed::{BleedEngine, TileGeometry, flat_placeholder};
use crate::compose::PreparedTile;
use crate::effects::EffectApplier;
use crate::image::ImageProcessor;
use crate::layout::{CardPlacement, SheetLayout};
use crate::source::ImageSource;

/// Text written over tiles whose artwork could not be loaded.
pub const MISSING_IMAGE_LABEL: &str = "Image not found";

/// Grey tile with a cross through the content area.
pub fn missing_image_tile(geometry: &TileGeometry) -> RgbaImage {
    let (w, h) = geometry.tile_size();
    let mut tile = RgbaImage::from_pixel(w, h, Rgba([232, 232, 232, 255]));
    let m = geometry.target_px as f32;
    let (cw, ch) = (geometry.content_width as f32, geometry.content_height as f32);
    let ink = Rgba([150, 150, 150, 255]);
    draw_line_segment_mut(&mut tile, (m, m), (m + cw - 1.0, m + ch - 1.0), ink);
    draw_line_segment_mut(&mut tile, (m + cw - 1.0, m), (m, m + ch - 1.0), ink);
    tile
}

/// Turns cards into finished tiles.
pub struct TilePreparer {
    settings: Arc<ExportSettings>,
    source: Arc<dyn ImageSource>,
    effects: EffectApplier,
    bleed: Arc<BleedEngine>,
}

impl TilePreparer {
    pub fn new(
        settings: Arc<ExportSettings>,
        source: Arc<dyn ImageSource>,
        effects: EffectApplier,
        bleed: Arc<BleedEngine>,
    ) -> Self {
        Self {
            settings,
            source,
            effects,
            bleed,
        }
    }

    fn geometry(&self, placement: &CardPlacement) -> TileGeometry {
        TileGeometry {
            content_width: placement.footprint.content_width,
            content_height: placement.footprint.content_height,
            existing_px: mm_to_px(placement.bleed.existing_margin_mm, self.settings.page.dpi),
            target_px: placement.footprint.margin_px,
        }
    }

    /// Prepare one card. `None` for blank cards.
    pub fn prepare(
        &self,
        card: &CardRenderItem,
        placement: &CardPlacement,
    ) -> Result<Option<PreparedTile>> {
        if placement.blank {
            return Ok(None);
        }
        let geometry = self.geometry(placement);
        let missing = || PreparedTile {
            card_index: placement.card_index,
            image: missing_image_tile(&geometry),
            label: Some(MISSING_IMAGE_LABEL.to_string()),
        };

        let image_ref = match (&card.image, card.no_image) {
            (Some(image), false) => image,
            _ => return Ok(Some(missing())),
        };

        let decoded = self
            .source
            .fetch(image_ref)
            .and_then(|bytes| ImageProcessor::from_bytes(&bytes));
        let processor = match decoded {
            Ok(processor) => processor,
            Err(e) => {
                warn!(card = %card.id, image = %image_ref, error = %e, "card image unavailable");
                return Ok(Some(missing()));
            }
        };

        let (sw, sh) = geometry.source_size();
        let resized = processor.resize_exact(sw, sh).into_rgba();
        let adjusted = self
            .effects
            .adjusted(image_ref, resized, &card.overrides, self.settings.page.dpi);

        let mode = card.overrides.darken.unwrap_or(self.settings.darken.mode);
        let image = match self.bleed.synthesize(image_ref.as_str(), &adjusted, geometry, mode) {
            Ok(tile) => tile,
            Err(e) if classify_error(&e) == FailureScope::Card => {
                warn!(card = %card.id, error = %e, "bleed synthesis failed, using flat tile");
                let (w, h) = geometry.tile_size();
                flat_placeholder(w, h)
            }
            Err(e) => return Err(e),
        };

        Ok(Some(PreparedTile {
            card_index: placement.card_index,
            image,
            label: None,
        }))
    }

    /// Prepare every drawn card of a page on up to `tile_concurrency` threads.
    ///
    /// Returns `Cancelled` as soon as `abort` is observed.
    pub fn prepare_page(
        &self,
        cards: &[CardRenderItem],
        layout: &SheetLayout,
        abort: &AtomicBool,
    ) -> Result<Vec<PreparedTile>> {
        let work: Vec<&CardPlacement> = layout.placements.iter().filter(|p| !p.blank).collect();
        if work.is_empty() {
            return Ok(Vec::new());
        }
        let workers = self.settings.tuning.tile_concurrency.clamp(1, work.len());
        let next = AtomicUsize::new(0);

        let results: Vec<Result<Vec<PreparedTile>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| -> Result<Vec<PreparedTile>> {
                        let mut done = Vec::new();
                        loop {
                            if abort.load(Ordering::Acquire) {
                                return Err(SheetpressError::Cancelled);
                            }
                            let i = next.fetch_add(1, Ordering::Relaxed);
                            let Some(placement) = work.get(i) else {
                                return Ok(done);
                            };
                            let card = cards.get(placement.card_index).ok_or_else(|| {
                                SheetpressError::Coordinator(format!(
                                    "placement for missing card {}",
                                    placement.card_index
                                ))
                            })?;
                            if let Some(tile) = self.prepare(card, placement)? {
                                done.push(tile);
                            }
                        }
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(SheetpressError::Coordinator("tile worker panicked".into()))
                    })
                })
                .collect()
        });

        let mut tiles = Vec::with_capacity(work.len());
        for result in results {
            tiles.extend(result?);
        }
        if abort.load(Ordering::Acquire) {
            return Err(SheetpressError::Cancelled);
        }
        tiles.sort_by_key(|t| t.card_index);
        debug!(tiles = tiles.len(), workers, "page tiles prepared");
        Ok(tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bleed::ContextPool;
    use crate::layout::compute_layout;
    use crate::source::MemoryImageSource;
    use image::DynamicImage;

    fn png(color: [u8; 4], w: u32, h: u32) -> Vec<u8> {
        ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            w,
            h,
            Rgba(color),
        )))
        .to_png_bytes()
        .expect("encode")
    }

    fn settings() -> Arc<ExportSettings> {
        let mut s = ExportSettings::default();
        // Small cards keep the tests quick.
        s.page.dpi = 100;
        s.layout.card_width_mm = 20.0;
        s.layout.card_height_mm = 30.0;
        Arc::new(s)
    }

    fn preparer(source: MemoryImageSource) -> TilePreparer {
        let settings = settings();
        let bleed = BleedEngine::new(
            Arc::new(ContextPool::software()),
            settings.darken.clone(),
            settings.page.dpi,
        );
        TilePreparer::new(
            settings,
            Arc::new(source),
            EffectApplier::default(),
            Arc::new(bleed),
        )
    }

    #[test]
    fn tile_matches_footprint() {
        let source = MemoryImageSource::new().with("a.png", png([10, 20, 30, 255], 50, 70));
        let prep = preparer(source);
        let cards = vec![CardRenderItem::new("a", "a.png")];
        let layout = compute_layout(&cards, &settings()).expect("layout");
        let tile = prep
            .prepare(&cards[0], &layout.placements[0])
            .expect("prepare")
            .expect("drawn");
        let fp = layout.placements[0].footprint;
        assert_eq!(tile.image.dimensions(), (fp.total_width(), fp.total_height()));
        assert!(tile.label.is_none());
        assert_eq!(tile.image.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn missing_image_becomes_labelled_placeholder() {
        let prep = preparer(MemoryImageSource::new());
        let cards = vec![CardRenderItem::new("a", "gone.png")];
        let layout = compute_layout(&cards, &settings()).expect("layout");
        let tile = prep
            .prepare(&cards[0], &layout.placements[0])
            .expect("prepare")
            .expect("drawn");
        assert_eq!(tile.label.as_deref(), Some(MISSING_IMAGE_LABEL));
    }

    #[test]
    fn undecodable_image_becomes_placeholder() {
        let source = MemoryImageSource::new().with("bad.png", b"not a png".to_vec());
        let prep = preparer(source);
        let cards = vec![CardRenderItem::new("a", "bad.png")];
        let layout = compute_layout(&cards, &settings()).expect("layout");
        let tile = prep
            .prepare(&cards[0], &layout.placements[0])
            .expect("prepare")
            .expect("drawn");
        assert_eq!(tile.label.as_deref(), Some(MISSING_IMAGE_LABEL));
    }

    #[test]
    fn blank_cards_produce_no_tile() {
        let prep = preparer(MemoryImageSource::new());
        let cards = vec![CardRenderItem::blank()];
        let layout = compute_layout(&cards, &settings()).expect("layout");
        assert!(prep
            .prepare(&cards[0], &layout.placements[0])
            .expect("prepare")
            .is_none());
    }

    #[test]
    fn page_tiles_come_back_in_card_order() {
        let mut source = MemoryImageSource::new();
        let mut cards = Vec::new();
        for i in 0..7u8 {
            source.insert(format!("{i}.png"), png([i * 30, 0, 0, 255], 40, 60));
            cards.push(CardRenderItem::new(format!("c{i}"), format!("{i}.png")));
        }
        cards[3] = CardRenderItem::blank();
        let prep = preparer(source);
        let layout = compute_layout(&cards, &settings()).expect("layout");
        let tiles = prep
            .prepare_page(&cards, &layout, &AtomicBool::new(false))
            .expect("tiles");
        let order: Vec<_> = tiles.iter().map(|t| t.card_index).collect();
        assert_eq!(order, vec![0, 1, 2, 4, 5, 6]);
    }

    #[test]
    fn aborted_page_is_cancelled() {
        let source = MemoryImageSource::new().with("a.png", png([1, 1, 1, 255], 8, 8));
        let prep = preparer(source);
        let cards = vec![CardRenderItem::new("a", "a.png")];
        let layout = compute_layout(&cards, &settings()).expect("layout");
        assert!(matches!(
            prep.prepare_page(&cards, &layout, &AtomicBool::new(true)),
            Err(SheetpressError::Cancelled)
        ));
    }
}
