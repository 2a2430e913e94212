// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page compositor: stamps prepared card tiles onto a white page raster, then
// draws guides and registration marks over them.

pub mod guides;
pub mod marks;

use image::{Rgb, RgbImage, RgbaImage};
use sheetpress_core::config::ExportSettings;
use sheetpress_core::types::{CardTransform, signed_mm_to_px};
use tracing::{debug, instrument};

use crate::image::ImageProcessor;
use crate::layout::{PixelRect, SheetLayout};

/// A card tile ready to be placed.
#[derive(Debug, Clone)]
pub struct PreparedTile {
    /// Index of the card within its page.
    pub card_index: usize,
    pub image: RgbaImage,
    /// Text written over the tile in the document, for placeholders.
    pub label: Option<String>,
}

/// Text to be written over the page raster, in page pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLabel {
    pub text: String,
    /// Centre of the text.
    pub x_px: i64,
    pub y_px: i64,
}

/// A finished page.
#[derive(Debug, Clone)]
pub struct ComposedPage {
    pub image: RgbImage,
    pub labels: Vec<PageLabel>,
    pub dpi: u32,
}

/// Alpha-blend `tile` onto `page` at (`x`, `y`), touching only `clip`.
fn blend_into(page: &mut RgbImage, tile: &RgbaImage, x: i64, y: i64, clip: PixelRect) {
    let (pw, ph) = (page.width() as i64, page.height() as i64);
    let x0 = x.max(clip.x).max(0);
    let y0 = y.max(clip.y).max(0);
    let x1 = (x + tile.width() as i64).min(clip.right()).min(pw);
    let y1 = (y + tile.height() as i64).min(clip.bottom()).min(ph);

    for py in y0..y1 {
        for px in x0..x1 {
            let src = tile.get_pixel((px - x) as u32, (py - y) as u32);
            let [r, g, b, a] = src.0;
            if a == 0 {
                continue;
            }
            let dst = page.get_pixel_mut(px as u32, py as u32);
            if a == 255 {
                *dst = Rgb([r, g, b]);
                continue;
            }
            let alpha = a as u32;
            let mix = |s: u8, d: u8| ((s as u32 * alpha + d as u32 * (255 - alpha) + 127) / 255) as u8;
            *dst = Rgb([mix(r, dst.0[0]), mix(g, dst.0[1]), mix(b, dst.0[2])]);
        }
    }
}

/// Rotate about the tile centre, then report the translation in pixels.
fn apply_transform(tile: RgbaImage, transform: &CardTransform, dpi: u32) -> (RgbaImage, i64, i64) {
    let tile = if transform.rotation_deg.abs() > f64::EPSILON {
        ImageProcessor::from_dynamic(image::DynamicImage::ImageRgba8(tile))
            .rotate(transform.rotation_deg as f32)
            .into_rgba()
    } else {
        tile
    };
    (
        tile,
        signed_mm_to_px(transform.offset_x_mm, dpi),
        signed_mm_to_px(transform.offset_y_mm, dpi),
    )
}

/// Compose one page from its layout and prepared tiles.
///
/// `transforms[i]` is the optional transform of card `i` of the page. Tiles
/// for blank cards are ignored.
#[instrument(skip_all, fields(tiles = tiles.len(), cards = layout.placements.len()))]
pub fn compose_page(
    layout: &SheetLayout,
    tiles: Vec<PreparedTile>,
    transforms: &[Option<CardTransform>],
    settings: &ExportSettings,
) -> ComposedPage {
    let mut page = RgbImage::from_pixel(
        layout.page_width_px,
        layout.page_height_px,
        Rgb([255, 255, 255]),
    );
    let mut labels = Vec::new();

    for tile in tiles {
        let Some(placement) = layout.placements.get(tile.card_index) else {
            continue;
        };
        if placement.blank {
            continue;
        }
        let transform = transforms.get(tile.card_index).and_then(|t| t.as_ref());
        let (image, dx, dy) = match transform {
            Some(t) if !t.is_identity() => apply_transform(tile.image, t, layout.dpi),
            _ => (tile.image, 0, 0),
        };
        let x = placement.tile_x + dx;
        let y = placement.tile_y + dy;
        blend_into(&mut page, &image, x, y, placement.slot);

        if let Some(text) = tile.label {
            let content = placement.content_rect();
            labels.push(PageLabel {
                text,
                x_px: content.x + dx + content.width as i64 / 2,
                y_px: content.y + dy + content.height as i64 / 2,
            });
        }
    }

    guides::draw_full_page_guides(&mut page, layout, &settings.guides);
    guides::draw_card_guides(&mut page, layout, &settings.guides);
    marks::draw_registration_marks(&mut page, settings.registration, layout.dpi);

    debug!(
        width = page.width(),
        height = page.height(),
        labels = labels.len(),
        "page composed"
    );
    ComposedPage {
        image: page,
        labels,
        dpi: layout.dpi,
    }
}

/// Text size used when labels are written into the document, in millimetres.
pub const LABEL_SIZE_MM: f64 = 4.0;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::compute_layout;
    use image::Rgba;
    use sheetpress_core::config::{FullPageGuides, RegistrationMarks};
    use sheetpress_core::types::{CardRenderItem, mm_to_px};

    fn quiet_settings() -> ExportSettings {
        let mut s = ExportSettings::default();
        s.guides.card_guides = false;
        s.guides.full_page = FullPageGuides::Off;
        s.registration = RegistrationMarks::None;
        s
    }

    fn tile_for(layout: &SheetLayout, index: usize, color: [u8; 4]) -> PreparedTile {
        let fp = layout.placements[index].footprint;
        PreparedTile {
            card_index: index,
            image: RgbaImage::from_pixel(fp.total_width(), fp.total_height(), Rgba(color)),
            label: None,
        }
    }

    #[test]
    fn tiles_land_at_their_placement() {
        let settings = quiet_settings();
        let cards = vec![CardRenderItem::new("a", "a.png"), CardRenderItem::new("b", "b.png")];
        let layout = compute_layout(&cards, &settings).expect("layout");
        let tiles = vec![
            tile_for(&layout, 0, [255, 0, 0, 255]),
            tile_for(&layout, 1, [0, 0, 255, 255]),
        ];
        let page = compose_page(&layout, tiles, &[None, None], &settings);

        let a = &layout.placements[0];
        let b = &layout.placements[1];
        assert_eq!(page.image.get_pixel(a.tile_x as u32, a.tile_y as u32).0, [255, 0, 0]);
        assert_eq!(page.image.get_pixel(b.tile_x as u32, b.tile_y as u32).0, [0, 0, 255]);
        // Outside the grid the page stays white.
        assert_eq!(page.image.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn blank_cards_are_never_drawn() {
        let settings = quiet_settings();
        let cards = vec![CardRenderItem::blank()];
        let layout = compute_layout(&cards, &settings).expect("layout");
        let tiles = vec![tile_for(&layout, 0, [255, 0, 0, 255])];
        let page = compose_page(&layout, tiles, &[None], &settings);
        let p = &layout.placements[0];
        assert_eq!(page.image.get_pixel(p.tile_x as u32, p.tile_y as u32).0, [255, 255, 255]);
    }

    #[test]
    fn offsets_are_clipped_to_the_slot() {
        let settings = quiet_settings();
        let cards = vec![CardRenderItem::new("a", "a.png")];
        let layout = compute_layout(&cards, &settings).expect("layout");
        let tiles = vec![tile_for(&layout, 0, [0, 255, 0, 255])];
        let transform = CardTransform {
            offset_x_mm: -5.0,
            offset_y_mm: 0.0,
            rotation_deg: 0.0,
        };
        let page = compose_page(&layout, tiles, &[Some(transform)], &settings);
        let slot = layout.placements[0].slot;
        // Shifted left, but nothing escapes the slot.
        assert_eq!(page.image.get_pixel((slot.x - 1) as u32, slot.y as u32).0, [255, 255, 255]);
        assert_eq!(page.image.get_pixel(slot.x as u32, slot.y as u32).0, [0, 255, 0]);
        // The right-hand strip the tile moved away from is now empty.
        let right = (slot.right() - 1) as u32;
        assert_eq!(page.image.get_pixel(right, slot.y as u32).0, [255, 255, 255]);
    }

    #[test]
    fn translucent_pixels_blend_with_white() {
        let settings = quiet_settings();
        let cards = vec![CardRenderItem::new("a", "a.png")];
        let layout = compute_layout(&cards, &settings).expect("layout");
        let tiles = vec![tile_for(&layout, 0, [0, 0, 0, 128])];
        let page = compose_page(&layout, tiles, &[None], &settings);
        let p = &layout.placements[0];
        let [r, _, _] = page.image.get_pixel(p.tile_x as u32, p.tile_y as u32).0;
        assert_eq!(r, 127);
    }

    #[test]
    fn placeholder_labels_are_centred_on_content() {
        let settings = quiet_settings();
        let cards = vec![CardRenderItem::new("a", "a.png")];
        let layout = compute_layout(&cards, &settings).expect("layout");
        let mut tile = tile_for(&layout, 0, [200, 200, 200, 255]);
        tile.label = Some("Image not found".into());
        let page = compose_page(&layout, vec![tile], &[None], &settings);

        let content = layout.placements[0].content_rect();
        assert_eq!(page.labels.len(), 1);
        assert_eq!(page.labels[0].x_px, content.x + content.width as i64 / 2);
        assert_eq!(page.labels[0].y_px, content.y + content.height as i64 / 2);
    }

    #[test]
    fn marks_are_drawn_over_tiles() {
        let mut settings = quiet_settings();
        settings.registration = RegistrationMarks::ThreeCorner;
        let cards = vec![CardRenderItem::new("a", "a.png")];
        let layout = compute_layout(&cards, &settings).expect("layout");
        let page = compose_page(&layout, vec![tile_for(&layout, 0, [9, 9, 9, 255])], &[None], &settings);
        let c = mm_to_px(marks::MARK_INSET_MM + marks::SQUARE_MM / 2.0, 300);
        assert_eq!(page.image.get_pixel(c, c).0, [0, 0, 0]);
    }
}
