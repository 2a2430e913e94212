// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sheet geometry: card footprints, slot sizes, and grid placement for one page.
//
// All coordinates are whole pixels at the export DPI, origin top-left. The
// grid always has the full `columns x rows` slots so fronts and backs share
// positions even when a page is only partly filled.

use sheetpress_core::EffectiveBleedSpec;
use sheetpress_core::config::ExportSettings;
use sheetpress_core::error::{Result, SheetpressError};
use sheetpress_core::types::{CardRenderItem, mm_to_px};
use tracing::warn;

/// Pixel size of one card tile: trimmed content plus margin on every side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardFootprint {
    pub content_width: u32,
    pub content_height: u32,
    pub margin_px: u32,
}

impl CardFootprint {
    pub fn total_width(&self) -> u32 {
        self.content_width + 2 * self.margin_px
    }

    pub fn total_height(&self) -> u32 {
        self.content_height + 2 * self.margin_px
    }
}

/// Axis-aligned pixel rectangle; may extend past the page edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn right(&self) -> i64 {
        self.x + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.height as i64
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Where one card of the page goes.
#[derive(Debug, Clone, PartialEq)]
pub struct CardPlacement {
    /// Index into the page's card slice.
    pub card_index: usize,
    pub column: u32,
    pub row: u32,
    pub blank: bool,
    pub bleed: EffectiveBleedSpec,
    pub footprint: CardFootprint,
    /// The slot the tile is clipped to.
    pub slot: PixelRect,
    /// Top-left of the tile, centred in its slot.
    pub tile_x: i64,
    pub tile_y: i64,
}

impl CardPlacement {
    /// The trimmed content rectangle in page coordinates.
    pub fn content_rect(&self) -> PixelRect {
        PixelRect {
            x: self.tile_x + self.footprint.margin_px as i64,
            y: self.tile_y + self.footprint.margin_px as i64,
            width: self.footprint.content_width,
            height: self.footprint.content_height,
        }
    }
}

/// Complete geometry of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub dpi: u32,
    pub page_width_px: u32,
    pub page_height_px: u32,
    pub column_widths: Vec<u32>,
    pub row_heights: Vec<u32>,
    pub spacing_px: u32,
    /// Top-left of the grid; negative when the grid is larger than the page.
    pub origin_x: i64,
    pub origin_y: i64,
    pub placements: Vec<CardPlacement>,
}

impl SheetLayout {
    /// The rectangle covered by the whole grid.
    pub fn grid_rect(&self) -> PixelRect {
        PixelRect {
            x: self.origin_x,
            y: self.origin_y,
            width: grid_extent(&self.column_widths, self.spacing_px),
            height: grid_extent(&self.row_heights, self.spacing_px),
        }
    }
}

/// Footprint of a card whose margin follows `spec`.
pub fn footprint_for(spec: &EffectiveBleedSpec, settings: &ExportSettings) -> CardFootprint {
    let dpi = settings.page.dpi;
    CardFootprint {
        content_width: mm_to_px(settings.layout.card_width_mm, dpi),
        content_height: mm_to_px(settings.layout.card_height_mm, dpi),
        margin_px: mm_to_px(spec.target_margin_mm, dpi),
    }
}

/// Footprint used for empty slots: content plus the global bleed.
pub fn base_footprint(settings: &ExportSettings) -> CardFootprint {
    let dpi = settings.page.dpi;
    CardFootprint {
        content_width: mm_to_px(settings.layout.card_width_mm, dpi),
        content_height: mm_to_px(settings.layout.card_height_mm, dpi),
        margin_px: mm_to_px(settings.bleed.global_bleed_mm, dpi),
    }
}

/// Grid position (column, row) of the `index`-th of `count` cards.
pub fn grid_position(index: usize, count: usize, columns: u32, right_align: bool) -> (u32, u32) {
    let columns = columns as usize;
    let row = index / columns;
    let mut column = index % columns;

    let last_row = count.saturating_sub(1) / columns;
    let remainder = count % columns;
    if right_align && remainder != 0 && row == last_row {
        column += columns - remainder;
    }
    (column as u32, row as u32)
}

/// Compute the layout of one page holding `cards` (at most `columns x rows`).
pub fn compute_layout(cards: &[CardRenderItem], settings: &ExportSettings) -> Result<SheetLayout> {
    let layout = &settings.layout;
    let capacity = layout.cards_per_page();
    if cards.len() > capacity {
        return Err(SheetpressError::InvalidSettings(format!(
            "page holds {} cards but {} were given",
            capacity,
            cards.len()
        )));
    }

    let dpi = settings.page.dpi;
    let (page_w_mm, page_h_mm) = settings.page.dimensions_mm();
    let page_width_px = mm_to_px(page_w_mm, dpi);
    let page_height_px = mm_to_px(page_h_mm, dpi);
    let spacing_px = mm_to_px(layout.spacing_mm, dpi);
    let base = base_footprint(settings);

    // Pass 1: resolve each card and its grid cell.
    let mut cells = Vec::with_capacity(cards.len());
    for (index, card) in cards.iter().enumerate() {
        let bleed = EffectiveBleedSpec::resolve(card, &settings.bleed);
        let blank = card.is_blank();
        let footprint = if blank {
            base
        } else {
            footprint_for(&bleed, settings)
        };
        let (column, row) = grid_position(
            index,
            cards.len(),
            layout.columns,
            layout.right_align_incomplete_rows,
        );
        cells.push((index, column, row, blank, bleed, footprint));
    }

    // Pass 2: each slot is as large as its largest occupant.
    let mut column_widths = vec![base.total_width(); layout.columns as usize];
    let mut row_heights = vec![base.total_height(); layout.rows as usize];
    let mut column_seen = vec![false; layout.columns as usize];
    let mut row_seen = vec![false; layout.rows as usize];
    for &(_, column, row, _, _, footprint) in &cells {
        let (c, r) = (column as usize, row as usize);
        column_widths[c] = if column_seen[c] {
            column_widths[c].max(footprint.total_width())
        } else {
            footprint.total_width()
        };
        row_heights[r] = if row_seen[r] {
            row_heights[r].max(footprint.total_height())
        } else {
            footprint.total_height()
        };
        column_seen[c] = true;
        row_seen[r] = true;
    }

    let grid_width = grid_extent(&column_widths, spacing_px);
    let grid_height = grid_extent(&row_heights, spacing_px);
    let origin_x = (page_width_px as i64 - grid_width as i64) / 2;
    let origin_y = (page_height_px as i64 - grid_height as i64) / 2;
    if origin_x < 0 || origin_y < 0 {
        warn!(
            grid_width,
            grid_height, page_width_px, page_height_px, "card grid overflows the page"
        );
    }

    // Pass 3: place every tile centred in its slot.
    let placements = cells
        .into_iter()
        .map(|(card_index, column, row, blank, bleed, footprint)| {
            let slot_x = origin_x
                + column_widths[..column as usize]
                    .iter()
                    .map(|w| *w as i64 + spacing_px as i64)
                    .sum::<i64>();
            let slot_y = origin_y
                + row_heights[..row as usize]
                    .iter()
                    .map(|h| *h as i64 + spacing_px as i64)
                    .sum::<i64>();
            let slot = PixelRect {
                x: slot_x,
                y: slot_y,
                width: column_widths[column as usize],
                height: row_heights[row as usize],
            };
            CardPlacement {
                card_index,
                column,
                row,
                blank,
                bleed,
                footprint,
                slot,
                tile_x: slot_x + (slot.width as i64 - footprint.total_width() as i64) / 2,
                tile_y: slot_y + (slot.height as i64 - footprint.total_height() as i64) / 2,
            }
        })
        .collect();

    Ok(SheetLayout {
        dpi,
        page_width_px,
        page_height_px,
        column_widths,
        row_heights,
        spacing_px,
        origin_x,
        origin_y,
        placements,
    })
}

fn grid_extent(sizes: &[u32], spacing_px: u32) -> u32 {
    let gaps = sizes.len().saturating_sub(1) as u32;
    sizes.iter().sum::<u32>() + gaps * spacing_px
}
