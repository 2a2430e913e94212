// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cut guides: full-page lines through every card edge and short corner marks
// at each card. Corner marks are rasterised once into a stencil and stamped
// per card.

use std::collections::BTreeSet;

use image::{GrayImage, Luma, Rgb, RgbImage};
use sheetpress_core::config::{FullPageGuides, GuidePlacement, GuideSettings, GuideStyle};
use sheetpress_core::types::mm_to_px;

use crate::layout::{PixelRect, SheetLayout};

/// Dash and gap lengths, in multiples of the stroke width.
const DASH_ON: i64 = 4;
const DASH_OFF: i64 = 3;

/// Pixel band a stroke of `width` occupies for a cut line at `edge`.
///
/// `leading` is true for left/top edges, where "outside" means lower
/// coordinates. Returns a half-open range.
pub fn stroke_band(edge: i64, leading: bool, width: u32, placement: GuidePlacement) -> (i64, i64) {
    let w = width as i64;
    let start = match (placement, leading) {
        (GuidePlacement::Outside, true) => edge - w,
        (GuidePlacement::Outside, false) => edge,
        (GuidePlacement::Inside, true) => edge,
        (GuidePlacement::Inside, false) => edge - w,
        (GuidePlacement::Center, _) => edge - w / 2,
    };
    (start, start + w)
}

fn dash_visible(along: i64, width: u32, style: GuideStyle) -> bool {
    match style {
        GuideStyle::Solid => true,
        GuideStyle::Dashed => {
            let w = width.max(1) as i64;
            along.rem_euclid((DASH_ON + DASH_OFF) * w) < DASH_ON * w
        }
    }
}

/// Plot a horizontal stroke covering `x0..x1` and rows `band`.
fn horizontal(
    plot: &mut impl FnMut(i64, i64),
    x0: i64,
    x1: i64,
    band: (i64, i64),
    width: u32,
    style: GuideStyle,
) {
    for x in x0..x1 {
        if !dash_visible(x - x0, width, style) {
            continue;
        }
        for y in band.0..band.1 {
            plot(x, y);
        }
    }
}

/// Plot a vertical stroke covering `y0..y1` and columns `band`.
fn vertical(
    plot: &mut impl FnMut(i64, i64),
    y0: i64,
    y1: i64,
    band: (i64, i64),
    width: u32,
    style: GuideStyle,
) {
    for y in y0..y1 {
        if !dash_visible(y - y0, width, style) {
            continue;
        }
        for x in band.0..band.1 {
            plot(x, y);
        }
    }
}

fn put(page: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u64) < page.width() as u64 && (y as u64) < page.height() as u64 {
        page.put_pixel(x as u32, y as u32, color);
    }
}

/// Content rectangles of every non-blank card.
pub fn drawn_content(layout: &SheetLayout) -> Vec<PixelRect> {
    layout
        .placements
        .iter()
        .filter(|p| !p.blank)
        .map(|p| p.content_rect())
        .collect()
}

/// Draw page-wide guides through the union of card edges.
pub fn draw_full_page_guides(page: &mut RgbImage, layout: &SheetLayout, guides: &GuideSettings) {
    if guides.full_page == FullPageGuides::Off {
        return;
    }
    let contents = drawn_content(layout);
    if contents.is_empty() {
        return;
    }

    let mut xs = BTreeSet::new();
    let mut ys = BTreeSet::new();
    for rect in &contents {
        xs.insert((rect.x, true));
        xs.insert((rect.right(), false));
        ys.insert((rect.y, true));
        ys.insert((rect.bottom(), false));
    }
    let top = contents.iter().map(|r| r.y).min().unwrap_or(0);
    let bottom = contents.iter().map(|r| r.bottom()).max().unwrap_or(0);
    let left = contents.iter().map(|r| r.x).min().unwrap_or(0);
    let right = contents.iter().map(|r| r.right()).max().unwrap_or(0);

    let (pw, ph) = (page.width() as i64, page.height() as i64);
    let color = Rgb(guides.color);
    let w = guides.width_px;
    let mut plot = |x: i64, y: i64| put(page, x, y, color);

    for &(x, leading) in &xs {
        let band = stroke_band(x, leading, w, guides.placement);
        match guides.full_page {
            FullPageGuides::Full => vertical(&mut plot, 0, ph, band, w, guides.style),
            _ => {
                vertical(&mut plot, 0, top, band, w, guides.style);
                vertical(&mut plot, bottom, ph, band, w, guides.style);
            }
        }
    }
    for &(y, leading) in &ys {
        let band = stroke_band(y, leading, w, guides.placement);
        match guides.full_page {
            FullPageGuides::Full => horizontal(&mut plot, 0, pw, band, w, guides.style),
            _ => {
                horizontal(&mut plot, 0, left, band, w, guides.style);
                horizontal(&mut plot, right, pw, band, w, guides.style);
            }
        }
    }
}

/// Corner marks for one content size, built once and stamped per card.
#[derive(Debug, Clone)]
pub struct CornerStencil {
    mask: GrayImage,
    /// Distance from the mask origin to the content's top-left corner.
    pad: i64,
}

impl CornerStencil {
    pub fn build(content_width: u32, content_height: u32, guides: &GuideSettings, dpi: u32) -> Self {
        let w = guides.width_px.max(1);
        let len = mm_to_px(guides.corner_length_mm, dpi) as i64;
        let pad = w as i64;
        let (cw, ch) = (content_width as i64, content_height as i64);
        let mut mask = GrayImage::new(content_width + 2 * w, content_height + 2 * w);

        {
            let (mw, mh) = (mask.width() as i64, mask.height() as i64);
            let mut plot = |x: i64, y: i64| {
                let (mx, my) = (x + pad, y + pad);
                if mx >= 0 && my >= 0 && mx < mw && my < mh {
                    mask.put_pixel(mx as u32, my as u32, Luma([255]));
                }
            };

            // Extend each arm past the corner far enough to close the L.
            let reach = match guides.placement {
                GuidePlacement::Outside => w as i64,
                GuidePlacement::Center => (w / 2) as i64,
                GuidePlacement::Inside => 0,
            };
            let p = guides.placement;
            let s = guides.style;

            let top = stroke_band(0, true, w, p);
            let bottom = stroke_band(ch, false, w, p);
            let left = stroke_band(0, true, w, p);
            let right = stroke_band(cw, false, w, p);

            horizontal(&mut plot, -reach, len, top, w, s);
            horizontal(&mut plot, cw - len, cw + reach, top, w, s);
            horizontal(&mut plot, -reach, len, bottom, w, s);
            horizontal(&mut plot, cw - len, cw + reach, bottom, w, s);
            vertical(&mut plot, -reach, len, left, w, s);
            vertical(&mut plot, ch - len, ch + reach, left, w, s);
            vertical(&mut plot, -reach, len, right, w, s);
            vertical(&mut plot, ch - len, ch + reach, right, w, s);
        }

        Self { mask, pad }
    }

    /// Stamp the stencil so its content corner lands on `content`.
    pub fn stamp(&self, page: &mut RgbImage, content: PixelRect, color: Rgb<u8>) {
        let origin_x = content.x - self.pad;
        let origin_y = content.y - self.pad;
        for (mx, my, value) in self.mask.enumerate_pixels() {
            if value.0[0] != 0 {
                put(page, origin_x + mx as i64, origin_y + my as i64, color);
            }
        }
    }

    pub fn covered_pixels(&self) -> usize {
        self.mask.pixels().filter(|p| p.0[0] != 0).count()
    }
}

/// Stamp corner marks on every drawn card.
pub fn draw_card_guides(page: &mut RgbImage, layout: &SheetLayout, guides: &GuideSettings) {
    if !guides.card_guides {
        return;
    }
    let Some(first) = layout.placements.iter().find(|p| !p.blank) else {
        return;
    };
    let stencil = CornerStencil::build(
        first.footprint.content_width,
        first.footprint.content_height,
        guides,
        layout.dpi,
    );
    let color = Rgb(guides.color);
    for rect in drawn_content(layout) {
        stencil.stamp(page, rect, color);
    }
}
