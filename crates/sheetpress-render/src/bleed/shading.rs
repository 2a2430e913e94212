// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge shading and shadow-level detection.

use std::collections::HashMap;
use std::sync::RwLock;

use image::{Rgba, RgbaImage};
use sheetpress_core::types::DarkenMode;

use super::flood::KnownRect;
use crate::image::processor::to_channel;

/// Resolved shading parameters for one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadeParams {
    pub mode: DarkenMode,
    pub brightness: f32,
    pub contrast: f32,
    /// Fade width inside the content boundary, for `ContrastEdgesOnly`.
    pub falloff_px: u32,
}

impl ShadeParams {
    pub fn none() -> Self {
        Self {
            mode: DarkenMode::None,
            brightness: 0.0,
            contrast: 1.0,
            falloff_px: 0,
        }
    }

    /// Scale the adjustment down for artwork whose shadows are already deep.
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            brightness: self.brightness * factor,
            contrast: 1.0 + (self.contrast - 1.0) * factor,
            ..self
        }
    }
}

/// Apply shading to `tile`, whose trimmed content occupies `content`.
pub fn shade(tile: &mut RgbaImage, content: KnownRect, params: &ShadeParams) {
    if params.mode == DarkenMode::None {
        return;
    }
    for (x, y, pixel) in tile.enumerate_pixels_mut() {
        let weight = match params.mode {
            DarkenMode::None => 0.0,
            DarkenMode::DarkenAll | DarkenMode::ContrastFullImage => 1.0,
            DarkenMode::ContrastEdgesOnly => edge_weight(x, y, content, params.falloff_px),
        };
        if weight <= 0.0 {
            continue;
        }
        let [r, g, b, a] = pixel.0;
        let adjust = |c: u8| {
            let c = c as f32;
            let target = match params.mode {
                DarkenMode::DarkenAll => c + params.brightness,
                _ => (c - 128.0) * params.contrast + 128.0 + params.brightness,
            };
            to_channel(c + (target - c) * weight)
        };
        *pixel = Rgba([adjust(r), adjust(g), adjust(b), a]);
    }
}

/// 1.0 outside the content, fading linearly to 0 at `falloff_px` inside it.
fn edge_weight(x: u32, y: u32, content: KnownRect, falloff_px: u32) -> f32 {
    if !content.contains(x, y) {
        return 1.0;
    }
    if falloff_px == 0 {
        return 0.0;
    }
    let inset = (x - content.x)
        .min(content.x + content.width - 1 - x)
        .min(y - content.y)
        .min(content.y + content.height - 1 - y);
    (1.0 - inset as f32 / falloff_px as f32).max(0.0)
}

/// Rec. 601 luma of an opaque-ish pixel.
fn luminance(p: &Rgba<u8>) -> u8 {
    let [r, g, b, _] = p.0;
    to_channel(0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
}

/// How strongly to shade this artwork, in `0.25..=1.0`.
///
/// Derived from the 10th-percentile luminance: artwork whose shadows sit near
/// black gets a lighter touch.
pub fn darkness_factor(image: &RgbaImage) -> f32 {
    let mut histogram = [0u64; 256];
    let mut counted = 0u64;
    for pixel in image.pixels() {
        if pixel.0[3] == 0 {
            continue;
        }
        histogram[luminance(pixel) as usize] += 1;
        counted += 1;
    }
    if counted == 0 {
        return 1.0;
    }

    let threshold = counted.div_ceil(10);
    let mut seen = 0u64;
    let mut p10 = 255usize;
    for (level, count) in histogram.iter().enumerate() {
        seen += count;
        if seen >= threshold {
            p10 = level;
            break;
        }
    }
    (p10 as f32 / 64.0).clamp(0.25, 1.0)
}

/// Darkness factors per image identity, computed once per engine.
#[derive(Debug, Default)]
pub struct DarknessMemo {
    factors: RwLock<HashMap<String, f32>>,
}

impl DarknessMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&self, image_id: &str, compute: impl FnOnce() -> f32) -> f32 {
        if let Ok(factors) = self.factors.read() {
            if let Some(factor) = factors.get(image_id) {
                return *factor;
            }
        }
        let factor = compute();
        if let Ok(mut factors) = self.factors.write() {
            factors.entry(image_id.to_string()).or_insert(factor);
        }
        factor
    }

    pub fn len(&self) -> usize {
        self.factors.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> KnownRect {
        KnownRect {
            x: 2,
            y: 2,
            width: 6,
            height: 6,
        }
    }

    fn params(mode: DarkenMode) -> ShadeParams {
        ShadeParams {
            mode,
            brightness: -20.0,
            contrast: 1.0,
            falloff_px: 2,
        }
    }

    #[test]
    fn none_leaves_tile_untouched() {
        let mut tile = RgbaImage::from_pixel(10, 10, Rgba([100, 100, 100, 255]));
        let before = tile.clone();
        shade(&mut tile, content(), &ShadeParams::none());
        assert_eq!(tile, before);
    }

    #[test]
    fn darken_all_shifts_every_pixel() {
        let mut tile = RgbaImage::from_pixel(10, 10, Rgba([100, 100, 100, 255]));
        shade(&mut tile, content(), &params(DarkenMode::DarkenAll));
        assert_eq!(tile.get_pixel(0, 0).0, [80, 80, 80, 255]);
        assert_eq!(tile.get_pixel(5, 5).0, [80, 80, 80, 255]);
    }

    #[test]
    fn edges_only_fades_into_content() {
        let mut tile = RgbaImage::from_pixel(10, 10, Rgba([100, 100, 100, 255]));
        shade(&mut tile, content(), &params(DarkenMode::ContrastEdgesOnly));
        // Margin: full strength.
        assert_eq!(tile.get_pixel(0, 5).0[0], 80);
        // Content boundary pixel: inset 0, full strength.
        assert_eq!(tile.get_pixel(2, 5).0[0], 80);
        // One pixel in: half strength.
        assert_eq!(tile.get_pixel(3, 5).0[0], 90);
        // Deep inside: untouched.
        assert_eq!(tile.get_pixel(5, 5).0[0], 100);
    }

    #[test]
    fn contrast_full_image_pivots_on_mid_grey() {
        let mut tile = RgbaImage::from_pixel(4, 4, Rgba([200, 128, 56, 255]));
        let p = ShadeParams {
            mode: DarkenMode::ContrastFullImage,
            brightness: 0.0,
            contrast: 1.5,
            falloff_px: 0,
        };
        shade(&mut tile, content(), &p);
        assert_eq!(tile.get_pixel(0, 0).0, [236, 128, 20, 255]);
    }

    #[test]
    fn darkness_factor_tracks_shadows() {
        let black = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let light = RgbaImage::from_pixel(10, 10, Rgba([200, 200, 200, 255]));
        assert_eq!(darkness_factor(&black), 0.25);
        assert_eq!(darkness_factor(&light), 1.0);
    }

    #[test]
    fn scaled_params_soften_the_adjustment() {
        let p = ShadeParams {
            mode: DarkenMode::ContrastFullImage,
            brightness: -20.0,
            contrast: 1.2,
            falloff_px: 0,
        }
        .scaled(0.5);
        assert_eq!(p.brightness, -10.0);
        assert!((p.contrast - 1.1).abs() < 1e-6);
    }

    #[test]
    fn memo_computes_once_per_image() {
        let memo = DarknessMemo::new();
        let mut calls = 0;
        let a = memo.get_or_compute("a.png", || {
            calls += 1;
            0.5
        });
        let b = memo.get_or_compute("a.png", || {
            calls += 1;
            0.9
        });
        assert_eq!((a, b, calls), (0.5, 0.5, 1));
        assert_eq!(memo.len(), 1);
    }
}
