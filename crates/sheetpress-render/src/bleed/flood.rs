// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Nearest-edge flood fill (jump flooding).
//
// Seeds are stored interleaved as `[x0, y0, x1, y1, ...]`, one pair per pixel
// in row-major order, with `NO_SEED` in both slots when a pixel has not found a
// seed yet. Propagation is the only backend-specific step; seeding and the
// colour resolve are shared so every backend produces the same tile.

use image::{Rgba, RgbaImage};
use sheetpress_core::error::Result;

/// Sentinel for "no seed found yet".
pub const NO_SEED: i32 = -1;

/// Neighbour offsets in the fixed order every backend must use.
pub const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Rectangle of known artwork inside a flood canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl KnownRect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Runs the propagation passes of the flood fill.
pub trait FloodContext: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Propagate `seeds` in place over a `width` x `height` canvas.
    ///
    /// Implementations return `SheetpressError::ContextLost` when the
    /// underlying device stops responding.
    fn propagate(&mut self, seeds: &mut Vec<i32>, width: u32, height: u32) -> Result<()>;
}

/// Seed every pixel inside `known` with its own coordinate.
pub fn init_seeds(width: u32, height: u32, known: KnownRect) -> Vec<i32> {
    let mut seeds = vec![NO_SEED; width as usize * height as usize * 2];
    for y in 0..height {
        for x in 0..width {
            if known.contains(x, y) {
                let i = (y as usize * width as usize + x as usize) * 2;
                seeds[i] = x as i32;
                seeds[i + 1] = y as i32;
            }
        }
    }
    seeds
}

/// Step sizes for the propagation passes, largest first.
pub fn jfa_steps(width: u32, height: u32) -> Vec<u32> {
    let mut step = width.max(height).max(1).next_power_of_two() / 2;
    let mut steps = Vec::new();
    while step >= 1 {
        steps.push(step);
        step /= 2;
    }
    steps
}

fn distance_sq(x: i32, y: i32, sx: i32, sy: i32) -> i64 {
    let dx = (x - sx) as i64;
    let dy = (y - sy) as i64;
    dx * dx + dy * dy
}

/// One propagation pass from `src` into `dst`.
pub fn propagate_pass(src: &[i32], dst: &mut [i32], width: u32, height: u32, step: u32) {
    let (w, h, step) = (width as i32, height as i32, step as i32);
    for y in 0..h {
        for x in 0..w {
            let i = ((y * w + x) * 2) as usize;
            let mut best = (src[i], src[i + 1]);
            let mut best_d = if best.0 == NO_SEED {
                i64::MAX
            } else {
                distance_sq(x, y, best.0, best.1)
            };

            for (dx, dy) in NEIGHBOURS {
                let nx = x + dx * step;
                let ny = y + dy * step;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let j = ((ny * w + nx) * 2) as usize;
                let (sx, sy) = (src[j], src[j + 1]);
                if sx == NO_SEED {
                    continue;
                }
                let d = distance_sq(x, y, sx, sy);
                if d < best_d {
                    best_d = d;
                    best = (sx, sy);
                }
            }

            dst[i] = best.0;
            dst[i + 1] = best.1;
        }
    }
}

/// Copy the colour of each pixel's nearest seed. Unseeded pixels stay
/// transparent.
pub fn resolve_colors(canvas: &RgbaImage, seeds: &[i32]) -> RgbaImage {
    let (width, height) = canvas.dimensions();
    let mut out = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let i = (y as usize * width as usize + x as usize) * 2;
        let (sx, sy) = (seeds[i], seeds[i + 1]);
        if sx != NO_SEED {
            *pixel = *canvas.get_pixel(sx as u32, sy as u32);
        }
    }
    out
}

/// Reference flood context running on the calling thread.
#[derive(Debug, Default)]
pub struct SoftwareFlood {
    scratch: Vec<i32>,
}

impl SoftwareFlood {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FloodContext for SoftwareFlood {
    fn name(&self) -> &'static str {
        "software"
    }

    fn propagate(&mut self, seeds: &mut Vec<i32>, width: u32, height: u32) -> Result<()> {
        self.scratch.clear();
        self.scratch.resize(seeds.len(), NO_SEED);
        for step in jfa_steps(width, height) {
            propagate_pass(seeds, &mut self.scratch, width, height, step);
            std::mem::swap(seeds, &mut self.scratch);
        }
        Ok(())
    }
}
