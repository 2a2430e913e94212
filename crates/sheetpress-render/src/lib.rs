// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sheetpress-render: page rasterisation for print sheets.
//
// Computes sheet geometry, prepares card tiles (effects plus bleed synthesis
// by nearest-edge flood fill), and composites tiles, cut guides, and
// registration marks into one raster per page.

pub mod bleed;
pub mod compose;
pub mod effects;
pub mod image;
pub mod layout;
pub mod pipeline;
pub mod source;
pub mod tile;

// Re-export the primary types so callers can use `sheetpress_render::SheetPipeline` etc.
pub use bleed::{BleedEngine, ContextPool};
pub use compose::{ComposedPage, PageLabel};
pub use layout::{SheetLayout, compute_layout};
pub use pipeline::SheetPipeline;
pub use source::{DirectoryImageSource, ImageSource, MemoryImageSource};
