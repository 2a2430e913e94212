// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export settings. Built once per export call and shared read-only by every
// stage of the pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SheetpressError};
use crate::types::{BleedMode, CardRenderItem, DarkenMode, Orientation, PaperSize};

/// Margin most print-ready card scans carry (1/8 inch).
pub const DEFAULT_BUILT_IN_BLEED_MM: f64 = 3.175;

/// Peak raster budget per chunk, in pixels (roughly ten Letter pages at 300 DPI).
pub const DEFAULT_CHUNK_PIXEL_CEILING: u64 = 90_000_000;

/// Largest bleed width accepted anywhere, globally or per card.
pub const MAX_BLEED_MM: f64 = 25.4;

/// Largest trimmed card edge accepted.
pub const MAX_CARD_EDGE_MM: f64 = 500.0;

/// Largest card grid accepted on one page.
pub const MAX_CARDS_PER_PAGE: u32 = 256;

/// Complete, immutable settings bundle for one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub page: PageSettings,
    pub layout: LayoutSettings,
    pub bleed: BleedSettings,
    pub darken: DarkenSettings,
    pub guides: GuideSettings,
    pub registration: RegistrationMarks,
    pub tuning: PipelineTuning,
    pub naming: OutputNaming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSettings {
    pub paper_size: PaperSize,
    pub orientation: Orientation,
    pub dpi: u32,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            paper_size: PaperSize::Letter,
            orientation: Orientation::Portrait,
            dpi: 300,
        }
    }
}

impl PageSettings {
    /// Page dimensions in millimetres after applying orientation.
    pub fn dimensions_mm(&self) -> (f64, f64) {
        let (w, h) = self.paper_size.dimensions_mm();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub columns: u32,
    pub rows: u32,
    /// Gap between neighbouring card slots.
    pub spacing_mm: f64,
    /// Trimmed card size (without any bleed).
    pub card_width_mm: f64,
    pub card_height_mm: f64,
    /// Push the cards of an incomplete last row into the right-most columns.
    /// Used for back sheets so fronts and backs meet after a long-edge flip.
    pub right_align_incomplete_rows: bool,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            columns: 3,
            rows: 3,
            spacing_mm: 0.0,
            card_width_mm: 63.0,
            card_height_mm: 88.0,
            right_align_incomplete_rows: false,
        }
    }
}

impl LayoutSettings {
    pub fn cards_per_page(&self) -> usize {
        (self.columns as usize).saturating_mul(self.rows as usize)
    }
}

/// Bleed policy for one class of artwork (with or without a printed margin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeBleedPolicy {
    pub mode: BleedMode,
    /// Margin baked into artwork of this class.
    pub existing_bleed_mm: f64,
    /// Target margin; `None` uses the global bleed width.
    pub target_bleed_mm: Option<f64>,
}

impl Default for TypeBleedPolicy {
    fn default() -> Self {
        Self {
            mode: BleedMode::Generate,
            existing_bleed_mm: 0.0,
            target_bleed_mm: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleedSettings {
    pub global_bleed_mm: f64,
    pub with_built_in: TypeBleedPolicy,
    pub without_built_in: TypeBleedPolicy,
}

impl Default for BleedSettings {
    fn default() -> Self {
        Self {
            global_bleed_mm: 1.0,
            with_built_in: TypeBleedPolicy {
                existing_bleed_mm: DEFAULT_BUILT_IN_BLEED_MM,
                ..TypeBleedPolicy::default()
            },
            without_built_in: TypeBleedPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DarkenSettings {
    pub mode: DarkenMode,
    /// Additive brightness in channel units; negative darkens.
    pub brightness: f32,
    pub contrast: f32,
    /// Width of the fade from the content boundary into the artwork.
    pub edge_falloff_mm: f64,
    /// Derive brightness/contrast from the artwork's shadow histogram.
    pub auto_detect: bool,
}

impl Default for DarkenSettings {
    fn default() -> Self {
        Self {
            mode: DarkenMode::None,
            brightness: -20.0,
            contrast: 1.15,
            edge_falloff_mm: 1.5,
            auto_detect: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideStyle {
    Solid,
    Dashed,
}

/// Where a guide stroke sits relative to the cut line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidePlacement {
    Inside,
    Outside,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullPageGuides {
    Off,
    /// Only the stretches between the page edge and the card grid.
    Edges,
    /// Across the whole page, over the artwork.
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideSettings {
    pub card_guides: bool,
    pub full_page: FullPageGuides,
    pub style: GuideStyle,
    pub placement: GuidePlacement,
    pub color: [u8; 3],
    pub width_px: u32,
    pub corner_length_mm: f64,
}

impl Default for GuideSettings {
    fn default() -> Self {
        Self {
            card_guides: true,
            full_page: FullPageGuides::Edges,
            style: GuideStyle::Solid,
            placement: GuidePlacement::Outside,
            color: [0, 0, 0],
            width_px: 2,
            corner_length_mm: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMarks {
    None,
    /// Filled squares in three page corners, as optical cutters expect.
    ThreeCorner,
    /// Circle-and-cross targets in all four page corners.
    Crosshair,
}

impl Default for RegistrationMarks {
    fn default() -> Self {
        Self::None
    }
}

/// Which context runs the flood-fill seed propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloodBackend {
    /// GPU when available, software otherwise.
    Auto,
    Software,
    Gpu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineTuning {
    pub chunk_pixel_ceiling: u64,
    /// Fixed number of execution units; `None` derives it from the core count.
    pub execution_units: Option<usize>,
    /// Tiles prepared in parallel within a single page.
    pub tile_concurrency: usize,
    pub flood_backend: FloodBackend,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            chunk_pixel_ceiling: DEFAULT_CHUNK_PIXEL_CEILING,
            execution_units: None,
            tile_concurrency: 4,
            flood_backend: FloodBackend::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputNaming {
    pub product: String,
    /// Appended after the date, e.g. `_backs` or `_duplex`.
    pub mode_suffix: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            product: "sheetpress".into(),
            mode_suffix: String::new(),
        }
    }
}

impl ExportSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the pipeline cannot render.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SheetpressError::InvalidSettings(msg));

        if !(72..=1200).contains(&self.page.dpi) {
            return invalid(format!("DPI must be between 72 and 1200, got {}", self.page.dpi));
        }
        if self.layout.columns == 0 || self.layout.rows == 0 {
            return invalid(format!(
                "grid must be at least 1x1, got {}x{}",
                self.layout.columns, self.layout.rows
            ));
        }
        match self.layout.columns.checked_mul(self.layout.rows) {
            Some(cells) if cells <= MAX_CARDS_PER_PAGE => {}
            _ => {
                return invalid(format!(
                    "grid {}x{} exceeds {MAX_CARDS_PER_PAGE} cards per page",
                    self.layout.columns, self.layout.rows
                ));
            }
        }
        let card_edges = [self.layout.card_width_mm, self.layout.card_height_mm];
        if !card_edges.iter().all(|mm| *mm > 0.0 && *mm <= MAX_CARD_EDGE_MM) {
            return invalid(format!(
                "card dimensions must be within (0, {MAX_CARD_EDGE_MM}] mm"
            ));
        }
        if !(self.layout.spacing_mm >= 0.0 && self.layout.spacing_mm.is_finite()) {
            return invalid("card spacing must be a finite, non-negative width".into());
        }
        let bleeds = [
            Some(self.bleed.global_bleed_mm),
            Some(self.bleed.with_built_in.existing_bleed_mm),
            Some(self.bleed.without_built_in.existing_bleed_mm),
            self.bleed.with_built_in.target_bleed_mm,
            self.bleed.without_built_in.target_bleed_mm,
        ];
        if !bleeds.iter().flatten().all(|mm| bleed_in_range(*mm)) {
            return invalid(format!("bleed widths must be within [0, {MAX_BLEED_MM}] mm"));
        }
        if self.tuning.tile_concurrency == 0 {
            return invalid("tile concurrency must be at least 1".into());
        }
        if self.tuning.execution_units == Some(0) {
            return invalid("execution unit count must be at least 1".into());
        }
        if self.tuning.chunk_pixel_ceiling == 0 {
            return invalid("chunk pixel ceiling must be positive".into());
        }
        Ok(())
    }

    /// Reject per-card overrides the pipeline cannot render.
    pub fn validate_cards(&self, cards: &[CardRenderItem]) -> Result<()> {
        for card in cards {
            let bleeds = [card.bleed.existing_bleed_mm, card.bleed.target_bleed_mm];
            if !bleeds.iter().flatten().all(|mm| bleed_in_range(*mm)) {
                return Err(SheetpressError::InvalidSettings(format!(
                    "card {}: bleed widths must be within [0, {MAX_BLEED_MM}] mm",
                    card.id
                )));
            }
            if let Some(t) = &card.transform {
                let finite = [t.offset_x_mm, t.offset_y_mm, t.rotation_deg]
                    .iter()
                    .all(|v| v.is_finite());
                if !finite {
                    return Err(SheetpressError::InvalidSettings(format!(
                        "card {}: transform must be finite",
                        card.id
                    )));
                }
            }
        }
        Ok(())
    }
}

fn bleed_in_range(mm: f64) -> bool {
    (0.0..=MAX_BLEED_MM).contains(&mm)
}
