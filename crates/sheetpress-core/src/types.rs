// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Sheetpress export pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity reserved for blank slot-fillers.
pub const BLANK_CARD_ID: &str = "__blank__";

/// Unique identifier for one export run (used to correlate log events).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportId(pub Uuid);

impl ExportId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of a card in the user's list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to source image bytes held by an external object store.
///
/// The reference doubles as the image identity for effect caching and
/// darkness memoization, so two cards sharing artwork share cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the bleed margin of a card is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BleedMode {
    /// Synthesize (or trim to) the target margin.
    Generate,
    /// Use whatever margin is baked into the artwork, unchanged.
    Existing,
    /// No margin at all; the tile is the bare content rectangle.
    None,
}

/// Shading applied around the content boundary to make synthetic edges recede.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DarkenMode {
    None,
    DarkenAll,
    ContrastEdgesOnly,
    ContrastFullImage,
}

/// Per-card bleed overrides. Every field is optional; absent fields fall back
/// to type-level and then global settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleedOverride {
    /// Whether the artwork already carries a printed margin. `None` means the
    /// detection was inconclusive.
    pub has_built_in_bleed: Option<bool>,
    pub existing_bleed_mm: Option<f64>,
    pub target_bleed_mm: Option<f64>,
    pub mode: Option<BleedMode>,
}

/// Per-card image adjustments. Absent fields mean "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectOverrides {
    /// Additive brightness, -255..=255. Neutral: 0.
    pub brightness: Option<f32>,
    /// Contrast factor. Neutral: 1.
    pub contrast: Option<f32>,
    /// Saturation factor. Neutral: 1.
    pub saturation: Option<f32>,
    /// Gamma exponent. Neutral: 1.
    pub gamma: Option<f32>,
    /// Unsharp-mask sigma. Neutral: 0.
    pub sharpness: Option<f32>,
    /// Neutral: false.
    pub grayscale: Option<bool>,
    /// Strength of the holographic foil sheen, 0..=1. Neutral: 0.
    pub holographic: Option<f32>,
    /// Per-card override of the edge shading mode.
    pub darken: Option<DarkenMode>,
}

/// Manual nudge applied to one card when stamping it (back-face alignment).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardTransform {
    pub offset_x_mm: f64,
    pub offset_y_mm: f64,
    /// Clockwise rotation about the card's own centre.
    pub rotation_deg: f64,
}

impl CardTransform {
    pub fn is_identity(&self) -> bool {
        self.offset_x_mm == 0.0 && self.offset_y_mm == 0.0 && self.rotation_deg == 0.0
    }
}

/// One card to be placed on a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRenderItem {
    pub id: CardId,
    #[serde(default)]
    pub image: Option<ImageRef>,
    #[serde(default)]
    pub overrides: EffectOverrides,
    /// Set when the caller already knows no artwork exists for this card.
    #[serde(default)]
    pub no_image: bool,
    #[serde(default)]
    pub bleed: BleedOverride,
    #[serde(default)]
    pub transform: Option<CardTransform>,
}

impl CardRenderItem {
    /// A card backed by the given image reference with no overrides.
    pub fn new(id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: CardId::new(id),
            image: Some(ImageRef::new(image)),
            overrides: EffectOverrides::default(),
            no_image: false,
            bleed: BleedOverride::default(),
            transform: None,
        }
    }

    /// A slot-filler that occupies a grid position but is never drawn.
    pub fn blank() -> Self {
        Self {
            id: CardId::new(BLANK_CARD_ID),
            image: None,
            overrides: EffectOverrides::default(),
            no_image: true,
            bleed: BleedOverride::default(),
            transform: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.id.as_str() == BLANK_CARD_ID
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    Letter,
    Legal,
    Tabloid,
    Custom { width_mm: f64, height_mm: f64 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height), portrait.
    pub fn dimensions_mm(&self) -> (f64, f64) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::A3 => (297.0, 420.0),
            Self::Letter => (215.9, 279.4),
            Self::Legal => (215.9, 355.6),
            Self::Tabloid => (279.4, 431.8),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Convert a length in millimetres to whole pixels at `dpi`.
pub fn mm_to_px(mm: f64, dpi: u32) -> u32 {
    (mm / 25.4 * dpi as f64).round().max(0.0) as u32
}

/// Like [`mm_to_px`], but keeps the sign; used for card offsets.
pub fn signed_mm_to_px(mm: f64, dpi: u32) -> i64 {
    (mm / 25.4 * dpi as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_card_is_recognised() {
        assert!(CardRenderItem::blank().is_blank());
        assert!(!CardRenderItem::new("c1", "art/c1.png").is_blank());
    }

    #[test]
    fn mm_conversion_at_300_dpi() {
        assert_eq!(mm_to_px(25.4, 300), 300);
        assert_eq!(mm_to_px(2.0, 300), 24);
        assert_eq!(mm_to_px(63.0, 300), 744);
        assert_eq!(signed_mm_to_px(-2.0, 300), -24);
        assert_eq!(signed_mm_to_px(2.0, 300), i64::from(mm_to_px(2.0, 300)));
    }

    #[test]
    fn card_deserializes_with_defaults() {
        let card: CardRenderItem =
            serde_json::from_str(r#"{"id":"bolt","image":"bolt.png"}"#).expect("parse");
        assert_eq!(card.image.as_ref().map(ImageRef::as_str), Some("bolt.png"));
        assert!(!card.no_image);
        assert_eq!(card.bleed, BleedOverride::default());
    }

    #[test]
    fn darken_mode_uses_kebab_case() {
        let mode: DarkenMode = serde_json::from_str(r#""contrast-edges-only""#).expect("parse");
        assert_eq!(mode, DarkenMode::ContrastEdgesOnly);
    }
}
