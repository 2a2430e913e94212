// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Effective bleed resolution. Precedence is per-card override, then the
// policy for the card's artwork class, then the global default.

use serde::{Deserialize, Serialize};

use crate::config::{BleedSettings, TypeBleedPolicy};
use crate::types::{BleedMode, CardRenderItem};

/// Resolved margin geometry for one card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveBleedSpec {
    pub existing_margin_mm: f64,
    pub target_margin_mm: f64,
    pub mode: BleedMode,
}

impl EffectiveBleedSpec {
    /// Resolve the bleed for `card` under `settings`.
    ///
    /// An inconclusive built-in detection (`has_built_in_bleed == None`) does
    /// not pick either class policy; it falls through to the global default.
    /// Explicit per-card fields still apply in that case.
    pub fn resolve(card: &CardRenderItem, settings: &BleedSettings) -> Self {
        let overrides = &card.bleed;
        let class_policy: Option<&TypeBleedPolicy> = match overrides.has_built_in_bleed {
            Some(true) => Some(&settings.with_built_in),
            Some(false) => Some(&settings.without_built_in),
            None => None,
        };

        let mode = overrides
            .mode
            .or(class_policy.map(|p| p.mode))
            .unwrap_or(BleedMode::Generate);

        let existing_margin_mm = overrides
            .existing_bleed_mm
            .or(class_policy.map(|p| p.existing_bleed_mm))
            .unwrap_or(0.0)
            .max(0.0);

        let requested_target_mm = overrides
            .target_bleed_mm
            .or(class_policy.and_then(|p| p.target_bleed_mm))
            .unwrap_or(settings.global_bleed_mm)
            .max(0.0);

        let target_margin_mm = match mode {
            BleedMode::Generate => requested_target_mm,
            BleedMode::Existing => existing_margin_mm,
            BleedMode::None => 0.0,
        };

        Self {
            existing_margin_mm,
            target_margin_mm,
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BleedOverride;

    fn card_with(bleed: BleedOverride) -> CardRenderItem {
        CardRenderItem {
            bleed,
            ..CardRenderItem::new("c", "c.png")
        }
    }

    #[test]
    fn resolution_is_pure() {
        let card = card_with(BleedOverride {
            has_built_in_bleed: Some(true),
            ..Default::default()
        });
        let settings = BleedSettings::default();
        let first = EffectiveBleedSpec::resolve(&card, &settings);
        let second = EffectiveBleedSpec::resolve(&card, &settings);
        assert_eq!(first, second);
    }

    #[test]
    fn built_in_class_uses_class_existing_margin() {
        let card = card_with(BleedOverride {
            has_built_in_bleed: Some(true),
            ..Default::default()
        });
        let spec = EffectiveBleedSpec::resolve(&card, &BleedSettings::default());
        assert_eq!(spec.existing_margin_mm, crate::config::DEFAULT_BUILT_IN_BLEED_MM);
        assert_eq!(spec.target_margin_mm, 1.0);
        assert_eq!(spec.mode, BleedMode::Generate);
    }

    #[test]
    fn per_card_override_beats_class_and_global() {
        let mut settings = BleedSettings::default();
        settings.with_built_in.target_bleed_mm = Some(2.5);
        let card = card_with(BleedOverride {
            has_built_in_bleed: Some(true),
            existing_bleed_mm: Some(3.0),
            target_bleed_mm: Some(0.5),
            mode: None,
        });
        let spec = EffectiveBleedSpec::resolve(&card, &settings);
        assert_eq!(spec.existing_margin_mm, 3.0);
        assert_eq!(spec.target_margin_mm, 0.5);
    }

    #[test]
    fn class_target_beats_global() {
        let mut settings = BleedSettings::default();
        settings.without_built_in.target_bleed_mm = Some(2.0);
        let card = card_with(BleedOverride {
            has_built_in_bleed: Some(false),
            ..Default::default()
        });
        let spec = EffectiveBleedSpec::resolve(&card, &settings);
        assert_eq!(spec.existing_margin_mm, 0.0);
        assert_eq!(spec.target_margin_mm, 2.0);
    }

    #[test]
    fn undetected_built_in_defers_to_global_but_keeps_explicit_existing() {
        let mut settings = BleedSettings::default();
        settings.with_built_in.target_bleed_mm = Some(4.0);
        settings.without_built_in.target_bleed_mm = Some(5.0);
        let card = card_with(BleedOverride {
            has_built_in_bleed: None,
            existing_bleed_mm: Some(2.0),
            ..Default::default()
        });
        let spec = EffectiveBleedSpec::resolve(&card, &settings);
        assert_eq!(spec.existing_margin_mm, 2.0);
        assert_eq!(spec.target_margin_mm, settings.global_bleed_mm);
        assert_eq!(spec.mode, BleedMode::Generate);
    }

    #[test]
    fn existing_mode_keeps_baked_margin() {
        let mut settings = BleedSettings::default();
        settings.with_built_in.mode = BleedMode::Existing;
        let card = card_with(BleedOverride {
            has_built_in_bleed: Some(true),
            existing_bleed_mm: Some(3.0),
            ..Default::default()
        });
        let spec = EffectiveBleedSpec::resolve(&card, &settings);
        assert_eq!(spec.target_margin_mm, 3.0);
    }

    #[test]
    fn none_mode_has_no_margin() {
        let card = card_with(BleedOverride {
            mode: Some(BleedMode::None),
            ..Default::default()
        });
        let spec = EffectiveBleedSpec::resolve(&card, &BleedSettings::default());
        assert_eq!(spec.target_margin_mm, 0.0);
    }
}
