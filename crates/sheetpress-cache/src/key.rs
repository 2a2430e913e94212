// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Effect cache keys: SHA-256 over the image identity, the canonical form of
// the adjustment overrides, and the target DPI.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};
use sheetpress_core::types::{EffectOverrides, ImageRef};

/// Content address of one adjusted image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectKey(String);

impl EffectKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EffectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// The defined, non-neutral override fields, sorted by name.
///
/// `darken` is left out: it selects bleed shading and never changes the
/// adjusted image.
///
/// Two override sets that render identically produce the same map, so an
/// explicit `contrast: 1.0` collapses onto an absent contrast.
pub fn canonical_overrides(overrides: &EffectOverrides) -> BTreeMap<&'static str, Value> {
    let mut fields = BTreeMap::new();

    let mut float = |name: &'static str, value: Option<f32>, neutral: f32| {
        match value {
            Some(v) if v != neutral => {
                fields.insert(name, Value::from(v as f64));
            }
            _ => {}
        }
    };
    float("brightness", overrides.brightness, 0.0);
    float("contrast", overrides.contrast, 1.0);
    float("saturation", overrides.saturation, 1.0);
    float("gamma", overrides.gamma, 1.0);
    float("sharpness", overrides.sharpness, 0.0);
    float("holographic", overrides.holographic, 0.0);

    if overrides.grayscale == Some(true) {
        fields.insert("grayscale", Value::Bool(true));
    }
    fields
}

/// Whether `overrides` would change the image at all.
pub fn has_effects(overrides: &EffectOverrides) -> bool {
    !canonical_overrides(overrides).is_empty()
}

/// Derive the cache key for `image` adjusted by `overrides` at `dpi`.
pub fn effect_cache_key(image: &ImageRef, overrides: &EffectOverrides, dpi: u32) -> EffectKey {
    let canonical = Value::Object(
        canonical_overrides(overrides)
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect(),
    );
    let material = format!("{}\n{}\n{}", image.as_str(), canonical, dpi);
    EffectKey(hash_bytes(material.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetpress_core::types::DarkenMode;

    /// SHA-256 of the empty byte slice (well-known constant).
    const EMPTY_SHA256: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn image() -> ImageRef {
        ImageRef::new("art/lightning-bolt.png")
    }

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn field_order_does_not_matter() {
        let a: EffectOverrides =
            serde_json::from_str(r#"{"brightness":12,"contrast":1.3,"grayscale":true}"#)
                .expect("parse a");
        let b: EffectOverrides =
            serde_json::from_str(r#"{"grayscale":true,"contrast":1.3,"brightness":12}"#)
                .expect("parse b");
        assert_eq!(
            effect_cache_key(&image(), &a, 300),
            effect_cache_key(&image(), &b, 300)
        );
    }

    #[test]
    fn neutral_fields_collapse_to_empty() {
        let neutral = EffectOverrides {
            brightness: Some(0.0),
            contrast: Some(1.0),
            saturation: Some(1.0),
            gamma: Some(1.0),
            sharpness: Some(0.0),
            grayscale: Some(false),
            holographic: Some(0.0),
            darken: None,
        };
        assert!(!has_effects(&neutral));
        assert_eq!(
            effect_cache_key(&image(), &neutral, 300),
            effect_cache_key(&image(), &EffectOverrides::default(), 300)
        );
    }

    #[test]
    fn darken_alone_is_not_an_effect() {
        let darken_only = EffectOverrides {
            darken: Some(DarkenMode::DarkenAll),
            ..Default::default()
        };
        assert!(!has_effects(&darken_only));

        let contrast = |darken: Option<DarkenMode>| EffectOverrides {
            contrast: Some(1.2),
            darken,
            ..Default::default()
        };
        assert_eq!(
            effect_cache_key(&image(), &contrast(Some(DarkenMode::DarkenAll)), 300),
            effect_cache_key(&image(), &contrast(None), 300)
        );
    }

    #[test]
    fn dpi_and_identity_separate_keys() {
        let overrides = EffectOverrides {
            contrast: Some(1.2),
            ..Default::default()
        };
        let base = effect_cache_key(&image(), &overrides, 300);
        assert_ne!(base, effect_cache_key(&image(), &overrides, 600));
        assert_ne!(
            base,
            effect_cache_key(&ImageRef::new("art/counterspell.png"), &overrides, 300)
        );
    }

    #[test]
    fn differing_values_separate_keys() {
        let a = EffectOverrides {
            brightness: Some(10.0),
            ..Default::default()
        };
        let b = EffectOverrides {
            brightness: Some(11.0),
            ..Default::default()
        };
        assert_ne!(
            effect_cache_key(&image(), &a, 300),
            effect_cache_key(&image(), &b, 300)
        );
    }
}
