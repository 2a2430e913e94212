// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One page, end to end: layout, tiles, composition.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use sheetpress_cache::EffectCache;
use sheetpress_core::config::ExportSettings;
use sheetpress_core::error::Result;
use sheetpress_core::types::CardRenderItem;
use tracing::instrument;

use crate::bleed::{BleedEngine, ContextPool};
use crate::compose::{ComposedPage, compose_page};
use crate::effects::EffectApplier;
use crate::layout::compute_layout;
use crate::source::ImageSource;
use crate::tile::TilePreparer;

/// Everything needed to render pages for one export. Shared by all
/// execution units.
pub struct SheetPipeline {
    settings: Arc<ExportSettings>,
    tiles: TilePreparer,
}

impl SheetPipeline {
    pub fn new(
        settings: Arc<ExportSettings>,
        source: Arc<dyn ImageSource>,
        cache: Option<EffectCache>,
        pool: Arc<ContextPool>,
    ) -> Self {
        let bleed = BleedEngine::new(pool, settings.darken.clone(), settings.page.dpi);
        let tiles = TilePreparer::new(
            Arc::clone(&settings),
            source,
            EffectApplier::new(cache),
            Arc::new(bleed),
        );
        Self { settings, tiles }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Render one page of at most `columns x rows` cards.
    #[instrument(skip_all, fields(cards = cards.len()))]
    pub fn render_page(&self, cards: &[CardRenderItem], abort: &AtomicBool) -> Result<ComposedPage> {
        let layout = compute_layout(cards, &self.settings)?;
        let tiles = self.tiles.prepare_page(cards, &layout, abort)?;
        let transforms: Vec<_> = cards.iter().map(|c| c.transform).collect();
        Ok(compose_page(&layout, tiles, &transforms, &self.settings))
    }
}
