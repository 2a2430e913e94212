// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export orchestrator: paginates the card list, splits the pages into chunks
// whose rasters stay under the pixel ceiling, renders chunks one after another
// and merges the chunk documents.

use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use sheetpress_cache::EffectCache;
use sheetpress_core::config::ExportSettings;
use sheetpress_core::error::{Result, SheetpressError};
use sheetpress_core::types::{CardRenderItem, ExportId, mm_to_px};
use sheetpress_render::{ContextPool, ImageSource, SheetPipeline};
use tracing::{debug, info, instrument};

use crate::cancel::CancelSignal;
use crate::coordinator::{TaskCoordinator, default_unit_count};
use crate::naming::output_filename;
use crate::pdf::{PdfPageSink, merge_documents};
use crate::renderer::{PageTask, SheetRenderer};

/// Card ranges of each page.
pub fn paginate(total: usize, per_page: usize) -> Vec<Range<usize>> {
    let per_page = per_page.max(1);
    (0..total)
        .step_by(per_page)
        .map(|start| start..(start + per_page).min(total))
        .collect()
}

/// Page ranges of each chunk. Every chunk holds at least one page, so a page
/// larger than the ceiling still renders on its own.
pub fn plan_chunks(page_count: usize, page_pixels: u64, ceiling: u64) -> Vec<Range<usize>> {
    let per_chunk = (ceiling / page_pixels.max(1)).max(1);
    let per_chunk = usize::try_from(per_chunk).unwrap_or(usize::MAX);
    (0..page_count)
        .step_by(per_chunk)
        .map(|start| start..start.saturating_add(per_chunk).min(page_count))
        .collect()
}

/// Raster size of one page in pixels.
pub fn page_pixels(settings: &ExportSettings) -> u64 {
    let (w_mm, h_mm) = settings.page.dimensions_mm();
    let dpi = settings.page.dpi;
    mm_to_px(w_mm, dpi) as u64 * mm_to_px(h_mm, dpi) as u64
}

/// Where the finished document goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Hand the document back to the caller.
    Bytes,
    /// Write `<product>_<date><suffix>.pdf` into `dir`.
    Save { dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Document(Vec<u8>),
    Saved(PathBuf),
    Cancelled,
}

/// Runs whole exports. Holds what outlives a single export: the image source
/// and the effect cache.
pub struct ExportOrchestrator {
    source: Arc<dyn ImageSource>,
    cache: Option<EffectCache>,
}

impl ExportOrchestrator {
    pub fn new(source: Arc<dyn ImageSource>, cache: Option<EffectCache>) -> Self {
        Self { source, cache }
    }

    /// Export `cards` as one PDF.
    ///
    /// `progress` receives the percentage of cards whose page has been
    /// assembled. Cancellation is reported as `ExportOutcome::Cancelled`, not
    /// as an error.
    #[instrument(skip_all, fields(cards = cards.len(), dpi = settings.page.dpi))]
    pub async fn export<P>(
        &self,
        cards: Vec<CardRenderItem>,
        settings: ExportSettings,
        output: OutputMode,
        progress: P,
        cancel: &CancelSignal,
    ) -> Result<ExportOutcome>
    where
        P: Fn(f32) + Send + Sync,
    {
        settings.validate()?;
        settings.validate_cards(&cards)?;
        if cards.is_empty() {
            return Err(SheetpressError::InvalidSettings("no cards to export".into()));
        }

        let export_id = ExportId::new();
        let settings = Arc::new(settings);
        let pages = paginate(cards.len(), settings.layout.cards_per_page());
        let chunks = plan_chunks(
            pages.len(),
            page_pixels(&settings),
            settings.tuning.chunk_pixel_ceiling,
        );
        let units = settings
            .tuning
            .execution_units
            .unwrap_or_else(default_unit_count);
        info!(
            %export_id,
            pages = pages.len(),
            chunks = chunks.len(),
            units,
            "export started"
        );

        let pool = Arc::new(ContextPool::for_backend(settings.tuning.flood_backend)?);
        let pipeline = Arc::new(SheetPipeline::new(
            Arc::clone(&settings),
            Arc::clone(&self.source),
            self.cache.clone(),
            pool,
        ));
        let coordinator = TaskCoordinator::new(Arc::new(SheetRenderer::new(pipeline)), units);

        let cards: Arc<[CardRenderItem]> = cards.into();
        let total_cards = cards.len();
        let percent = |done: usize| (done as f64 / total_cards as f64 * 100.0) as f32;
        progress(0.0);

        let mut documents = Vec::with_capacity(chunks.len());
        let mut cards_before = 0;
        for (n, chunk) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(%export_id, "export cancelled");
                return Ok(ExportOutcome::Cancelled);
            }
            let tasks: Vec<PageTask> = pages[chunk.clone()]
                .iter()
                .enumerate()
                .map(|(index, range)| PageTask {
                    index,
                    cards: Arc::clone(&cards),
                    range: range.clone(),
                })
                .collect();
            let chunk_cards: usize = tasks.iter().map(PageTask::card_count).sum();
            let base = cards_before;
            let report = |done: usize| progress(percent(base + done));

            let sink = PdfPageSink::new(&settings.naming.product);
            match coordinator.run(tasks, sink, report, cancel).await {
                Ok(document) => {
                    debug!(chunk = n, bytes = document.len(), "chunk rendered");
                    documents.push(document);
                }
                Err(SheetpressError::Cancelled) => {
                    info!(%export_id, chunk = n, "export cancelled");
                    return Ok(ExportOutcome::Cancelled);
                }
                Err(e) => return Err(e),
            }
            cards_before += chunk_cards;
        }

        let document = if documents.len() == 1 {
            documents.pop().unwrap_or_default()
        } else {
            tokio::task::spawn_blocking(move || merge_documents(&documents))
                .await
                .map_err(|e| SheetpressError::Coordinator(format!("merge task failed: {e}")))??
        };

        let outcome = match output {
            OutputMode::Bytes => ExportOutcome::Document(document),
            OutputMode::Save { dir } => {
                let name = output_filename(&settings.naming, chrono::Local::now().date_naive());
                tokio::fs::create_dir_all(&dir).await?;
                let path = dir.join(name);
                tokio::fs::write(&path, &document).await?;
                info!(%export_id, path = %path.display(), bytes = document.len(), "document saved");
                ExportOutcome::Saved(path)
            }
        };
        progress(100.0);
        info!(%export_id, "export finished");
        Ok(outcome)
    }
}
