// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Seams between the coordinator and the work it schedules: something that
// renders a page and something that consumes rendered pages in order.

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use sheetpress_core::error::Result;
use sheetpress_core::types::CardRenderItem;
use sheetpress_render::{ComposedPage, SheetPipeline};

/// One page of work: a window into the shared card list.
#[derive(Debug, Clone)]
pub struct PageTask {
    /// Position of the page within its chunk. Pages are assembled in this order.
    pub index: usize,
    pub cards: Arc<[CardRenderItem]>,
    pub range: Range<usize>,
}

impl PageTask {
    pub fn cards(&self) -> &[CardRenderItem] {
        &self.cards[self.range.clone()]
    }

    pub fn card_count(&self) -> usize {
        self.range.len()
    }
}

/// Renders one page. Called from blocking threads, possibly concurrently.
pub trait PageRenderer: Send + Sync + 'static {
    type Page: Send + 'static;

    /// Render `task`. Implementations should poll `abort` between expensive
    /// steps and return `Cancelled` once it is set.
    fn render(&self, task: &PageTask, abort: &AtomicBool) -> Result<Self::Page>;
}

/// Consumes pages strictly in index order.
pub trait PageSink<P>: Send {
    type Output;

    fn append(&mut self, index: usize, page: P) -> Result<()>;

    fn finish(self) -> Result<Self::Output>;
}

/// Production renderer backed by the sheet pipeline.
pub struct SheetRenderer {
    pipeline: Arc<SheetPipeline>,
}

impl SheetRenderer {
    pub fn new(pipeline: Arc<SheetPipeline>) -> Self {
        Self { pipeline }
    }
}

impl PageRenderer for SheetRenderer {
    type Page = ComposedPage;

    fn render(&self, task: &PageTask, abort: &AtomicBool) -> Result<ComposedPage> {
        self.pipeline.render_page(task.cards(), abort)
    }
}
