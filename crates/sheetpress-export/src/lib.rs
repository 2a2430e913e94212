// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sheetpress-export: ordered parallel page rendering and PDF export.
//
// The coordinator renders the pages of a chunk on a few execution units and
// assembles them strictly in page order; the orchestrator splits an export
// into chunks by pixel budget and merges the chunk documents.

pub mod cancel;
pub mod coordinator;
pub mod duplex;
pub mod naming;
pub mod orchestrator;
pub mod pdf;
pub mod renderer;
pub mod reorder;

pub use cancel::CancelSignal;
pub use coordinator::{TaskCoordinator, unit_count};
pub use orchestrator::{ExportOrchestrator, ExportOutcome, OutputMode};
pub use renderer::{PageRenderer, PageSink, PageTask, SheetRenderer};
pub use reorder::ReorderBuffer;
