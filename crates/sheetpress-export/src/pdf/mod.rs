// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF output: page sink (`printpdf`) and document merging (`lopdf`).

pub mod merge;
pub mod writer;

pub use merge::{interleave_documents, merge_documents, page_count};
pub use writer::PdfPageSink;
