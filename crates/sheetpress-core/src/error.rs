// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Sheetpress.

use thiserror::Error;

/// Top-level error type for all Sheetpress operations.
#[derive(Debug, Error)]
pub enum SheetpressError {
    // -- Settings --
    #[error("invalid export settings: {0}")]
    InvalidSettings(String),

    // -- Per-card errors (recovered with a placeholder tile) --
    #[error("source image unavailable: {0}")]
    Fetch(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("bleed synthesis context unavailable: {0}")]
    SynthesisUnavailable(String),

    #[error("bleed synthesis context lost: {0}")]
    ContextLost(String),

    // -- Per-chunk errors (fatal to the export) --
    #[error("execution unit {unit} failed on page {page}: {reason}")]
    UnitFailure {
        unit: usize,
        page: usize,
        reason: String,
    },

    #[error("task coordinator error: {0}")]
    Coordinator(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("export cancelled by user")]
    Cancelled,

    // -- Storage / persistence --
    #[error("effect cache error: {0}")]
    Cache(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How far a failure reaches: one card, the whole export, or a user abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// Replaced by a visible placeholder; the page still renders.
    Card,
    /// Aborts the chunk and surfaces to the caller.
    Export,
    /// User asked to stop. Same cleanup as `Export`, but no error UI.
    Cancelled,
}

/// Classify a `SheetpressError` by the reach of the failure.
pub fn classify_error(err: &SheetpressError) -> FailureScope {
    match err {
        SheetpressError::Fetch(_)
        | SheetpressError::ImageError(_)
        | SheetpressError::SynthesisUnavailable(_)
        | SheetpressError::ContextLost(_) => FailureScope::Card,

        // A cache fault only ever costs a recompute.
        SheetpressError::Cache(_) => FailureScope::Card,

        SheetpressError::Cancelled => FailureScope::Cancelled,

        SheetpressError::InvalidSettings(_)
        | SheetpressError::UnitFailure { .. }
        | SheetpressError::Coordinator(_)
        | SheetpressError::PdfError(_)
        | SheetpressError::Io(_)
        | SheetpressError::Serialization(_) => FailureScope::Export,
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SheetpressError>;
