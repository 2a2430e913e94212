// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// User-facing summaries. A failed export surfaces exactly one message; a
// cancelled export surfaces none.

use crate::error::{FailureScope, SheetpressError, classify_error};

/// A short message plus what the user can do about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub message: String,
    pub suggestion: String,
}

/// Summarize an export failure for display, or `None` for a user cancellation.
pub fn summarize_error(err: &SheetpressError) -> Option<ExportSummary> {
    if classify_error(err) == FailureScope::Cancelled {
        return None;
    }

    let summary = match err {
        SheetpressError::InvalidSettings(detail) => ExportSummary {
            message: "The export settings can't be used.".into(),
            suggestion: format!("Check the page and layout settings. ({detail})"),
        },
        SheetpressError::UnitFailure { page, .. } => ExportSummary {
            message: format!("Page {} could not be rendered.", page + 1),
            suggestion: "Try again with fewer cards per export or a lower DPI.".into(),
        },
        SheetpressError::Coordinator(_) => ExportSummary {
            message: "The export stopped unexpectedly.".into(),
            suggestion: "Try the export again.".into(),
        },
        SheetpressError::PdfError(_) => ExportSummary {
            message: "The PDF could not be assembled.".into(),
            suggestion: "Try the export again; if it keeps failing, export fewer cards at a time.".into(),
        },
        SheetpressError::Io(io) => ExportSummary {
            message: "The file could not be written.".into(),
            suggestion: format!("Check that the output folder exists and is writable. ({io})"),
        },
        SheetpressError::Serialization(_) => ExportSummary {
            message: "A settings or card list file is malformed.".into(),
            suggestion: "Re-save the file from the editor and try again.".into(),
        },
        SheetpressError::Fetch(_)
        | SheetpressError::ImageError(_)
        | SheetpressError::SynthesisUnavailable(_)
        | SheetpressError::ContextLost(_)
        | SheetpressError::Cache(_) => ExportSummary {
            message: "A card image could not be prepared.".into(),
            suggestion: "The card was replaced with a placeholder; check its source image.".into(),
        },
        SheetpressError::Cancelled => return None,
    };
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_silent() {
        assert!(summarize_error(&SheetpressError::Cancelled).is_none());
    }

    #[test]
    fn unit_failure_names_the_page() {
        let err = SheetpressError::UnitFailure {
            unit: 0,
            page: 2,
            reason: "boom".into(),
        };
        let summary = summarize_error(&err).expect("summary");
        assert!(summary.message.contains("Page 3"));
    }
}
