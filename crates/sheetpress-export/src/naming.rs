// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output file naming.

use chrono::NaiveDate;
use sheetpress_core::config::OutputNaming;

/// `<product>_<YYYY-MM-DD><suffix>.pdf`, with path separators in the product
/// name replaced so the result is always a bare file name.
pub fn output_filename(naming: &OutputNaming, date: NaiveDate) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect()
    };
    let product = match clean(naming.product.trim()) {
        p if p.is_empty() => "sheetpress".to_string(),
        p => p,
    };
    format!(
        "{}_{}{}.pdf",
        product,
        date.format("%Y-%m-%d"),
        clean(&naming.mode_suffix)
    )
}
