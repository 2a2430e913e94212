// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Duplex support. Back sheets are printed mirrored so that each back lands
// behind its front after a long-edge flip.

use sheetpress_core::error::Result;
use sheetpress_core::types::CardRenderItem;

use crate::pdf::interleave_documents;

/// Arrange `backs` (one per front, in front order) for back sheets.
///
/// Every row of `columns` cards is reversed. An incomplete last row is first
/// padded with blanks, so after reversal its cards sit in the right-most
/// columns, behind their fronts.
pub fn backs_for(backs: &[CardRenderItem], columns: u32) -> Vec<CardRenderItem> {
    let columns = columns.max(1) as usize;
    let mut arranged = Vec::with_capacity(backs.len().div_ceil(columns) * columns);
    for row in backs.chunks(columns) {
        let mut row = row.to_vec();
        row.resize_with(columns, CardRenderItem::blank);
        row.reverse();
        arranged.extend(row);
    }
    arranged
}

/// Alternate front and back pages into one document.
pub fn interleave(front_pdf: &[u8], back_pdf: &[u8]) -> Result<Vec<u8>> {
    interleave_documents(front_pdf, back_pdf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(n: usize) -> Vec<CardRenderItem> {
        (0..n)
            .map(|i| CardRenderItem::new(format!("b{i}"), format!("{i}.png")))
            .collect()
    }

    fn ids(cards: &[CardRenderItem]) -> Vec<&str> {
        cards.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn full_rows_are_mirrored() {
        let arranged = backs_for(&cards(6), 3);
        assert_eq!(ids(&arranged), vec!["b2", "b1", "b0", "b5", "b4", "b3"]);
    }

    #[test]
    fn short_last_row_is_right_aligned() {
        let arranged = backs_for(&cards(4), 3);
        assert_eq!(arranged.len(), 6);
        assert_eq!(ids(&arranged[..3]), vec!["b2", "b1", "b0"]);
        assert!(arranged[3].is_blank());
        assert!(arranged[4].is_blank());
        assert_eq!(arranged[5].id.as_str(), "b3");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(backs_for(&[], 3).is_empty());
    }
}
