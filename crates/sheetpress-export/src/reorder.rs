// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reorder buffer: accepts items tagged with a sequence index in any order and
// releases them strictly in index order.

use std::collections::BTreeMap;

#[derive(Debug)]
pub struct ReorderBuffer<T> {
    pending: BTreeMap<usize, T>,
    next: usize,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next: 0,
        }
    }

    /// Insert `item` at `index` and return every item that is now releasable,
    /// in order. Indices already released or already pending are rejected and
    /// handed back.
    pub fn insert(&mut self, index: usize, item: T) -> Result<Vec<(usize, T)>, (usize, T)> {
        if index < self.next || self.pending.contains_key(&index) {
            return Err((index, item));
        }
        self.pending.insert(index, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push((self.next, item));
            self.next += 1;
        }
        Ok(ready)
    }

    /// Index of the next item to be released.
    pub fn cursor(&self) -> usize {
        self.next
    }

    /// Items held back waiting for an earlier index.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drop every held item.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_items_pass_straight_through() {
        let mut buf = ReorderBuffer::new();
        assert_eq!(buf.insert(0, 'a').expect("insert"), vec![(0, 'a')]);
        assert_eq!(buf.insert(1, 'b').expect("insert"), vec![(1, 'b')]);
        assert_eq!(buf.cursor(), 2);
    }

    #[test]
    fn gap_holds_later_items() {
        let mut buf = ReorderBuffer::new();
        assert!(buf.insert(2, 'c').expect("insert").is_empty());
        assert!(buf.insert(1, 'b').expect("insert").is_empty());
        assert_eq!(buf.pending(), 2);
        let ready = buf.insert(0, 'a').expect("insert");
        assert_eq!(ready, vec![(0, 'a'), (1, 'b'), (2, 'c')]);
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn every_permutation_releases_in_order() {
        let n = 5;
        let mut perm: Vec<usize> = (0..n).collect();
        let mut count = 0;
        loop {
            let mut buf = ReorderBuffer::new();
            let mut released = Vec::new();
            for &i in &perm {
                released.extend(buf.insert(i, i).expect("insert").into_iter().map(|(_, v)| v));
            }
            assert_eq!(released, (0..n).collect::<Vec<_>>(), "order {perm:?}");
            count += 1;
            if !next_permutation(&mut perm) {
                break;
            }
        }
        assert_eq!(count, 120);
    }

    #[test]
    fn duplicates_and_stale_indices_are_rejected() {
        let mut buf = ReorderBuffer::new();
        buf.insert(0, "a").expect("insert");
        assert_eq!(buf.insert(0, "again"), Err((0, "again")));
        buf.insert(2, "c").expect("insert");
        assert_eq!(buf.insert(2, "dup"), Err((2, "dup")));
    }

    #[test]
    fn clear_drops_held_items() {
        let mut buf = ReorderBuffer::new();
        buf.insert(3, vec![0u8; 16]).expect("insert");
        buf.clear();
        assert_eq!(buf.pending(), 0);
    }

    /// Lexicographic next permutation; false once the last one is reached.
    pub(crate) fn next_permutation(v: &mut [usize]) -> bool {
        if v.len() < 2 {
            return false;
        }
        let mut i = v.len() - 1;
        while i > 0 && v[i - 1] >= v[i] {
            i -= 1;
        }
        if i == 0 {
            return false;
        }
        let mut j = v.len() - 1;
        while v[j] <= v[i - 1] {
            j -= 1;
        }
        v.swap(i - 1, j);
        v[i..].reverse();
        true
    }
}
