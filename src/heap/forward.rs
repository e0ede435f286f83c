// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{build_heap, close_all, poll_real_kv, ScannerEntry};
use crate::comparator::CellComparator;
use crate::scanner::{BoxedScanner, CellScanner};
use crate::{Cell, Error};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// K-way merge of scanners in ascending cell order.
///
/// The heap ranks its scanners by their current `peek` cells; `next` emits
/// from the least-ranked scanner and re-ranks it. Scanners that exhaust
/// during an operation are parked for delayed close (see
/// [`ForwardScanHeap::take_pending_close`]).
///
/// The heap itself implements [`CellScanner`], so a merge can feed another
/// merge. The reverse-scan operations are not available on a forward heap.
pub struct ForwardScanHeap {
    heap: BinaryHeap<Reverse<ForwardEntry>>,
    current: Option<ForwardEntry>,
    pending_close: Vec<BoxedScanner>,
    comparator: CellComparator,
}

impl ForwardScanHeap {
    /// Merges the given scanners.
    ///
    /// Scanners that are already exhausted are closed immediately.
    pub fn new(scanners: Vec<BoxedScanner>, comparator: CellComparator) -> crate::Result<Self> {
        let mut heap = build_heap::<ForwardEntry>(scanners);
        let mut pending_close = Vec::new();

        let current = poll_real_kv(&mut heap, &mut pending_close)?;

        Ok(Self {
            heap,
            current,
            pending_close,
            comparator,
        })
    }

    /// Hands over the scanners that exhausted during merge operations, so
    /// the owner can release them in bulk outside the hot path.
    #[must_use]
    pub fn take_pending_close(&mut self) -> Vec<BoxedScanner> {
        std::mem::take(&mut self.pending_close)
    }

    /// One routine behind `seek`, `reseek` and `request_seek`.
    ///
    /// Repeatedly pops the top scanner: if its peek is already at or past the
    /// seek key, the heap is settled and the new current is promoted.
    /// Otherwise the scanner is sought (lazily, while other scanners remain
    /// and the caller permits it) and re-ranked or parked for close.
    fn generalized_seek(
        &mut self,
        key: &Cell,
        lazy: bool,
        forward: bool,
        use_bloom: bool,
    ) -> crate::Result<bool> {
        let Some(entry) = self.current.take() else {
            return Ok(false);
        };
        self.heap.push(Reverse(entry));

        while let Some(Reverse(mut entry)) = self.heap.pop() {
            let at_or_after = entry
                .scanner()
                .peek()
                .is_some_and(|top| self.comparator.compare(key, top) != Ordering::Greater);

            if at_or_after {
                self.heap.push(Reverse(entry));
                self.current = poll_real_kv(&mut self.heap, &mut self.pending_close)?;
                return Ok(self.current.is_some());
            }

            let seek_result = if lazy && !self.heap.is_empty() {
                entry.scanner_mut().request_seek(key, forward, use_bloom)
            } else if forward {
                entry.scanner_mut().reseek(key)
            } else {
                entry.scanner_mut().seek(key)
            };

            match seek_result {
                Ok(true) => self.heap.push(Reverse(entry)),
                Ok(false) => self.pending_close.push(entry.into_scanner()),
                Err(e) => {
                    self.pending_close.push(entry.into_scanner());
                    return Err(e);
                }
            }
        }

        Ok(false)
    }
}

impl CellScanner for ForwardScanHeap {
    fn peek(&self) -> Option<&Cell> {
        self.current.as_ref().and_then(|entry| entry.scanner.peek())
    }

    fn next(&mut self) -> crate::Result<Option<Cell>> {
        loop {
            let Some(mut entry) = self.current.take() else {
                return Ok(None);
            };

            let emitted = match entry.scanner_mut().next() {
                Ok(cell) => cell,
                Err(e) => {
                    // the failing scanner is terminal; keep the merge alive
                    // for the remaining ones and report the original failure
                    self.pending_close.push(entry.into_scanner());
                    self.current =
                        poll_real_kv(&mut self.heap, &mut self.pending_close).ok().flatten();
                    return Err(e);
                }
            };

            let Some(emitted) = emitted else {
                // the scanner disagreed with its own peek; drop it
                self.pending_close.push(entry.into_scanner());
                self.current = poll_real_kv(&mut self.heap, &mut self.pending_close)?;
                continue;
            };

            if entry.scanner().peek().is_none() {
                self.pending_close.push(entry.into_scanner());
                self.current = poll_real_kv(&mut self.heap, &mut self.pending_close)?;
            } else {
                // the advanced scanner may no longer be the least one
                let outranked = self.heap.peek().is_some_and(|root| entry > root.0);

                if outranked {
                    self.heap.push(Reverse(entry));
                    self.current = poll_real_kv(&mut self.heap, &mut self.pending_close)?;
                } else {
                    self.current = Some(entry);
                }
            }

            return Ok(Some(emitted));
        }
    }

    fn seek(&mut self, key: &Cell) -> crate::Result<bool> {
        self.generalized_seek(key, false, false, false)
    }

    fn reseek(&mut self, key: &Cell) -> crate::Result<bool> {
        self.generalized_seek(key, false, true, false)
    }

    fn request_seek(&mut self, key: &Cell, forward: bool, use_bloom: bool) -> crate::Result<bool> {
        self.generalized_seek(key, true, forward, use_bloom)
    }

    fn seek_to_previous_row(&mut self, _key: &Cell) -> crate::Result<bool> {
        Err(Error::Unsupported(
            "seek_to_previous_row cannot be called on a forward scan heap",
        ))
    }

    fn backward_seek(&mut self, _key: &Cell) -> crate::Result<bool> {
        Err(Error::Unsupported(
            "backward_seek cannot be called on a forward scan heap",
        ))
    }

    fn seek_to_last_row(&mut self) -> crate::Result<bool> {
        Err(Error::Unsupported(
            "seek_to_last_row cannot be called on a forward scan heap",
        ))
    }

    fn close(&mut self) {
        close_all(self.current.take(), &mut self.heap, &mut self.pending_close);
    }
}

pub(super) struct ForwardEntry {
    scanner: BoxedScanner,
    order: u64,
}

impl ScannerEntry for ForwardEntry {
    fn new(scanner: BoxedScanner, order: u64) -> Self {
        Self { scanner, order }
    }

    fn scanner(&self) -> &BoxedScanner {
        &self.scanner
    }

    fn scanner_mut(&mut self) -> &mut BoxedScanner {
        &mut self.scanner
    }

    fn into_scanner(self) -> BoxedScanner {
        self.scanner
    }
}

impl Ord for ForwardEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.scanner.peek(), other.scanner.peek()) {
            (Some(a), Some(b)) => CellComparator
                .compare(a, b)
                .then_with(|| self.order.cmp(&other.order)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.order.cmp(&other.order),
        }
    }
}

impl PartialOrd for ForwardEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ForwardEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ForwardEntry {}

#[cfg(test)]
#[expect(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::ArrayStore;
    use crate::{CellType, FlatCellMap, FlatMapScanner, Timestamp};
    use std::sync::Arc;
    use test_log::test;

    fn cell(row: &str, ts: Timestamp) -> Cell {
        Cell::new(row, "f", "q", ts, CellType::Put, "v", 0)
    }

    fn scanner_of(cells: Vec<Cell>) -> BoxedScanner {
        Box::new(FlatMapScanner::new(FlatCellMap::new(Arc::new(
            ArrayStore::from_sorted(cells).into(),
        ))))
    }

    fn drain(heap: &mut ForwardScanHeap) -> Vec<Cell> {
        let mut out = vec![];
        while let Some(cell) = heap.next().expect("should not fail") {
            out.push(cell);
        }
        out
    }

    #[test]
    fn forward_heap_merges_in_order() -> crate::Result<()> {
        let mut heap = ForwardScanHeap::new(
            vec![
                scanner_of(vec![cell("a", 1), cell("d", 1)]),
                scanner_of(vec![cell("b", 1), cell("c", 1), cell("e", 1)]),
                scanner_of(vec![cell("aa", 1)]),
            ],
            CellComparator,
        )?;

        assert_eq!(
            vec![
                cell("a", 1),
                cell("aa", 1),
                cell("b", 1),
                cell("c", 1),
                cell("d", 1),
                cell("e", 1),
            ],
            drain(&mut heap),
        );

        assert_eq!(None, heap.peek());
        heap.close();

        Ok(())
    }

    #[test]
    fn forward_heap_emission_is_non_decreasing() -> crate::Result<()> {
        let mut heap = ForwardScanHeap::new(
            vec![
                scanner_of(vec![cell("a", 3), cell("a", 1), cell("c", 2)]),
                scanner_of(vec![cell("a", 2), cell("b", 1), cell("c", 9)]),
                scanner_of(vec![cell("b", 5)]),
            ],
            CellComparator,
        )?;

        let cells = drain(&mut heap);
        assert_eq!(7, cells.len());
        assert!(cells.is_sorted());

        Ok(())
    }

    #[test]
    fn forward_heap_duplicate_coordinates_newest_seqno_first() -> crate::Result<()> {
        let newer = Cell::new("a", "f", "q", 1, CellType::Put, "new", 9);
        let older = Cell::new("a", "f", "q", 1, CellType::Put, "old", 2);

        let mut heap = ForwardScanHeap::new(
            vec![
                scanner_of(vec![older.clone()]),
                scanner_of(vec![newer.clone()]),
            ],
            CellComparator,
        )?;

        let cells = drain(&mut heap);
        assert_eq!(2, cells.len());
        assert_eq!(9, cells[0].seqno);
        assert_eq!(2, cells[1].seqno);

        Ok(())
    }

    #[test]
    fn forward_heap_seek() -> crate::Result<()> {
        let mut heap = ForwardScanHeap::new(
            vec![
                scanner_of(vec![cell("a", 1), cell("d", 1)]),
                scanner_of(vec![cell("b", 1), cell("e", 1)]),
            ],
            CellComparator,
        )?;

        assert!(heap.seek(&cell("c", 9))?);
        assert_eq!(Some(&cell("d", 1)), heap.peek());
        assert_eq!(vec![cell("d", 1), cell("e", 1)], drain(&mut heap));

        Ok(())
    }

    #[test]
    fn forward_heap_reseek() -> crate::Result<()> {
        let mut heap = ForwardScanHeap::new(
            vec![
                scanner_of(vec![cell("a", 1), cell("c", 1)]),
                scanner_of(vec![cell("b", 1), cell("d", 1)]),
            ],
            CellComparator,
        )?;

        assert_eq!(Some(cell("a", 1)), heap.next()?);
        assert!(heap.reseek(&cell("c", 9))?);
        assert_eq!(vec![cell("c", 1), cell("d", 1)], drain(&mut heap));

        Ok(())
    }

    #[test]
    fn forward_heap_seek_past_everything() -> crate::Result<()> {
        let mut heap = ForwardScanHeap::new(
            vec![scanner_of(vec![cell("a", 1)])],
            CellComparator,
        )?;

        assert!(!heap.seek(&cell("z", 1))?);
        assert_eq!(None, heap.peek());
        assert_eq!(None, heap.next()?);

        // the exhausted scanner waits for its delayed close
        assert_eq!(1, heap.take_pending_close().len());
        assert!(heap.take_pending_close().is_empty());

        Ok(())
    }

    #[test]
    fn forward_heap_rejects_reverse_ops() -> crate::Result<()> {
        let mut heap = ForwardScanHeap::new(
            vec![scanner_of(vec![cell("a", 1)])],
            CellComparator,
        )?;

        assert!(matches!(
            heap.seek_to_previous_row(&cell("a", 1)),
            Err(Error::Unsupported(_)),
        ));
        assert!(matches!(
            heap.backward_seek(&cell("a", 1)),
            Err(Error::Unsupported(_)),
        ));
        assert!(matches!(
            heap.seek_to_last_row(),
            Err(Error::Unsupported(_)),
        ));

        Ok(())
    }

    #[test]
    fn forward_heap_empty_scanners_closed_on_construction() -> crate::Result<()> {
        let mut heap = ForwardScanHeap::new(
            vec![scanner_of(vec![]), scanner_of(vec![cell("a", 1)])],
            CellComparator,
        )?;

        assert_eq!(vec![cell("a", 1)], drain(&mut heap));

        Ok(())
    }
}
