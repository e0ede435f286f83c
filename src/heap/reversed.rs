// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{build_heap, close_all, poll_real_kv, ScannerEntry};
use crate::comparator::CellComparator;
use crate::scanner::{BoxedScanner, CellScanner};
use crate::{Cell, Error};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// K-way merge of scanners for reverse scanning: rows are walked from the
/// greatest to the least, while each row's cells come out in the canonical
/// ascending (newest first) order.
///
/// The scanner ranking sorts the greater row first and, within a row, the
/// smaller cell first. All repositioning is backward
/// ([`CellScanner::backward_seek`], [`CellScanner::seek_to_previous_row`]);
/// the forward seeks fail with an illegal-state error, and `next`
/// automatically sends a scanner back to its previous row once it runs off
/// the row it is emitting.
///
/// Scanners handed to the constructor must already be positioned for reverse
/// scanning, e.g. via [`CellScanner::seek_to_last_row`] or
/// [`CellScanner::backward_seek`].
pub struct ReversedScanHeap {
    heap: BinaryHeap<Reverse<ReversedEntry>>,
    current: Option<ReversedEntry>,
    pending_close: Vec<BoxedScanner>,
    comparator: CellComparator,
}

impl ReversedScanHeap {
    /// Merges the given pre-positioned scanners.
    ///
    /// Scanners that are already exhausted are closed immediately.
    pub fn new(scanners: Vec<BoxedScanner>, comparator: CellComparator) -> crate::Result<Self> {
        let mut heap = build_heap::<ReversedEntry>(scanners);
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
}

impl CellScanner for ReversedScanHeap {
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

            // Exhausted, or crossed forward over the row boundary: either
            // way the scanner cannot stay inside the row it just emitted
            // from and has to be sent back to the previous row.
            let must_reposition = match entry.scanner().peek() {
                Some(after) => {
                    self.comparator.compare_rows(after, &emitted) == Ordering::Greater
                }
                None => true,
            };

            if must_reposition {
                match entry.scanner_mut().seek_to_previous_row(&emitted) {
                    Ok(true) => self.heap.push(Reverse(entry)),
                    Ok(false) => self.pending_close.push(entry.into_scanner()),
                    Err(e) => {
                        // terminal for this scanner; the merge continues
                        // with whatever the heap still holds
                        self.pending_close.push(entry.into_scanner());
                        self.current =
                            poll_real_kv(&mut self.heap, &mut self.pending_close).ok().flatten();
                        return Err(e);
                    }
                }
                self.current = poll_real_kv(&mut self.heap, &mut self.pending_close)?;
            } else {
                // the advanced scanner may no longer rank first
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

    fn seek(&mut self, _key: &Cell) -> crate::Result<bool> {
        Err(Error::IllegalState(
            "seek cannot be called on a reversed scan heap",
        ))
    }

    fn reseek(&mut self, _key: &Cell) -> crate::Result<bool> {
        Err(Error::IllegalState(
            "reseek cannot be called on a reversed scan heap",
        ))
    }

    fn request_seek(&mut self, _key: &Cell, _forward: bool, _use_bloom: bool) -> crate::Result<bool> {
        Err(Error::IllegalState(
            "request_seek cannot be called on a reversed scan heap",
        ))
    }

    fn seek_to_previous_row(&mut self, key: &Cell) -> crate::Result<bool> {
        let Some(entry) = self.current.take() else {
            return Ok(false);
        };
        self.heap.push(Reverse(entry));

        while let Some(Reverse(mut entry)) = self.heap.pop() {
            let already_before = entry
                .scanner()
                .peek()
                .is_some_and(|top| self.comparator.compare_rows(top, key) == Ordering::Less);

            if already_before {
                // top row is before the seek row; the heap is settled
                self.heap.push(Reverse(entry));
                self.current = poll_real_kv(&mut self.heap, &mut self.pending_close)?;
                return Ok(self.current.is_some());
            }

            match entry.scanner_mut().seek_to_previous_row(key) {
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

    fn backward_seek(&mut self, key: &Cell) -> crate::Result<bool> {
        let Some(entry) = self.current.take() else {
            return Ok(false);
        };
        self.heap.push(Reverse(entry));

        while let Some(Reverse(mut entry)) = self.heap.pop() {
            // top is already at or before the seek key in the
            // reversed-scan sense
            let already_at_or_before = entry.scanner().peek().is_some_and(|top| {
                (self.comparator.matching_rows(key, top)
                    && self.comparator.compare(key, top) != Ordering::Greater)
                    || self.comparator.compare_rows(key, top) == Ordering::Greater
            });

            if already_at_or_before {
                self.heap.push(Reverse(entry));
                self.current = poll_real_kv(&mut self.heap, &mut self.pending_close)?;
                return Ok(self.current.is_some());
            }

            match entry.scanner_mut().backward_seek(key) {
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

    fn seek_to_last_row(&mut self) -> crate::Result<bool> {
        Err(Error::Unsupported(
            "seek_to_last_row is not implemented on a reversed scan heap",
        ))
    }

    fn close(&mut self) {
        close_all(self.current.take(), &mut self.heap, &mut self.pending_close);
    }
}

pub(super) struct ReversedEntry {
    scanner: BoxedScanner,
    order: u64,
}

impl ScannerEntry for ReversedEntry {
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

// The greater row ranks first; within a row, the plain ascending cell
// order decides, so duplicates across scanners still surface newest first.
impl Ord for ReversedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.scanner.peek(), other.scanner.peek()) {
            (Some(a), Some(b)) => CellComparator
                .compare_rows(a, b)
                .reverse()
                .then_with(|| CellComparator.compare(a, b))
                .then_with(|| self.order.cmp(&other.order)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.order.cmp(&other.order),
        }
    }
}

impl PartialOrd for ReversedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ReversedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReversedEntry {}
