// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! K-way merging of cell scanners over a keyed priority queue.
//!
//! [`ForwardScanHeap`] merges in ascending cell order, [`ReversedScanHeap`]
//! in descending row order with the engine's canonical newest-first order
//! inside each row. Both implement [`crate::CellScanner`], so merges compose.

mod forward;
mod reversed;

pub use forward::ForwardScanHeap;
pub use reversed::ReversedScanHeap;

use crate::scanner::BoxedScanner;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A scanner plus its registration order, as stored in a scan heap.
///
/// Entries compare by their scanners' current `peek` cells under the heap's
/// merge order; the registration order is the stable tie-break between
/// scanners peeking at equal cells. An exhausted scanner sorts last.
pub(crate) trait ScannerEntry: Ord {
    fn new(scanner: BoxedScanner, order: u64) -> Self
    where
        Self: Sized;

    fn scanner(&self) -> &BoxedScanner;

    fn scanner_mut(&mut self) -> &mut BoxedScanner;

    fn into_scanner(self) -> BoxedScanner
    where
        Self: Sized;
}

/// Builds the initial heap, immediately closing scanners that are already
/// exhausted.
pub(crate) fn build_heap<E: ScannerEntry>(
    scanners: Vec<BoxedScanner>,
) -> BinaryHeap<Reverse<E>> {
    let mut heap = BinaryHeap::with_capacity(scanners.len());

    for (order, mut scanner) in (0u64..).zip(scanners) {
        if scanner.peek().is_some() {
            heap.push(Reverse(E::new(scanner, order)));
        } else {
            scanner.close();
        }
    }

    heap
}

/// Pops entries until one peeks at a real cell.
///
/// A scanner whose seek was postponed parks a shadow cell as its `peek`; when
/// such a scanner surfaces here, the real seek is forced and the scanner is
/// re-ranked before it may be returned. Exhausted scanners are collected for
/// delayed close.
pub(crate) fn poll_real_kv<E: ScannerEntry>(
    heap: &mut BinaryHeap<Reverse<E>>,
    pending_close: &mut Vec<BoxedScanner>,
) -> crate::Result<Option<E>> {
    let Some(Reverse(mut entry)) = heap.pop() else {
        return Ok(None);
    };

    loop {
        if entry.scanner().real_seek_done() {
            if entry.scanner().peek().is_some() {
                return Ok(Some(entry));
            }
            pending_close.push(entry.into_scanner());
        } else if entry.scanner().peek().is_some() {
            if let Err(e) = entry.scanner_mut().enforce_seek() {
                pending_close.push(entry.into_scanner());
                return Err(e);
            }

            if entry.scanner().peek().is_some() {
                // the real position may rank behind another scanner now
                let outranked = heap.peek().is_some_and(|root| entry > root.0);

                if outranked {
                    heap.push(Reverse(entry));
                } else {
                    return Ok(Some(entry));
                }
            } else {
                pending_close.push(entry.into_scanner());
            }
        } else {
            pending_close.push(entry.into_scanner());
        }

        match heap.pop() {
            Some(Reverse(next)) => entry = next,
            None => return Ok(None),
        }
    }
}

/// Closes everything a heap still holds: the current scanner, every heap
/// member and the delayed-close list.
pub(crate) fn close_all<E: ScannerEntry>(
    current: Option<E>,
    heap: &mut BinaryHeap<Reverse<E>>,
    pending_close: &mut Vec<BoxedScanner>,
) {
    log::trace!(
        "Closing merge heap: {} live scanner(s), {} delayed",
        heap.len() + usize::from(current.is_some()),
        pending_close.len(),
    );

    if let Some(entry) = current {
        let mut scanner = entry.into_scanner();
        scanner.close();
    }

    while let Some(Reverse(entry)) = heap.pop() {
        let mut scanner = entry.into_scanner();
        scanner.close();
    }

    for scanner in pending_close.iter_mut() {
        scanner.close();
    }
    pending_close.clear();
}
