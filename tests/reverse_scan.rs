mod common;

use common::{
    cell, cell_seq, reverse_scanner_of, CloseCounter, CountingScanner, FailingScanner,
};
use cell_map::{
    Cell, CellComparator, CellScanner, CellStore, EncodedStore, Error, FlatCellMap,
    FlatMapScanner, ReversedScanHeap,
};
use std::sync::Arc;
use test_log::test;

fn drain(heap: &mut ReversedScanHeap) -> Vec<Cell> {
    let mut out = vec![];
    while let Some(cell) = heap.next().expect("should not fail") {
        out.push(cell);
    }
    out
}

#[test]
fn reverse_scan_two_sources() -> cell_map::Result<()> {
    // source 1 holds rows "a" and "c" (newest first within a row),
    // source 2 holds row "b"
    let mut heap = ReversedScanHeap::new(
        vec![
            reverse_scanner_of(vec![cell("a", 1), cell("c", 2), cell("c", 1)]),
            reverse_scanner_of(vec![cell("b", 1)]),
        ],
        CellComparator,
    )?;

    assert_eq!(
        vec![cell("c", 2), cell("c", 1), cell("b", 1), cell("a", 1)],
        drain(&mut heap),
    );

    Ok(())
}

#[test]
fn reverse_scan_seek_to_previous_row_does_not_skip_rows() -> cell_map::Result<()> {
    let mut heap = ReversedScanHeap::new(
        vec![
            reverse_scanner_of(vec![cell("a", 1), cell("c", 2), cell("c", 1)]),
            reverse_scanner_of(vec![cell("b", 1)]),
        ],
        CellComparator,
    )?;

    assert_eq!(Some(cell("c", 2)), heap.next()?);
    assert_eq!(Some(cell("c", 1)), heap.next()?);

    // positions at the greatest row strictly before "c", which is "b"
    assert!(heap.seek_to_previous_row(&cell("c", 1))?);
    assert_eq!(Some(cell("b", 1)), heap.next()?);
    assert_eq!(Some(cell("a", 1)), heap.next()?);
    assert_eq!(None, heap.next()?);

    Ok(())
}

#[test]
fn reverse_scan_backward_seek_fast_exit() -> cell_map::Result<()> {
    let mut heap = ReversedScanHeap::new(
        vec![
            reverse_scanner_of(vec![cell("a", 1), cell("c", 2), cell("c", 1)]),
            reverse_scanner_of(vec![cell("b", 1)]),
        ],
        CellComparator,
    )?;

    assert_eq!(Some(&cell("c", 2)), heap.peek());

    assert!(heap.backward_seek(&Cell::first_on_row("b"))?);
    assert_eq!(Some(cell("b", 1)), heap.next()?);
    assert_eq!(Some(cell("a", 1)), heap.next()?);
    assert_eq!(None, heap.next()?);

    Ok(())
}

#[test]
fn reverse_scan_across_store_variants() -> cell_map::Result<()> {
    let encoded_cells = vec![cell_seq("b", 2, 8), cell_seq("b", 1, 5), cell_seq("d", 1, 6)];

    let encoded_map = FlatCellMap::new(Arc::new(CellStore::from(EncodedStore::encode(
        &encoded_cells,
    ))));
    let mut encoded_scanner = FlatMapScanner::new(encoded_map);
    encoded_scanner.seek_to_last_row()?;

    let mut heap = ReversedScanHeap::new(
        vec![
            Box::new(encoded_scanner),
            reverse_scanner_of(vec![cell("a", 1), cell("c", 1)]),
        ],
        CellComparator,
    )?;

    assert_eq!(
        vec![
            cell_seq("d", 1, 6),
            cell("c", 1),
            cell_seq("b", 2, 8),
            cell_seq("b", 1, 5),
            cell("a", 1),
        ],
        drain(&mut heap),
    );

    Ok(())
}

#[test]
fn reverse_scan_interleaved_versions() -> cell_map::Result<()> {
    // versions of the same rows are spread over both sources
    let mut heap = ReversedScanHeap::new(
        vec![
            reverse_scanner_of(vec![cell("a", 3), cell("a", 1), cell("b", 2)]),
            reverse_scanner_of(vec![cell("a", 2), cell("b", 9), cell("b", 1)]),
        ],
        CellComparator,
    )?;

    assert_eq!(
        vec![
            cell("b", 9),
            cell("b", 2),
            cell("b", 1),
            cell("a", 3),
            cell("a", 2),
            cell("a", 1),
        ],
        drain(&mut heap),
    );

    Ok(())
}

#[test]
fn reverse_scan_composes() -> cell_map::Result<()> {
    // a reversed heap is itself a scanner, so merges can be layered
    let inner = ReversedScanHeap::new(
        vec![
            reverse_scanner_of(vec![cell("a", 1), cell("d", 1)]),
            reverse_scanner_of(vec![cell("c", 1)]),
        ],
        CellComparator,
    )?;

    let mut outer = ReversedScanHeap::new(
        vec![
            Box::new(inner),
            reverse_scanner_of(vec![cell("b", 1), cell("e", 1)]),
        ],
        CellComparator,
    )?;

    assert_eq!(
        vec![
            cell("e", 1),
            cell("d", 1),
            cell("c", 1),
            cell("b", 1),
            cell("a", 1),
        ],
        drain(&mut outer),
    );

    Ok(())
}

#[test]
fn reverse_scan_delayed_close() -> cell_map::Result<()> {
    let counter = CloseCounter::default();

    let mut heap = ReversedScanHeap::new(
        vec![
            Box::new(CountingScanner::new(
                reverse_scanner_of(vec![cell("b", 1)]),
                &counter,
            )),
            Box::new(CountingScanner::new(
                reverse_scanner_of(vec![cell("c", 1)]),
                &counter,
            )),
        ],
        CellComparator,
    )?;

    assert_eq!(Some(cell("c", 1)), heap.next()?);

    // the "c" scanner exhausted but is only parked, not closed
    assert_eq!(0, counter.get());

    let mut pending = heap.take_pending_close();
    assert_eq!(1, pending.len());
    for scanner in &mut pending {
        scanner.close();
    }
    assert_eq!(1, counter.get());

    assert_eq!(Some(cell("b", 1)), heap.next()?);
    heap.close();
    assert_eq!(2, counter.get());

    Ok(())
}

#[test]
fn reverse_scan_scanner_failure_is_terminal_for_that_scanner() -> cell_map::Result<()> {
    let mut heap = ReversedScanHeap::new(
        vec![
            Box::new(FailingScanner::new_reversed(vec![cell("c", 1)])),
            reverse_scanner_of(vec![cell("a", 1), cell("b", 1)]),
        ],
        CellComparator,
    )?;

    // emitting (c,1) exhausts the failing scanner's row, and its
    // repositioning blows up
    assert!(matches!(heap.next(), Err(Error::Io(_))));

    // the failing scanner is parked for close; the merge continues
    assert_eq!(1, heap.take_pending_close().len());
    assert_eq!(Some(cell("b", 1)), heap.next()?);
    assert_eq!(Some(cell("a", 1)), heap.next()?);
    assert_eq!(None, heap.next()?);

    Ok(())
}

#[test]
fn reverse_scan_forward_seeks_are_illegal() -> cell_map::Result<()> {
    let mut heap = ReversedScanHeap::new(
        vec![reverse_scanner_of(vec![cell("a", 1)])],
        CellComparator,
    )?;

    assert!(matches!(heap.seek(&cell("a", 1)), Err(Error::IllegalState(_))));
    assert!(matches!(
        heap.reseek(&cell("a", 1)),
        Err(Error::IllegalState(_)),
    ));
    assert!(matches!(
        heap.request_seek(&cell("a", 1), true, true),
        Err(Error::IllegalState(_)),
    ));
    assert!(matches!(heap.seek_to_last_row(), Err(Error::Unsupported(_))));

    // the failed calls did not disturb the scan
    assert_eq!(vec![cell("a", 1)], drain(&mut heap));

    Ok(())
}
