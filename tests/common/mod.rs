#![allow(dead_code)]

use cell_map::{
    ArrayStore, BoxedScanner, Cell, CellScanner, CellStore, CellType, FlatCellMap,
    FlatMapScanner, SeqNo, Timestamp,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn cell(row: &str, ts: Timestamp) -> Cell {
    Cell::new(row, "f", "q", ts, CellType::Put, "v", 0)
}

pub fn cell_seq(row: &str, ts: Timestamp, seqno: SeqNo) -> Cell {
    Cell::new(row, "f", "q", ts, CellType::Put, "v", seqno)
}

pub fn flat_map_of(cells: Vec<Cell>) -> FlatCellMap {
    FlatCellMap::new(Arc::new(CellStore::from(ArrayStore::from_sorted(cells))))
}

pub fn scanner_of(cells: Vec<Cell>) -> BoxedScanner {
    Box::new(FlatMapScanner::new(flat_map_of(cells)))
}

/// Scanner positioned at the newest cell of its greatest row, ready for
/// reverse scanning.
pub fn reverse_scanner_of(cells: Vec<Cell>) -> BoxedScanner {
    let mut scanner = FlatMapScanner::new(flat_map_of(cells));
    scanner.seek_to_last_row().expect("should seek");
    Box::new(scanner)
}

/// Counts how many distinct scanners were closed.
#[derive(Clone, Default)]
pub struct CloseCounter(Arc<AtomicUsize>);

impl CloseCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wraps a scanner and reports its (first) close to a [`CloseCounter`].
pub struct CountingScanner {
    inner: BoxedScanner,
    counter: CloseCounter,
    closed: bool,
}

impl CountingScanner {
    pub fn new(inner: BoxedScanner, counter: &CloseCounter) -> Self {
        Self {
            inner,
            counter: counter.clone(),
            closed: false,
        }
    }
}

impl CellScanner for CountingScanner {
    fn peek(&self) -> Option<&Cell> {
        self.inner.peek()
    }

    fn next(&mut self) -> cell_map::Result<Option<Cell>> {
        self.inner.next()
    }

    fn seek(&mut self, key: &Cell) -> cell_map::Result<bool> {
        self.inner.seek(key)
    }

    fn reseek(&mut self, key: &Cell) -> cell_map::Result<bool> {
        self.inner.reseek(key)
    }

    fn seek_to_previous_row(&mut self, key: &Cell) -> cell_map::Result<bool> {
        self.inner.seek_to_previous_row(key)
    }

    fn backward_seek(&mut self, key: &Cell) -> cell_map::Result<bool> {
        self.inner.backward_seek(key)
    }

    fn seek_to_last_row(&mut self) -> cell_map::Result<bool> {
        self.inner.seek_to_last_row()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counter.0.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.close();
    }
}

/// Scanner that satisfies `request_seek` lazily: it parks the seek key and
/// presents a shadow cell until the heap forces the real positioning via
/// `enforce_seek`.
pub struct LazyScanner {
    inner: FlatMapScanner,
    pending: Option<(Cell, bool)>,
    shadow: Option<Cell>,
    pub enforced: Arc<AtomicUsize>,
}

impl LazyScanner {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            inner: FlatMapScanner::new(flat_map_of(cells)),
            pending: None,
            shadow: None,
            enforced: Arc::default(),
        }
    }
}

impl CellScanner for LazyScanner {
    fn peek(&self) -> Option<&Cell> {
        if self.pending.is_some() {
            self.shadow.as_ref()
        } else {
            self.inner.peek()
        }
    }

    fn next(&mut self) -> cell_map::Result<Option<Cell>> {
        self.enforce_seek()?;
        self.inner.next()
    }

    fn seek(&mut self, key: &Cell) -> cell_map::Result<bool> {
        self.pending = None;
        self.shadow = None;
        self.inner.seek(key)
    }

    fn reseek(&mut self, key: &Cell) -> cell_map::Result<bool> {
        self.pending = None;
        self.shadow = None;
        self.inner.reseek(key)
    }

    fn request_seek(
        &mut self,
        key: &Cell,
        forward: bool,
        _use_bloom: bool,
    ) -> cell_map::Result<bool> {
        // the shadow position must sort at or after the requested key,
        // so the key itself serves as the placeholder
        self.pending = Some((key.clone(), forward));
        self.shadow = Some(key.clone());
        Ok(true)
    }

    fn real_seek_done(&self) -> bool {
        self.pending.is_none()
    }

    fn enforce_seek(&mut self) -> cell_map::Result<()> {
        if let Some((key, forward)) = self.pending.take() {
            self.shadow = None;
            self.enforced.fetch_add(1, Ordering::Relaxed);

            if forward {
                self.inner.reseek(&key)?;
            } else {
                self.inner.seek(&key)?;
            }
        }

        Ok(())
    }

    fn seek_to_previous_row(&mut self, key: &Cell) -> cell_map::Result<bool> {
        self.enforce_seek()?;
        self.inner.seek_to_previous_row(key)
    }

    fn backward_seek(&mut self, key: &Cell) -> cell_map::Result<bool> {
        self.enforce_seek()?;
        self.inner.backward_seek(key)
    }

    fn seek_to_last_row(&mut self) -> cell_map::Result<bool> {
        self.pending = None;
        self.shadow = None;
        self.inner.seek_to_last_row()
    }

    fn close(&mut self) {
        self.pending = None;
        self.shadow = None;
        self.inner.close();
    }
}

/// Scanner whose reverse repositioning fails with an I/O error.
pub struct FailingScanner {
    inner: FlatMapScanner,
}

impl FailingScanner {
    pub fn new_reversed(cells: Vec<Cell>) -> Self {
        let mut inner = FlatMapScanner::new(flat_map_of(cells));
        inner.seek_to_last_row().expect("should seek");
        Self { inner }
    }
}

impl CellScanner for FailingScanner {
    fn peek(&self) -> Option<&Cell> {
        self.inner.peek()
    }

    fn next(&mut self) -> cell_map::Result<Option<Cell>> {
        self.inner.next()
    }

    fn seek(&mut self, key: &Cell) -> cell_map::Result<bool> {
        self.inner.seek(key)
    }

    fn reseek(&mut self, key: &Cell) -> cell_map::Result<bool> {
        self.inner.reseek(key)
    }

    fn seek_to_previous_row(&mut self, _key: &Cell) -> cell_map::Result<bool> {
        Err(std::io::Error::other("injected failure").into())
    }

    fn backward_seek(&mut self, _key: &Cell) -> cell_map::Result<bool> {
        Err(std::io::Error::other("injected failure").into())
    }

    fn seek_to_last_row(&mut self) -> cell_map::Result<bool> {
        self.inner.seek_to_last_row()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
