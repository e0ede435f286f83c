// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::comparator::CellComparator;
use crate::{Cell, FlatCellMap};

/// A cell scanner behind a vtable, as held by the scan heaps.
pub type BoxedScanner = Box<dyn CellScanner>;

/// Uniform view over any source of sorted cells.
///
/// Sources may be in-memory maps, file readers or merges of other scanners;
/// the heaps treat them opaquely. A scanner reports exhaustion by returning
/// `None` from [`CellScanner::peek`]/[`CellScanner::next`] or `false` from
/// the seek operations; exhaustion is not an error.
pub trait CellScanner {
    /// Returns the cell that a subsequent [`CellScanner::next`] would return,
    /// without advancing. `None` iff exhausted.
    fn peek(&self) -> Option<&Cell>;

    /// Returns the current cell and advances. `None` iff exhausted.
    fn next(&mut self) -> crate::Result<Option<Cell>>;

    /// Positions the scanner so that `peek` is the least cell at or after
    /// `key` in ascending order. Returns whether any cells remain.
    fn seek(&mut self, key: &Cell) -> crate::Result<bool>;

    /// Like [`CellScanner::seek`], with the promise that `key` is not before
    /// the current position, which allows skipping work.
    fn reseek(&mut self, key: &Cell) -> crate::Result<bool>;

    /// Requests a seek that an implementation may satisfy lazily, optionally
    /// consulting a Bloom filter to avoid the work entirely.
    ///
    /// A lazy implementation parks a shadow cell as its `peek` and reports
    /// `false` from [`CellScanner::real_seek_done`] until
    /// [`CellScanner::enforce_seek`] forces the real positioning.
    fn request_seek(&mut self, key: &Cell, forward: bool, use_bloom: bool) -> crate::Result<bool> {
        let _ = use_bloom;

        if forward {
            self.reseek(key)
        } else {
            self.seek(key)
        }
    }

    /// Returns `true` if the most recent seek has actually been performed,
    /// i.e. the current `peek` is a real cell rather than a shadow cell.
    fn real_seek_done(&self) -> bool {
        true
    }

    /// Performs the seek that was postponed by [`CellScanner::request_seek`].
    fn enforce_seek(&mut self) -> crate::Result<()> {
        Ok(())
    }

    /// Positions the scanner at the newest cell of the greatest row strictly
    /// before the row of `key`. Returns whether any cells remain.
    fn seek_to_previous_row(&mut self, key: &Cell) -> crate::Result<bool>;

    /// Positions the scanner for a reverse scan anchored at `key`: at the
    /// least cell at or after `key` if that cell still belongs to the row of
    /// `key`, otherwise at the newest cell of the greatest row before it.
    /// Returns whether any cells remain.
    fn backward_seek(&mut self, key: &Cell) -> crate::Result<bool>;

    /// Positions the scanner at the newest cell of the greatest row.
    /// Returns whether any cells remain.
    fn seek_to_last_row(&mut self) -> crate::Result<bool>;

    /// Releases the scanner. Idempotent.
    fn close(&mut self);
}

/// Scanner over a [`FlatCellMap`], walking it in ascending cell order.
///
/// The scanner starts positioned at the first cell. It supports both scan
/// directions: forward via `seek`/`reseek`, reverse via
/// `seek_to_previous_row`/`backward_seek`/`seek_to_last_row`. All seeks are
/// performed eagerly.
pub struct FlatMapScanner {
    map: FlatCellMap,
    pos: usize,
    current: Option<Cell>,
    closed: bool,
}

impl FlatMapScanner {
    /// Creates a scanner over the given map, positioned at the first cell.
    ///
    /// A descending map is walked through its ascending view; orientation is
    /// a property of the map, scan direction is a property of the caller.
    #[must_use]
    pub fn new(map: FlatCellMap) -> Self {
        let map = if map.is_descending() {
            map.descending_map()
        } else {
            map
        };

        let mut scanner = Self {
            map,
            pos: 0,
            current: None,
            closed: false,
        };
        scanner.set_position(0);
        scanner
    }

    fn set_position(&mut self, pos: usize) {
        self.current = self.map.cell_at(pos);
        self.pos = pos;
    }

    fn exhaust(&mut self) {
        self.current = None;
        self.pos = self.map.len();
    }
}

impl CellScanner for FlatMapScanner {
    fn peek(&self) -> Option<&Cell> {
        self.current.as_ref()
    }

    fn next(&mut self) -> crate::Result<Option<Cell>> {
        let cell = self.current.take();

        if cell.is_some() {
            self.set_position(self.pos + 1);
        }

        Ok(cell)
    }

    fn seek(&mut self, key: &Cell) -> crate::Result<bool> {
        if self.closed {
            return Ok(false);
        }

        let (Ok(pos) | Err(pos)) = self.map.find_from(key, 0);
        self.set_position(pos);

        Ok(self.current.is_some())
    }

    fn reseek(&mut self, key: &Cell) -> crate::Result<bool> {
        if self.closed {
            return Ok(false);
        }

        let (Ok(pos) | Err(pos)) = self.map.find_from(key, self.pos);
        self.set_position(pos);

        Ok(self.current.is_some())
    }

    fn seek_to_previous_row(&mut self, key: &Cell) -> crate::Result<bool> {
        if self.closed {
            return Ok(false);
        }

        let anchor = Cell::first_on_row(key.row.clone());
        let (Ok(row_start) | Err(row_start)) = self.map.find_from(&anchor, 0);

        // everything before `row_start` belongs to strictly smaller rows
        let Some(last_before) = row_start.checked_sub(1) else {
            self.exhaust();
            return Ok(false);
        };

        let Some(previous) = self.map.cell_at(last_before) else {
            self.exhaust();
            return Ok(false);
        };

        let anchor = Cell::first_on_row(previous.row.clone());
        let (Ok(pos) | Err(pos)) = self.map.find_from(&anchor, 0);
        self.set_position(pos);

        Ok(self.current.is_some())
    }

    fn backward_seek(&mut self, key: &Cell) -> crate::Result<bool> {
        if self.closed {
            return Ok(false);
        }

        self.seek(key)?;

        let same_row = self
            .current
            .as_ref()
            .is_some_and(|cell| CellComparator.matching_rows(cell, key));

        if same_row {
            return Ok(true);
        }

        self.seek_to_previous_row(key)
    }

    fn seek_to_last_row(&mut self) -> crate::Result<bool> {
        if self.closed {
            return Ok(false);
        }

        let Some(last) = self.map.last_key() else {
            self.exhaust();
            return Ok(false);
        };

        let anchor = Cell::first_on_row(last.row.clone());
        let (Ok(pos) | Err(pos)) = self.map.find_from(&anchor, 0);
        self.set_position(pos);

        Ok(self.current.is_some())
    }

    fn close(&mut self) {
        self.closed = true;
        self.exhaust();
    }
}
