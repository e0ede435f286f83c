// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::comparator::CellComparator;
use crate::store::CellStore;
use crate::Cell;
use std::cmp::Ordering;
use std::sync::Arc;

/// Navigable map over a contiguous `[min_idx, max_idx)` slice of a [`CellStore`].
///
/// The map stores a constant number of cells and is immutable after creation:
/// there are no insert, remove, clear or poll operations. Because the memory
/// layout is a sequential array, it needs less memory than a skip list and
/// every lookup is a plain binary search.
///
/// Submaps, head/tail maps and descending views share the backing store; no
/// cells are copied. The map uses no synchronization primitives: it is
/// created by a single thread and may then be read by multiple threads, as
/// long as the reference itself is published with a release/acquire edge
/// (e.g. an `Arc` hand-off).
///
/// A descending map presents the same slice in reverse orientation; all
/// navigable queries are answered relative to that reversed order.
#[derive(Clone, Debug)]
pub struct FlatCellMap {
    store: Arc<CellStore>,
    comparator: CellComparator,
    min_idx: usize,
    max_idx: usize,
    descending: bool,
}

/// Key/value pair of a [`FlatCellMap`].
///
/// A cell is its own key: both accessors expose the same underlying cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry(Cell);

impl Entry {
    /// Returns the key cell.
    #[must_use]
    pub fn key(&self) -> &Cell {
        &self.0
    }

    /// Returns the value, which is the same cell as the key.
    #[must_use]
    pub fn value(&self) -> &Cell {
        &self.0
    }

    /// Consumes the entry, returning the underlying cell.
    #[must_use]
    pub fn into_cell(self) -> Cell {
        self.0
    }
}

impl FlatCellMap {
    /// Creates an ascending map over the whole store.
    #[must_use]
    pub fn new(store: Arc<CellStore>) -> Self {
        let len = store.len();
        Self::with_bounds(store, 0, len, false)
    }

    /// Creates a map over `[min_idx, max_idx)` of the store.
    ///
    /// # Panics
    ///
    /// Panics if the bounds are out of range or inverted.
    #[must_use]
    pub fn with_bounds(
        store: Arc<CellStore>,
        min_idx: usize,
        max_idx: usize,
        descending: bool,
    ) -> Self {
        assert!(min_idx <= max_idx, "map bounds are inverted");
        assert!(max_idx <= store.len(), "map bounds exceed the store");

        Self {
            store,
            comparator: CellComparator,
            min_idx,
            max_idx,
            descending,
        }
    }

    /// Returns the comparator that defines the map order.
    #[must_use]
    pub fn comparator(&self) -> CellComparator {
        self.comparator
    }

    /// Returns the number of cells in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.max_idx - self.min_idx
    }

    /// Returns `true` if the map contains no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the map presents its slice in reverse orientation.
    #[must_use]
    pub fn is_descending(&self) -> bool {
        self.descending
    }

    /// Returns the cell at the given logical position, counted in the map's
    /// own orientation.
    pub(crate) fn cell_at(&self, pos: usize) -> Option<Cell> {
        if pos >= self.len() {
            return None;
        }

        let idx = if self.descending {
            self.max_idx - 1 - pos
        } else {
            self.min_idx + pos
        };

        self.store.get(idx)
    }

    /// Binary search over logical positions `[lo, len)`.
    ///
    /// Returns `Ok(position)` on an exact match and `Err(insertion_point)`
    /// otherwise, where the insertion point is the first position whose cell
    /// is greater than the needle in the map's orientation. The comparison
    /// sign is flipped for descending maps, so one routine serves both views.
    pub(crate) fn find_from(&self, needle: &Cell, lo: usize) -> Result<usize, usize> {
        let mut left = lo;
        let mut right = self.len();

        while left < right {
            let mid = (left + right) / 2;

            let Some(mid_cell) = self.cell_at(mid) else {
                // store bounds are validated at construction
                return Err(left);
            };

            let mut ord = self.comparator.compare(&mid_cell, needle);
            if self.descending {
                ord = ord.reverse();
            }

            match ord {
                Ordering::Equal => return Ok(mid),
                Ordering::Less => left = mid + 1,
                Ordering::Greater => right = mid,
            }
        }

        Err(left)
    }

    fn find(&self, needle: &Cell) -> Result<usize, usize> {
        self.find_from(needle, 0)
    }

    /// Derives the half-open logical boundary for the given anchor key.
    ///
    /// It does not matter whether the key exists in the map or not. When it
    /// does, the boundary must advance past it iff the anchor is included on
    /// that side: a submap end points one past its last cell.
    fn bound_index(&self, key: &Cell, inclusive: bool, tail: bool) -> usize {
        match self.find(key) {
            Ok(pos) => {
                if tail == inclusive {
                    pos
                } else {
                    pos + 1
                }
            }
            Err(insertion_point) => insertion_point,
        }
    }

    fn sub(&self, lo: usize, hi: usize) -> Self {
        debug_assert!(lo <= hi && hi <= self.len());

        let (min_idx, max_idx) = if self.descending {
            (self.max_idx - hi, self.max_idx - lo)
        } else {
            (self.min_idx + lo, self.min_idx + hi)
        };

        Self {
            store: Arc::clone(&self.store),
            comparator: self.comparator,
            min_idx,
            max_idx,
            descending: self.descending,
        }
    }

    // ---------------- key getters ----------------

    /// Returns the first cell in map order, or `None` if empty.
    #[must_use]
    pub fn first_key(&self) -> Option<Cell> {
        self.cell_at(0)
    }

    /// Returns the last cell in map order, or `None` if empty.
    #[must_use]
    pub fn last_key(&self) -> Option<Cell> {
        self.cell_at(self.len().checked_sub(1)?)
    }

    /// Returns the greatest cell less than or equal to `key` in map order.
    #[must_use]
    pub fn floor_key(&self, key: &Cell) -> Option<Cell> {
        let pos = match self.find(key) {
            Ok(pos) => pos,
            Err(insertion_point) => insertion_point.checked_sub(1)?,
        };
        self.cell_at(pos)
    }

    /// Returns the least cell greater than or equal to `key` in map order.
    #[must_use]
    pub fn ceiling_key(&self, key: &Cell) -> Option<Cell> {
        let pos = match self.find(key) {
            Ok(pos) => pos,
            Err(insertion_point) => insertion_point,
        };
        self.cell_at(pos)
    }

    /// Returns the greatest cell strictly less than `key` in map order.
    #[must_use]
    pub fn lower_key(&self, key: &Cell) -> Option<Cell> {
        let pos = match self.find(key) {
            Ok(pos) => pos.checked_sub(1)?,
            Err(insertion_point) => insertion_point.checked_sub(1)?,
        };
        self.cell_at(pos)
    }

    /// Returns the least cell strictly greater than `key` in map order.
    #[must_use]
    pub fn higher_key(&self, key: &Cell) -> Option<Cell> {
        let pos = match self.find(key) {
            Ok(pos) => pos + 1,
            Err(insertion_point) => insertion_point,
        };
        self.cell_at(pos)
    }

    /// Returns the cell at exactly the given coordinate, or `None`.
    ///
    /// Exactness is defined by the full comparator, including the sequence
    /// number.
    #[must_use]
    pub fn get(&self, key: &Cell) -> Option<Cell> {
        let pos = self.find(key).ok()?;
        self.cell_at(pos)
    }

    /// Returns `true` if the map contains the given coordinate.
    #[must_use]
    pub fn contains_key(&self, key: &Cell) -> bool {
        self.find(key).is_ok()
    }

    // ---------------- entry getters ----------------

    /// Returns the first entry in map order, or `None` if empty.
    #[must_use]
    pub fn first_entry(&self) -> Option<Entry> {
        self.first_key().map(Entry)
    }

    /// Returns the last entry in map order, or `None` if empty.
    #[must_use]
    pub fn last_entry(&self) -> Option<Entry> {
        self.last_key().map(Entry)
    }

    /// Entry variant of [`FlatCellMap::floor_key`].
    #[must_use]
    pub fn floor_entry(&self, key: &Cell) -> Option<Entry> {
        self.floor_key(key).map(Entry)
    }

    /// Entry variant of [`FlatCellMap::ceiling_key`].
    #[must_use]
    pub fn ceiling_entry(&self, key: &Cell) -> Option<Entry> {
        self.ceiling_key(key).map(Entry)
    }

    /// Entry variant of [`FlatCellMap::lower_key`].
    #[must_use]
    pub fn lower_entry(&self, key: &Cell) -> Option<Entry> {
        self.lower_key(key).map(Entry)
    }

    /// Entry variant of [`FlatCellMap::higher_key`].
    #[must_use]
    pub fn higher_entry(&self, key: &Cell) -> Option<Entry> {
        self.higher_key(key).map(Entry)
    }

    // ---------------- submaps ----------------

    /// Returns the portion of the map between `from` and `to`, sharing the
    /// backing store.
    ///
    /// The anchors are interpreted in map order; an inverted range collapses
    /// to an empty map.
    #[must_use]
    pub fn sub_map(
        &self,
        from: &Cell,
        from_inclusive: bool,
        to: &Cell,
        to_inclusive: bool,
    ) -> Self {
        let lo = self.bound_index(from, from_inclusive, true);
        let hi = self.bound_index(to, to_inclusive, false);
        let hi = hi.max(lo);
        self.sub(lo, hi)
    }

    /// Returns the portion of the map before `to`, sharing the backing store.
    #[must_use]
    pub fn head_map(&self, to: &Cell, inclusive: bool) -> Self {
        self.sub(0, self.bound_index(to, inclusive, false))
    }

    /// Returns the portion of the map at and after `from`, sharing the
    /// backing store.
    #[must_use]
    pub fn tail_map(&self, from: &Cell, inclusive: bool) -> Self {
        self.sub(self.bound_index(from, inclusive, true), self.len())
    }

    /// Returns a view of the same slice in reverse orientation, sharing the
    /// backing store.
    #[must_use]
    pub fn descending_map(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            comparator: self.comparator,
            min_idx: self.min_idx,
            max_idx: self.max_idx,
            descending: !self.descending,
        }
    }

    // ---------------- iteration ----------------

    /// Iterates over the cells in map order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            map: self,
            front: 0,
            back: self.len(),
        }
    }
}

impl<'a> IntoIterator for &'a FlatCellMap {
    type Item = Cell;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the cells of a [`FlatCellMap`], in map order.
pub struct Iter<'a> {
    map: &'a FlatCellMap,
    front: usize,
    back: usize,
}

impl Iterator for Iter<'_> {
    type Item = Cell;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }

        let cell = self.map.cell_at(self.front);
        self.front += 1;
        cell
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }

        self.back -= 1;
        self.map.cell_at(self.back)
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl std::iter::FusedIterator for Iter<'_> {}
