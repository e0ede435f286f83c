// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::cell::SeqNo;
use crate::coding::{Decode, DecodeError, Encode};
use crate::comparator::CellComparator;
use crate::{Cell, Slice};
use byteorder::{BigEndian, ReadBytesExt};
use std::cmp::Ordering;
use std::io::Cursor;
use std::sync::Arc;

/// Immutable indexed container of cells, sorted ascending by [`CellComparator`].
///
/// The store is created by a single thread and never mutated afterwards, so
/// it can be read by multiple threads without synchronization once it has
/// been published (an `Arc` hand-off provides the required release/acquire
/// edge).
///
/// The variants are a tagged enum rather than a trait object so that the
/// binary-search inner loop does not pay for virtual dispatch.
#[derive(Clone, Debug)]
pub enum CellStore {
    /// Cells materialized as a contiguous array
    Array(ArrayStore),

    /// Cells packed into a contiguous byte region plus an offset index
    Encoded(EncodedStore),
}

impl CellStore {
    /// Returns the number of cells in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Array(store) => store.len(),
            Self::Encoded(store) => store.len(),
        }
    }

    /// Returns `true` if the store contains no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the i-th cell, or `None` if out of bounds.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Cell> {
        match self {
            Self::Array(store) => store.get(idx),
            Self::Encoded(store) => store.get(idx),
        }
    }
}

impl From<ArrayStore> for CellStore {
    fn from(value: ArrayStore) -> Self {
        Self::Array(value)
    }
}

impl From<EncodedStore> for CellStore {
    fn from(value: EncodedStore) -> Self {
        Self::Encoded(value)
    }
}

/// Cell store backed by a contiguous array of materialized cells.
#[derive(Clone, Debug)]
pub struct ArrayStore {
    cells: Arc<[Cell]>,
}

impl ArrayStore {
    /// Creates a store from cells already sorted ascending by [`CellComparator`].
    #[must_use]
    pub fn from_sorted(cells: Vec<Cell>) -> Self {
        debug_assert!(cells.is_sorted(), "cells must be sorted");

        Self {
            cells: cells.into(),
        }
    }

    /// Creates a store from cells in arbitrary order.
    ///
    /// Sorts by [`CellComparator`] and drops duplicates of the same
    /// coordinate, keeping the first occurrence.
    #[must_use]
    pub fn from_unsorted(mut cells: Vec<Cell>) -> Self {
        cells.sort();
        cells.dedup();
        Self::from_sorted(cells)
    }

    /// Returns the number of cells in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the store contains no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn get(&self, idx: usize) -> Option<Cell> {
        self.cells.get(idx).cloned()
    }
}

/// Byte offset, length and restored sequence number of one cell slot.
#[derive(Copy, Clone, Debug)]
struct SlotHandle {
    offset: u32,
    len: u32,
    seqno: SeqNo,
}

/// Cell store backed by a contiguous big-endian byte region.
///
/// Each slot follows the interoperable wire layout (see [`Cell`]'s
/// [`Encode`] impl); the sequence number is not part of the wire layout and
/// lives in the offset index instead. Cells are materialized on access.
#[derive(Clone, Debug)]
pub struct EncodedStore {
    data: Slice,
    index: Arc<[SlotHandle]>,
}

impl EncodedStore {
    /// Packs cells already sorted ascending by [`CellComparator`] into a
    /// fresh byte region.
    #[must_use]
    pub fn encode(cells: &[Cell]) -> Self {
        debug_assert!(cells.is_sorted(), "cells must be sorted");

        let mut data = vec![];
        let mut index = Vec::with_capacity(cells.len());

        for cell in cells {
            #[expect(
                clippy::expect_used,
                reason = "encoding into a vec is not expected to fail"
            )]
            let offset = u32::try_from(data.len()).expect("region should stay below 4 GiB");

            #[expect(
                clippy::expect_used,
                reason = "encoding into a vec is not expected to fail"
            )]
            cell.encode_into(&mut data).expect("cannot fail");

            #[expect(
                clippy::expect_used,
                reason = "encoding into a vec is not expected to fail"
            )]
            let len = u32::try_from(data.len()).expect("region should stay below 4 GiB") - offset;

            index.push(SlotHandle {
                offset,
                len,
                seqno: cell.seqno,
            });
        }

        Self {
            data: data.into(),
            index: index.into(),
        }
    }

    /// Adopts an externally produced byte region.
    ///
    /// Walks and fully decodes every slot up front, so later accesses cannot
    /// fail. `includes_tags` states whether slots carry the optional tags
    /// section; the region itself cannot express that. Region cells carry no
    /// sequence number, so all of them restore as seqno 0.
    pub fn from_region(data: Slice, includes_tags: bool) -> crate::Result<Self> {
        let mut index = Vec::new();
        let mut pos: usize = 0;
        let mut prev: Option<Cell> = None;

        while pos < data.len() {
            let header = data
                .get(pos..pos + 8)
                .ok_or(DecodeError::InvalidHeader("cell slot header"))?;

            let mut reader = Cursor::new(header);
            let key_len = reader.read_u32::<BigEndian>().map_err(DecodeError::Io)? as usize;
            let value_len = reader.read_u32::<BigEndian>().map_err(DecodeError::Io)? as usize;

            let mut slot_len = 8 + key_len + value_len;

            if includes_tags {
                let tags_header = data
                    .get(pos + slot_len..pos + slot_len + 4)
                    .ok_or(DecodeError::InvalidHeader("cell tags header"))?;

                let mut reader = Cursor::new(tags_header);
                let tags_len = reader.read_u32::<BigEndian>().map_err(DecodeError::Io)? as usize;
                slot_len += 4 + tags_len;
            }

            let slot = data
                .get(pos..pos + slot_len)
                .ok_or(DecodeError::InvalidHeader("cell slot length"))?;

            let mut reader = slot;
            let cell = Cell::decode_from(&mut reader)?;

            if let Some(prev) = &prev {
                if CellComparator.compare(prev, &cell) == Ordering::Greater {
                    return Err(DecodeError::InvalidHeader("cell region is not sorted").into());
                }
            }

            index.push(SlotHandle {
                offset: u32::try_from(pos)
                    .map_err(|_| DecodeError::InvalidHeader("cell region too large"))?,
                len: u32::try_from(slot_len)
                    .map_err(|_| DecodeError::InvalidHeader("cell region too large"))?,
                seqno: 0,
            });

            prev = Some(cell);
            pos += slot_len;
        }

        Ok(Self {
            data,
            index: index.into(),
        })
    }

    /// Returns the number of cells in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the store contains no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn get(&self, idx: usize) -> Option<Cell> {
        let handle = self.index.get(idx)?;

        let start = handle.offset as usize;
        let end = start + handle.len as usize;

        // NOTE: Slots were validated when the store was built,
        // so decoding cannot fail here
        let mut reader = self.data.get(start..end)?;
        let mut cell = Cell::decode_from(&mut reader).ok()?;
        cell.seqno = handle.seqno;

        Some(cell)
    }
}
