// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Immutable flat cell map and scan-merging core of a column-oriented
//! region store.
//!
//! ##### NOTE
//!
//! > This crate only provides the in-memory read path of a region store:
//! > the flattened cell map that backs an immutable write-buffer segment,
//! > and the heaps that merge many sorted cell sources into one scan.
//! > It does not ship a write-ahead log, a file format or an RPC layer.
//!
//! ##### About
//!
//! A [`Cell`] is a row/family/qualifier coordinate with a timestamp, a type
//! tag and a sequence number. The [`CellComparator`] orders cells by row,
//! family and qualifier ascending, then newest first (timestamp and seqno
//! descending) - scans therefore see the newest version of a column first.
//!
//! A [`FlatCellMap`] presents a contiguous slice of an immutable, sorted
//! [`CellStore`] as a navigable map. Because the store is flat and frozen,
//! submaps, head/tail maps and descending views are just new bounds over
//! shared storage; nothing is ever copied and no locks are needed.
//!
//! [`ForwardScanHeap`] and [`ReversedScanHeap`] merge any number of
//! [`CellScanner`]s (in-memory maps, file readers, other merges) into one
//! ordered stream; the reversed heap walks rows from the greatest to the
//! least while keeping the newest-first order inside each row.
//!
//! # Example usage
//!
//! ```
//! use cell_map::{ArrayStore, Cell, CellStore, CellType, FlatCellMap};
//! use std::sync::Arc;
//!
//! let cells = vec![
//!     Cell::new("row-1", "fam", "col", 2, CellType::Put, "v2", 2),
//!     Cell::new("row-1", "fam", "col", 1, CellType::Put, "v1", 1),
//!     Cell::new("row-2", "fam", "col", 1, CellType::Put, "v3", 3),
//! ];
//!
//! let store = Arc::new(CellStore::from(ArrayStore::from_sorted(cells)));
//! let map = FlatCellMap::new(store);
//!
//! assert_eq!(3, map.len());
//!
//! // the newest version of row-1 comes first
//! let first = map.first_key().expect("map is not empty");
//! assert_eq!(b"row-1", &*first.row);
//! assert_eq!(2, first.timestamp);
//!
//! // the descending view shares the same storage
//! let desc = map.descending_map();
//! let last = desc.first_key().expect("map is not empty");
//! assert_eq!(b"row-2", &*last.row);
//! ```

#![deny(clippy::all, missing_docs)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]

mod cell;
mod cell_type;

#[doc(hidden)]
pub mod coding;

mod comparator;
mod error;
mod flat_map;
mod heap;
mod scanner;
mod slice;
mod store;

pub use {
    cell::{Cell, SeqNo, Timestamp},
    cell_type::CellType,
    coding::{Decode, DecodeError, Encode, EncodeError},
    comparator::CellComparator,
    error::{Error, Result},
    flat_map::{Entry, FlatCellMap, Iter},
    heap::{ForwardScanHeap, ReversedScanHeap},
    scanner::{BoxedScanner, CellScanner, FlatMapScanner},
    slice::Slice,
    store::{ArrayStore, CellStore, EncodedStore},
};
