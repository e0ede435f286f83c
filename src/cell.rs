// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use crate::comparator::CellComparator;
use crate::{CellType, Slice};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Sequence number - a monotonically increasing counter
///
/// A cell with a higher sequence number was written later than a cell
/// with the same coordinate and a lower sequence number.
pub type SeqNo = u64;

/// Cell timestamp in milliseconds
pub type Timestamp = i64;

/// Fixed key overhead: row length field (2), family length field (1),
/// timestamp (8) and type tag (1).
const KEY_FIXED_OVERHEAD: usize = 2 + 1 + 8 + 1;

/// An immutable row/family/qualifier coordinate plus payload.
///
/// A cell is logically a key-value pair where both the key and the value
/// refer to the same underlying tuple. Equality and ordering are defined
/// over the coordinate (row, family, qualifier, timestamp, type, seqno);
/// the value bytes do not participate.
#[derive(Clone, Eq)]
pub struct Cell {
    /// Row key
    pub row: Slice,

    /// Column family
    pub family: Slice,

    /// Column qualifier
    pub qualifier: Slice,

    /// Version timestamp; newer timestamps sort first within a column
    pub timestamp: Timestamp,

    /// Type tag
    pub cell_type: CellType,

    /// User-defined value - an arbitrary byte array
    pub value: Slice,

    /// Optional tag bytes
    pub tags: Option<Slice>,

    /// Sequence number; newer cells sort first at an equal coordinate
    pub seqno: SeqNo,
}

impl Cell {
    /// Creates a new [`Cell`].
    ///
    /// # Panics
    ///
    /// Panics if the row is empty or longer than 2^16 bytes, the family is
    /// longer than 255 bytes, or the value is longer than 2^32 bytes.
    pub fn new<R: Into<Slice>, F: Into<Slice>, Q: Into<Slice>, V: Into<Slice>>(
        row: R,
        family: F,
        qualifier: Q,
        timestamp: Timestamp,
        cell_type: CellType,
        value: V,
        seqno: SeqNo,
    ) -> Self {
        let row = row.into();
        let family = family.into();
        let qualifier = qualifier.into();
        let value = value.into();

        assert!(!row.is_empty(), "row may not be empty");
        assert!(
            u16::try_from(row.len()).is_ok(),
            "rows can be 65535 bytes in length",
        );
        assert!(
            u8::try_from(family.len()).is_ok(),
            "families can be 255 bytes in length",
        );
        assert!(
            u32::try_from(value.len()).is_ok(),
            "values can be 2^32 bytes in length",
        );
        assert!(
            u32::try_from(KEY_FIXED_OVERHEAD + row.len() + family.len() + qualifier.len()).is_ok(),
            "cell key must fit a 32-bit length",
        );

        Self {
            row,
            family,
            qualifier,
            timestamp,
            cell_type,
            value,
            tags: None,
            seqno,
        }
    }

    /// Attaches tag bytes to the cell.
    #[must_use]
    pub fn with_tags<T: Into<Slice>>(mut self, tags: T) -> Self {
        self.tags = Some(tags.into());
        self
    }

    /// Creates the minimal synthetic cell of the given row.
    ///
    /// The result sorts at or before every real cell of `row`, which makes it
    /// the canonical anchor for row-granular seeks and sub-ranges.
    #[must_use]
    pub fn first_on_row<R: Into<Slice>>(row: R) -> Self {
        Self::new(
            row,
            Slice::empty(),
            Slice::empty(),
            Timestamp::MAX,
            CellType::Put,
            Slice::empty(),
            SeqNo::MAX,
        )
    }

    /// Length of the serialized key section.
    fn key_len(&self) -> usize {
        KEY_FIXED_OVERHEAD + self.row.len() + self.family.len() + self.qualifier.len()
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.row == other.row
            && self.family == other.family
            && self.qualifier == other.qualifier
            && self.timestamp == other.timestamp
            && self.cell_type == other.cell_type
            && self.seqno == other.seqno
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Order by row, then family, then qualifier, then by timestamp and
// sequence number in reverse (newest first).
// This is one of the most important functions in the crate;
// otherwise scans will not match expected behaviour.
impl Ord for Cell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        CellComparator.compare(self, other)
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}/{:?}:{:?}/{}/{:?}/{}",
            self.row, self.family, self.qualifier, self.timestamp, self.cell_type, self.seqno,
        )
    }
}

impl Encode for Cell {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        #[expect(
            clippy::expect_used,
            reason = "lengths are bounds-checked on construction"
        )]
        let key_len = u32::try_from(self.key_len()).expect("key should fit");
        #[expect(
            clippy::expect_used,
            reason = "lengths are bounds-checked on construction"
        )]
        let value_len = u32::try_from(self.value.len()).expect("value should fit");

        writer.write_u32::<BigEndian>(key_len)?;
        writer.write_u32::<BigEndian>(value_len)?;

        #[expect(
            clippy::expect_used,
            reason = "lengths are bounds-checked on construction"
        )]
        {
            writer.write_u16::<BigEndian>(
                self.row.len().try_into().expect("row should fit"),
            )?;
            writer.write_all(&self.row)?;
            writer.write_u8(self.family.len().try_into().expect("family should fit"))?;
        }
        writer.write_all(&self.family)?;
        writer.write_all(&self.qualifier)?;
        writer.write_i64::<BigEndian>(self.timestamp)?;
        writer.write_u8(self.cell_type.into())?;
        writer.write_all(&self.value)?;

        if let Some(tags) = &self.tags {
            #[expect(clippy::expect_used, reason = "tags are user-provided byte slices")]
            writer.write_u32::<BigEndian>(tags.len().try_into().expect("tags should fit"))?;
            writer.write_all(tags)?;
        }

        Ok(())
    }
}

impl Decode for Cell {
    /// Deserializes one cell slot.
    ///
    /// The reader is expected to span exactly one slot; a clean end of input
    /// after the value section means the optional tags section is absent.
    /// The sequence number is not part of the wire layout and is restored by
    /// the surrounding store.
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let key_len = reader.read_u32::<BigEndian>()? as usize;
        let value_len = reader.read_u32::<BigEndian>()? as usize;

        let row_len = reader.read_u16::<BigEndian>()? as usize;
        let mut row = vec![0; row_len];
        reader.read_exact(&mut row)?;

        let family_len = reader.read_u8()? as usize;
        let mut family = vec![0; family_len];
        reader.read_exact(&mut family)?;

        let qualifier_len = key_len
            .checked_sub(KEY_FIXED_OVERHEAD + row_len + family_len)
            .ok_or(DecodeError::InvalidHeader("cell key length"))?;
        let mut qualifier = vec![0; qualifier_len];
        reader.read_exact(&mut qualifier)?;

        let timestamp = reader.read_i64::<BigEndian>()?;
        let cell_type = CellType::try_from(reader.read_u8()?)?;

        let mut value = vec![0; value_len];
        reader.read_exact(&mut value)?;

        let tags = match read_optional_tags_len(reader)? {
            Some(tags_len) => {
                let mut tags = vec![0; tags_len];
                reader.read_exact(&mut tags)?;
                Some(Slice::from(tags))
            }
            None => None,
        };

        if row.is_empty() {
            return Err(DecodeError::InvalidHeader("cell row length"));
        }

        Ok(Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            cell_type,
            value: value.into(),
            tags,
            seqno: 0,
        })
    }
}

/// Reads the 4-byte tags length, distinguishing a cleanly absent tags section
/// (0 trailing bytes) from a truncated one (1-3 trailing bytes).
fn read_optional_tags_len<R: Read>(reader: &mut R) -> Result<Option<usize>, DecodeError> {
    let mut buf = [0u8; 4];
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }

    match filled {
        0 => Ok(None),
        4 => Ok(Some(u32::from_be_bytes(buf) as usize)),
        _ => Err(DecodeError::InvalidHeader("cell tags length")),
    }
}
