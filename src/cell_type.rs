// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::DecodeError;

/// Cell type tag (regular value or one of the delete marker flavours)
///
/// The declaration order is the comparator order: at an otherwise equal
/// coordinate, a `Put` sorts before the delete markers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum CellType {
    /// Existing value
    Put,

    /// Deletes a single version of a column
    Delete,

    /// Deletes all versions of a column
    DeleteColumn,

    /// Deletes all columns of a family
    DeleteFamily,

    /// Deletes a single version in all columns of a family
    DeleteFamilyVersion,
}

impl CellType {
    /// Returns `true` if the type is a delete marker of any flavour.
    #[must_use]
    pub fn is_delete(self) -> bool {
        self != Self::Put
    }
}

impl TryFrom<u8> for CellType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::Put),
            8 => Ok(Self::Delete),
            10 => Ok(Self::DeleteFamilyVersion),
            12 => Ok(Self::DeleteColumn),
            14 => Ok(Self::DeleteFamily),
            _ => Err(DecodeError::InvalidTag(("CellType", value))),
        }
    }
}

impl From<CellType> for u8 {
    fn from(value: CellType) -> Self {
        match value {
            CellType::Put => 4,
            CellType::Delete => 8,
            CellType::DeleteFamilyVersion => 10,
            CellType::DeleteColumn => 12,
            CellType::DeleteFamily => 14,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CellType;
    use test_log::test;

    #[test]
    fn cell_type_roundtrip() {
        for t in [
            CellType::Put,
            CellType::Delete,
            CellType::DeleteFamilyVersion,
            CellType::DeleteColumn,
            CellType::DeleteFamily,
        ] {
            let byte = u8::from(t);
            assert_eq!(t, CellType::try_from(byte).expect("should parse"));
        }
    }

    #[test]
    fn cell_type_invalid_tag() {
        assert!(CellType::try_from(0).is_err());
        assert!(CellType::try_from(255).is_err());
    }

    #[test]
    fn cell_type_order() {
        assert!(CellType::Put < CellType::Delete);
        assert!(CellType::Delete < CellType::DeleteColumn);
        assert!(CellType::DeleteColumn < CellType::DeleteFamily);
        assert!(CellType::DeleteFamily < CellType::DeleteFamilyVersion);
    }
}
