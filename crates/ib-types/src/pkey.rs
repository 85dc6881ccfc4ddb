//! Partition key types.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 16-bit partition key in host order.
///
/// The top bit is the membership type (1 = full, 0 = limited); the low 15
/// bits are the partition number ("base").
///
/// # Examples
///
/// ```
/// use ib_types::PKey;
///
/// let full = PKey::new(0xffff);
/// assert!(full.is_full_member());
/// assert_eq!(full.base(), 0x7fff);
/// assert!(full.same_partition(PKey::new(0x7fff)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PKey(u16);

impl PKey {
    /// Membership bit.
    pub const FULL_MEMBER_BIT: u16 = 0x8000;

    /// The default partition, full membership.
    pub const DEFAULT: PKey = PKey(0xffff);

    /// The invalid (empty) P_Key entry.
    pub const INVALID: PKey = PKey(0);

    /// Creates a P_Key from its host-order value.
    pub const fn new(value: u16) -> Self {
        PKey(value)
    }

    /// Returns the host-order value.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the partition number without the membership bit.
    pub const fn base(&self) -> u16 {
        self.0 & !Self::FULL_MEMBER_BIT
    }

    /// Returns true for full membership.
    pub const fn is_full_member(&self) -> bool {
        self.0 & Self::FULL_MEMBER_BIT != 0
    }

    /// Returns true if the entry is empty (partition number 0).
    pub const fn is_invalid(&self) -> bool {
        self.base() == 0
    }

    /// Returns true if both keys name the same partition, ignoring
    /// membership.
    pub const fn same_partition(&self, other: PKey) -> bool {
        self.base() == other.base()
    }
}

impl fmt::Display for PKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl FromStr for PKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hex = s.strip_prefix("0x").unwrap_or(s);
        u16::from_str_radix(hex, 16)
            .map(PKey)
            .map_err(|_| ParseError::InvalidPKey(s.to_string()))
    }
}

/// One 32-entry block of a P_Key table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PKeyBlock {
    pub entries: [PKey; PKeyBlock::ENTRIES],
}

impl PKeyBlock {
    /// Entries per block.
    pub const ENTRIES: usize = 32;

    /// Highest block number addressable by the architecture.
    pub const MAX_BLOCKS: u16 = 2048;

    /// Builds a block from up to 32 keys; the remainder stays empty.
    pub fn from_keys(keys: &[PKey]) -> Self {
        let mut block = Self::default();
        for (slot, key) in block.entries.iter_mut().zip(keys) {
            *slot = *key;
        }
        block
    }

    /// Iterates the non-empty entries.
    pub fn valid_keys(&self) -> impl Iterator<Item = PKey> + '_ {
        self.entries.iter().copied().filter(|k| !k.is_invalid())
    }
}
