//! Local identifier (LID) types.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 16-bit InfiniBand local identifier in host order.
///
/// LID 0 is reserved and means "no LID assigned". Unicast LIDs occupy
/// `0x0001..=0xBFFF`, multicast LIDs `0xC000..=0xFFFE`, and `0xFFFF` is the
/// permissive LID.
///
/// # Examples
///
/// ```
/// use ib_types::Lid;
///
/// let lid = Lid::new(0x10);
/// assert!(lid.is_unicast());
///
/// let range = lid.range(2);
/// assert_eq!(range.min(), Lid::new(0x10));
/// assert_eq!(range.max(), Lid::new(0x13));
/// assert_eq!(range.len(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lid(u16);

impl Lid {
    /// No LID assigned.
    pub const UNASSIGNED: Lid = Lid(0);

    /// Highest unicast LID.
    pub const UNICAST_MAX: u16 = 0xBFFF;

    /// Lowest multicast LID.
    pub const MULTICAST_MIN: u16 = 0xC000;

    /// Highest multicast LID.
    pub const MULTICAST_MAX: u16 = 0xFFFE;

    /// The permissive LID.
    pub const PERMISSIVE: Lid = Lid(0xFFFF);

    /// Largest LMC value allowed by the architecture.
    pub const MAX_LMC: u8 = 7;

    /// Creates a LID from its host-order value.
    pub const fn new(value: u16) -> Self {
        Lid(value)
    }

    /// Returns the host-order value.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true if no LID is assigned.
    pub const fn is_unassigned(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if this is a unicast LID.
    pub const fn is_unicast(&self) -> bool {
        self.0 >= 1 && self.0 <= Self::UNICAST_MAX
    }

    /// Returns true if this is a multicast LID.
    pub const fn is_multicast(&self) -> bool {
        self.0 >= Self::MULTICAST_MIN && self.0 <= Self::MULTICAST_MAX
    }

    /// Returns the contiguous range `[self, self + 2^lmc - 1]` covered by
    /// this base LID.
    ///
    /// LMC values above [`Lid::MAX_LMC`] are clamped. The upper bound
    /// saturates at `0xFFFF` rather than wrapping.
    pub const fn range(&self, lmc: u8) -> LidRange {
        let lmc = if lmc > Self::MAX_LMC { Self::MAX_LMC } else { lmc };
        let span = (1u16 << lmc) - 1;
        LidRange {
            min: *self,
            max: Lid(self.0.saturating_add(span)),
        }
    }
}

impl fmt::Display for Lid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Lid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x") {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => s.parse::<u16>(),
        };
        parsed.map(Lid).map_err(|_| ParseError::InvalidLid(s.to_string()))
    }
}

impl From<u16> for Lid {
    fn from(value: u16) -> Self {
        Lid(value)
    }
}

impl From<Lid> for u16 {
    fn from(lid: Lid) -> u16 {
        lid.0
    }
}

/// An inclusive range of LIDs owned by one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LidRange {
    min: Lid,
    max: Lid,
}

impl LidRange {
    /// Lowest LID in the range (the base LID).
    pub const fn min(&self) -> Lid {
        self.min
    }

    /// Highest LID in the range.
    pub const fn max(&self) -> Lid {
        self.max
    }

    /// Number of LIDs in the range.
    pub const fn len(&self) -> u32 {
        (self.max.0 as u32) - (self.min.0 as u32) + 1
    }

    /// Always false; a range holds at least its base LID.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if `lid` falls inside the range.
    pub const fn contains(&self, lid: Lid) -> bool {
        lid.0 >= self.min.0 && lid.0 <= self.max.0
    }
}

impl fmt::Display for LidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}
