//! GUID type with safe parsing and formatting.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 64-bit InfiniBand GUID (node, port, system image or alias GUID).
///
/// A zero GUID is used throughout the model as the "not yet discovered"
/// sentinel.
///
/// # Examples
///
/// ```
/// use ib_types::Guid;
///
/// let guid: Guid = "0x0002c90300a1b2c3".parse().unwrap();
/// assert_eq!(guid.to_string(), "0x0002c90300a1b2c3");
///
/// // Colon-separated form as printed by ibstat is accepted too
/// let guid2: Guid = "0002:c903:00a1:b2c3".parse().unwrap();
/// assert_eq!(guid, guid2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Guid(u64);

impl Guid {
    /// The zero GUID, meaning "unknown".
    pub const ZERO: Guid = Guid(0);

    /// Creates a GUID from its host-order value.
    pub const fn new(value: u64) -> Self {
        Guid(value)
    }

    /// Returns the host-order value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns true if this is the zero GUID.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the 24-bit IEEE OUI (vendor) portion.
    pub const fn vendor_oui(&self) -> u32 {
        (self.0 >> 40) as u32
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl FromStr for Guid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed)
            .replace(':', "");

        if digits.is_empty() || digits.len() > 16 {
            return Err(ParseError::InvalidGuid(s.to_string()));
        }

        u64::from_str_radix(&digits, 16)
            .map(Guid)
            .map_err(|_| ParseError::InvalidGuid(s.to_string()))
    }
}

impl TryFrom<String> for Guid {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Guid> for String {
    fn from(guid: Guid) -> String {
        guid.to_string()
    }
}

impl From<u64> for Guid {
    fn from(value: u64) -> Self {
        Guid(value)
    }
}

impl From<Guid> for u64 {
    fn from(guid: Guid) -> u64 {
        guid.0
    }
}
