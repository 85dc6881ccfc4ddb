//! Link capability and state enumerations.
//!
//! These follow the PortInfo field encodings, so the negotiated values can
//! be compared directly with `Ord`.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum transfer unit code (PortInfo:MTUCap / NeighborMTU).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mtu {
    #[default]
    Mtu256 = 1,
    Mtu512 = 2,
    Mtu1024 = 3,
    Mtu2048 = 4,
    Mtu4096 = 5,
}

impl Mtu {
    /// Returns the wire code.
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Returns the MTU size in bytes.
    pub const fn bytes(&self) -> u32 {
        128 << (*self as u32)
    }
}

impl TryFrom<u8> for Mtu {
    type Error = ParseError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Mtu256),
            2 => Ok(Self::Mtu512),
            3 => Ok(Self::Mtu1024),
            4 => Ok(Self::Mtu2048),
            5 => Ok(Self::Mtu4096),
            other => Err(ParseError::InvalidMtu(other)),
        }
    }
}

impl fmt::Display for Mtu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

/// Virtual lane capability code (PortInfo:VLCap / OperationalVLs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum VlCap {
    /// VL0 only.
    #[default]
    Vl0 = 1,
    /// VL0 - VL1.
    Vl0To1 = 2,
    /// VL0 - VL3.
    Vl0To3 = 3,
    /// VL0 - VL7.
    Vl0To7 = 4,
    /// VL0 - VL14.
    Vl0To14 = 5,
}

impl VlCap {
    /// Returns the wire code.
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Number of data VLs this code enables.
    pub const fn data_vls(&self) -> u8 {
        match self {
            Self::Vl0 => 1,
            Self::Vl0To1 => 2,
            Self::Vl0To3 => 4,
            Self::Vl0To7 => 8,
            Self::Vl0To14 => 15,
        }
    }
}

impl TryFrom<u8> for VlCap {
    type Error = ParseError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Vl0),
            2 => Ok(Self::Vl0To1),
            3 => Ok(Self::Vl0To3),
            4 => Ok(Self::Vl0To7),
            5 => Ok(Self::Vl0To14),
            other => Err(ParseError::InvalidVlCap(other)),
        }
    }
}

impl fmt::Display for VlCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VL0-{}", self.data_vls() - 1)
    }
}

/// Link width, one bit per width in PortInfo:LinkWidth* masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LinkWidth {
    X1 = 0x01,
    X4 = 0x02,
    X8 = 0x04,
    X12 = 0x08,
    X2 = 0x10,
}

impl LinkWidth {
    const ALL: [LinkWidth; 5] = [Self::X1, Self::X2, Self::X4, Self::X8, Self::X12];

    /// Returns the mask bit for this width.
    pub const fn bit(&self) -> u8 {
        *self as u8
    }

    /// Number of physical lanes.
    pub const fn lanes(&self) -> u8 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X12 => 12,
        }
    }

    /// Decodes a single-bit active width value.
    pub fn from_bit(bit: u8) -> Result<Self, ParseError> {
        Self::ALL
            .into_iter()
            .find(|w| w.bit() == bit)
            .ok_or(ParseError::InvalidLinkWidth(bit))
    }

    /// Returns the widest width present in `mask`, if any.
    pub fn widest_in(mask: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .filter(|w| mask & w.bit() != 0)
            .max_by_key(|w| w.lanes())
    }
}

impl fmt::Display for LinkWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.lanes())
    }
}

/// Link speed, ordered by per-lane signalling rate.
///
/// SDR/DDR/QDR come from PortInfo:LinkSpeed*, FDR and above from
/// PortInfo:LinkSpeedExt*, and FDR10 from the vendor ExtendedPortInfo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkSpeed {
    Sdr,
    Ddr,
    Qdr,
    Fdr10,
    Fdr,
    Edr,
    Hdr,
    Ndr,
}

impl LinkSpeed {
    /// Speeds encoded in PortInfo:LinkSpeedEnabled/Active.
    pub fn from_base_mask(mask: u8) -> impl Iterator<Item = LinkSpeed> {
        [(0x1, Self::Sdr), (0x2, Self::Ddr), (0x4, Self::Qdr)]
            .into_iter()
            .filter(move |(bit, _)| mask & bit != 0)
            .map(|(_, speed)| speed)
    }

    /// Speeds encoded in PortInfo:LinkSpeedExtEnabled/Active.
    pub fn from_ext_mask(mask: u8) -> impl Iterator<Item = LinkSpeed> {
        [
            (0x1, Self::Fdr),
            (0x2, Self::Edr),
            (0x4, Self::Hdr),
            (0x8, Self::Ndr),
        ]
        .into_iter()
        .filter(move |(bit, _)| mask & bit != 0)
        .map(|(_, speed)| speed)
    }

    /// Per-lane data rate in Mb/s.
    pub const fn lane_rate_mbps(&self) -> u32 {
        match self {
            Self::Sdr => 2_500,
            Self::Ddr => 5_000,
            Self::Qdr => 10_000,
            Self::Fdr10 => 10_312,
            Self::Fdr => 14_062,
            Self::Edr => 25_781,
            Self::Hdr => 53_125,
            Self::Ndr => 106_250,
        }
    }
}

impl fmt::Display for LinkSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sdr => "SDR",
            Self::Ddr => "DDR",
            Self::Qdr => "QDR",
            Self::Fdr10 => "FDR10",
            Self::Fdr => "FDR",
            Self::Edr => "EDR",
            Self::Hdr => "HDR",
            Self::Ndr => "NDR",
        };
        write!(f, "{}", s)
    }
}

/// Logical port state (PortInfo:PortState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PortState {
    NoChange = 0,
    #[default]
    Down = 1,
    Init = 2,
    Armed = 3,
    Active = 4,
}

impl TryFrom<u8> for PortState {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoChange),
            1 => Ok(Self::Down),
            2 => Ok(Self::Init),
            3 => Ok(Self::Armed),
            4 => Ok(Self::Active),
            other => Err(ParseError::InvalidPortState(other)),
        }
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoChange => "NOP",
            Self::Down => "DOWN",
            Self::Init => "INIT",
            Self::Armed => "ARMED",
            Self::Active => "ACTIVE",
        };
        write!(f, "{}", s)
    }
}

/// Physical port state (PortInfo:PortPhysicalState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PhysPortState {
    NoChange = 0,
    Sleep = 1,
    #[default]
    Polling = 2,
    Disabled = 3,
    PortConfigurationTraining = 4,
    LinkUp = 5,
    LinkErrorRecovery = 6,
    PhyTest = 7,
}

impl TryFrom<u8> for PhysPortState {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoChange),
            1 => Ok(Self::Sleep),
            2 => Ok(Self::Polling),
            3 => Ok(Self::Disabled),
            4 => Ok(Self::PortConfigurationTraining),
            5 => Ok(Self::LinkUp),
            6 => Ok(Self::LinkErrorRecovery),
            7 => Ok(Self::PhyTest),
            other => Err(ParseError::InvalidPhysPortState(other)),
        }
    }
}
