//! Common InfiniBand types for subnet management.
//!
//! This crate provides type-safe representations of the primitives and the
//! decoded Subnet Management attributes consumed by the port model:
//!
//! - [`Guid`]: 64-bit globally unique identifiers (node, port, alias GUIDs)
//! - [`Lid`]: 16-bit local identifiers and LMC-derived ranges
//! - [`Mtu`], [`VlCap`]: link capabilities negotiated between partners
//! - [`LinkWidth`], [`LinkSpeed`]: active/enabled link rates
//! - [`PortState`], [`PhysPortState`]: logical and physical port states
//! - [`NodeType`], [`NodeInfo`]: node classification
//! - [`PKey`], [`PKeyBlock`]: partition keys
//! - attribute snapshots in [`attr`]: PortInfo, ExtendedPortInfo, GUIDInfo,
//!   SL-to-VL, VL-Arbitration, congestion control, VirtualizationInfo and
//!   VPortInfo.
//!
//! Everything here is already decoded to host order; wire encoding lives in
//! the MAD layer.

pub mod attr;
mod guid;
mod lid;
mod link;
mod node;
mod pkey;

pub use attr::{
    CaCongEntry, CaCongSetting, CcTableBlock, CcTableEntry, ExtPortInfo, GuidInfoBlock,
    PortInfo, SlVlTable, SwCongSetting, VPortInfo, VirtualizationInfo, VlArbBlock, VlArbEntry,
};
pub use guid::Guid;
pub use lid::{Lid, LidRange};
pub use link::{LinkSpeed, LinkWidth, Mtu, PhysPortState, PortState, VlCap};
pub use node::{NodeInfo, NodeType};
pub use pkey::{PKey, PKeyBlock};

/// Common error type for parsing and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid GUID format: {0}")]
    InvalidGuid(String),

    #[error("invalid LID: {0}")]
    InvalidLid(String),

    #[error("invalid MTU code: {0} (must be 1-5)")]
    InvalidMtu(u8),

    #[error("invalid VL capability code: {0} (must be 1-5)")]
    InvalidVlCap(u8),

    #[error("invalid port state: {0}")]
    InvalidPortState(u8),

    #[error("invalid physical port state: {0}")]
    InvalidPhysPortState(u8),

    #[error("invalid link width: {0:#x}")]
    InvalidLinkWidth(u8),

    #[error("invalid node type: {0}")]
    InvalidNodeType(String),

    #[error("invalid P_Key: {0}")]
    InvalidPKey(String),
}
