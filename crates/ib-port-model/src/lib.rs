//! InfiniBand subnet manager port model.
//!
//! In-memory representation of the physical ports, logical ports, links,
//! alias GUIDs and virtual ports discovered on a managed fabric, plus the
//! per-sweep bookkeeping the discovery engine relies on.
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------- Subnet --------------------------------+
//! |  Arena<NodeId, Node>       Arena<PhysPortId, PhysicalPort>             |
//! |  BTreeMap<Guid, LogicalPort>  (each embeds VirtualizationData/VPorts)  |
//! |  BTreeMap<Guid, AliasGuid>    BTreeMap<Lid, MulticastGroup>            |
//! +------------------------------------------------------------------------+
//!            ^ every mutation goes through &mut Subnet
//!            |
//!     external sweep engine (MAD transport, routing: not in this crate)
//! ```
//!
//! Links between physical ports are stored as [`PhysPortId`] handles and
//! are written only by [`Subnet::link`] and [`Subnet::unlink`], so both
//! directions always agree.
//!
//! No component performs I/O; callers feed already decoded attributes from
//! [`ib_types`].

pub mod alias_guid;
pub mod arena;
pub mod audit;
pub mod config;
pub mod congestion;
pub mod dr_path;
pub mod error;
pub mod mcast;
pub mod node;
pub mod physp;
pub mod port;
pub mod subnet;
pub mod tables;
pub mod virt;
pub mod vport;

pub use alias_guid::{AliasGuid, AGUID_MAX_DESC};
pub use arena::{Arena, ArenaId, NodeId, PhysPortId};
pub use config::{ConfigError, SubnetOptions};
pub use congestion::{CongestionSettings, CCT_ENTRY_MAD_BLOCKS};
pub use dr_path::{BindHandle, DrPath, MAX_HOPS};
pub use error::{PortModelError, Result};
pub use mcast::{McastMember, McastMembership, MulticastGroup};
pub use node::{Node, NODE_DESCRIPTION_SIZE};
pub use physp::{PhysicalPort, PortResetType, TIMESTAMP_STR_LEN};
pub use port::{DiscoveryThrough, LogicalPort};
pub use subnet::Subnet;
pub use tables::{PKeyTable, QosConfigSl, QosSlEntry, SlVlTables, VlArbTables};
pub use virt::{VirtualizationData, VPORTS_BLOCK_SIZE};
pub use vport::{VPort, VPortInfoContext};
