//! Logical ports.
//!
//! A [`LogicalPort`] is the addressable end point behind a port GUID: one
//! per CA or router port, and a single one for a switch (its management
//! port 0). It carries the per-sweep discovery bookkeeping and the
//! embedded virtualization state.

use crate::arena::{NodeId, PhysPortId};
use crate::mcast::McastMembership;
use crate::virt::VirtualizationData;
use ib_types::{Guid, Lid, LidRange, NodeInfo};
use serde::{Deserialize, Serialize};

/// How the port was reached during the current sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryThrough {
    #[default]
    Normal,
    /// Only through ports the routing engine ignores.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct LogicalPort {
    guid: Guid,
    node: NodeId,
    physp: PhysPortId,
    pub discovery_count: u32,
    pub is_new: bool,
    pub disc_through: DiscoveryThrough,
    pub client_rereg: bool,
    lid: Lid,
    mcast_memberships: Vec<McastMembership>,
    topologies: Vec<u64>,
    /// Scratch marker for sweep algorithms.
    pub flag: i32,
    pub use_scatter: bool,
    pub cc_timeout_count: u32,
    pub cc_unavailable: bool,
    virt: VirtualizationData,
}

impl LogicalPort {
    /// Creates the logical port for the port GUID in `node_info`, backed
    /// by physical port `physp` of `node`.
    pub fn new(node_info: &NodeInfo, node: NodeId, physp: PhysPortId) -> Self {
        Self {
            guid: node_info.port_guid,
            node,
            physp,
            discovery_count: 0,
            is_new: true,
            disc_through: DiscoveryThrough::Normal,
            client_rereg: false,
            lid: Lid::UNASSIGNED,
            mcast_memberships: Vec::new(),
            topologies: Vec::new(),
            flag: 0,
            use_scatter: false,
            cc_timeout_count: 0,
            cc_unavailable: false,
            virt: VirtualizationData::new(),
        }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn is_valid(&self) -> bool {
        !self.guid.is_zero()
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Representative physical port.
    pub fn physp(&self) -> PhysPortId {
        self.physp
    }

    /// Cached base LID.
    pub fn lid(&self) -> Lid {
        self.lid
    }

    pub(crate) fn set_lid(&mut self, lid: Lid) {
        self.lid = lid;
    }

    /// LIDs covered by `base_lid` under `lmc`.
    pub fn lid_range(base_lid: Lid, lmc: u8) -> LidRange {
        base_lid.range(lmc)
    }

    /// Reached only through ignored ports this sweep.
    pub fn is_isolated(&self) -> bool {
        self.disc_through == DiscoveryThrough::Ignored
    }

    pub(crate) fn reset_discovery(&mut self) {
        self.discovery_count = 0;
        self.disc_through = DiscoveryThrough::Normal;
        self.is_new = false;
    }

    pub fn mcast_memberships(&self) -> &[McastMembership] {
        &self.mcast_memberships
    }

    /// Records a join, merging the join state if the GUID is already a
    /// member of that group.
    pub fn add_mcast_membership(&mut self, membership: McastMembership) {
        match self
            .mcast_memberships
            .iter_mut()
            .find(|m| m.mlid == membership.mlid && m.guid == membership.guid)
        {
            Some(existing) => existing.join_state |= membership.join_state,
            None => self.mcast_memberships.push(membership),
        }
    }

    /// Removes the membership of `guid` in group `mlid`.
    pub fn remove_mcast_membership(&mut self, mlid: Lid, guid: Guid) -> bool {
        let before = self.mcast_memberships.len();
        self.mcast_memberships
            .retain(|m| !(m.mlid == mlid && m.guid == guid));
        self.mcast_memberships.len() != before
    }

    pub(crate) fn take_mcast_memberships(&mut self) -> Vec<McastMembership> {
        std::mem::take(&mut self.mcast_memberships)
    }

    /// Removes and returns every membership held under `guid`.
    pub(crate) fn take_mcast_memberships_of(&mut self, guid: Guid) -> Vec<McastMembership> {
        let (taken, kept) = std::mem::take(&mut self.mcast_memberships)
            .into_iter()
            .partition(|m| m.guid == guid);
        self.mcast_memberships = kept;
        taken
    }

    /// Topology ids this port is subscribed to.
    pub fn topologies(&self) -> &[u64] {
        &self.topologies
    }

    pub fn add_topology(&mut self, topo_id: u64) {
        if !self.topologies.contains(&topo_id) {
            self.topologies.push(topo_id);
        }
    }

    pub fn remove_topology(&mut self, topo_id: u64) {
        self.topologies.retain(|t| *t != topo_id);
    }

    pub fn virt(&self) -> &VirtualizationData {
        &self.virt
    }

    pub fn virt_mut(&mut self) -> &mut VirtualizationData {
        &mut self.virt
    }
}
