//! The subnet: owner of every node, physical port, logical port, alias
//! GUID and multicast group.
//!
//! Everything is addressed by stable handles ([`NodeId`], [`PhysPortId`])
//! or by GUID/MLID, and every mutation goes through `&mut Subnet`, so a
//! single sweep actor owns the whole graph. Link partner references are
//! only ever written by [`Subnet::link`] and [`Subnet::unlink`].

use crate::alias_guid::AliasGuid;
use crate::arena::{Arena, NodeId, PhysPortId};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::config::SubnetOptions;
use crate::dr_path::DrPath;
use crate::error::{PortModelError, Result};
use crate::mcast::{McastMember, McastMembership, MulticastGroup};
use crate::node::Node;
use crate::physp::PhysicalPort;
use crate::port::LogicalPort;
use crate::tables::PKeyTable;
use crate::vport::{VPort, VPortInfoContext};
use crate::{audit_log, debug_log, error_log, info_log, warn_log};
use ib_types::{
    Guid, Lid, LidRange, Mtu, NodeInfo, NodeType, PKey, PKeyBlock, PortInfo, VPortInfo,
    VirtualizationInfo, VlCap,
};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Default)]
pub struct Subnet {
    options: SubnetOptions,
    nodes: Arena<NodeId, Node>,
    physps: Arena<PhysPortId, PhysicalPort>,
    ports: BTreeMap<Guid, LogicalPort>,
    alias_guids: BTreeMap<Guid, AliasGuid>,
    mgrps: BTreeMap<Lid, MulticastGroup>,
    virt_queue: VecDeque<Guid>,
    sweep_id: u64,
}

impl Subnet {
    pub fn new(options: SubnetOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &SubnetOptions {
        &self.options
    }

    /// Replaces the policy options after validating them. Ports already
    /// initialized keep their hop weight.
    pub fn set_options(&mut self, options: SubnetOptions) -> Result<()> {
        options.validate()?;
        let old = std::mem::replace(&mut self.options, options);

        audit_log!(AuditRecord::new(
            AuditCategory::ConfigurationChange,
            "Subnet",
            "set_options",
        )
        .with_outcome(AuditOutcome::Success)
        .with_object_type("subnet_options")
        .with_sweep(self.sweep_id)
        .with_details(serde_json::json!({
            "old": old,
            "new": &self.options,
        })));
        Ok(())
    }

    pub fn sweep_id(&self) -> u64 {
        self.sweep_id
    }

    /// Begins a new discovery sweep: bumps the sweep id and resets the
    /// per-sweep discovery bookkeeping on nodes and logical ports.
    pub fn start_sweep(&mut self) -> u64 {
        self.sweep_id += 1;
        for id in self.nodes.ids() {
            if let Some(node) = self.nodes.get_mut(id) {
                node.reset_discovery_count();
            }
        }
        for port in self.ports.values_mut() {
            port.reset_discovery();
        }
        info_log!(
            "Subnet",
            sweep_id = self.sweep_id,
            nodes = self.nodes.len(),
            ports = self.ports.len(),
            "Sweep started"
        );
        self.sweep_id
    }

    // ---- nodes ---------------------------------------------------------

    pub fn add_node(&mut self, node_info: NodeInfo) -> NodeId {
        let node_guid = node_info.node_guid;
        let node_type = node_info.node_type;
        let id = self.nodes.insert(Node::new(node_info));
        debug_log!(
            "Subnet",
            node = %id,
            node_guid = %node_guid,
            node_type = %node_type,
            "Node added"
        );
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter()
    }

    fn node_ref(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(PortModelError::NodeNotFound(id))
    }

    /// Removes a node with its logical ports and physical ports, unlinking
    /// every link it takes part in.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.node_ref(id)?;
        let node_guid = node.node_guid();
        let physp_ids: Vec<PhysPortId> = node.physps().map(|(_, physp)| physp).collect();

        let port_guids: Vec<Guid> = self
            .ports
            .values()
            .filter(|port| port.node() == id)
            .map(LogicalPort::guid)
            .collect();
        for guid in port_guids {
            self.delete_port(guid)?;
        }

        for physp_id in &physp_ids {
            self.detach(*physp_id);
            if let Some(mut physp) = self.physps.remove(*physp_id) {
                physp.destroy();
            }
        }
        self.nodes.remove(id);

        audit_log!(AuditRecord::new(
            AuditCategory::TopologyChange,
            "Subnet",
            "remove_node",
        )
        .with_outcome(AuditOutcome::Success)
        .with_object_id(node_guid.to_string())
        .with_object_type("node")
        .with_sweep(self.sweep_id)
        .with_details(serde_json::json!({
            "physical_ports": physp_ids.len(),
        })));

        Ok(())
    }

    // ---- physical ports ------------------------------------------------

    /// Creates and registers physical port `port_num` of `node`.
    pub fn add_physp(
        &mut self,
        node: NodeId,
        port_num: u8,
        port_guid: Guid,
        dr_path: DrPath,
    ) -> Result<PhysPortId> {
        let owner = self.node_ref(node)?;
        if port_num > owner.num_ports() {
            return Err(PortModelError::InvalidPortNumber {
                port_num,
                num_ports: owner.num_ports(),
            });
        }
        if owner.physp(port_num).is_some() {
            return Err(PortModelError::PhysPortExists { node, port_num });
        }

        let mut physp = PhysicalPort::construct();
        physp.init(port_guid, port_num, node, owner.node_info(), dr_path);
        physp.set_hop_wf(self.options.hop_weight_default);

        let id = self.physps.insert(physp);
        if let Some(owner) = self.nodes.get_mut(node) {
            owner.set_physp(port_num, Some(id));
        }
        debug_log!(
            "Subnet",
            node = %node,
            port_num,
            port_guid = %port_guid,
            physp = %id,
            "Physical port added"
        );
        Ok(id)
    }

    pub fn physp(&self, id: PhysPortId) -> Option<&PhysicalPort> {
        self.physps.get(id)
    }

    /// Mutable access to a physical port. Link partners and the port's
    /// lifecycle stay with the subnet:
    ///
    /// ```compile_fail
    /// use ib_port_model::{PhysPortId, Subnet};
    ///
    /// fn reset(subnet: &mut Subnet, id: PhysPortId) {
    ///     if let Some(physp) = subnet.physp_mut(id) {
    ///         physp.destroy();
    ///     }
    /// }
    /// ```
    pub fn physp_mut(&mut self, id: PhysPortId) -> Option<&mut PhysicalPort> {
        self.physps.get_mut(id)
    }

    pub fn physps(&self) -> impl Iterator<Item = (PhysPortId, &PhysicalPort)> + '_ {
        self.physps.iter()
    }

    /// Handle of physical port `port_num` of `node`.
    pub fn physp_at(&self, node: NodeId, port_num: u8) -> Result<PhysPortId> {
        self.node_ref(node)?
            .physp(port_num)
            .ok_or(PortModelError::PortNumberNotPopulated { node, port_num })
    }

    fn physp_ref(&self, id: PhysPortId) -> Result<&PhysicalPort> {
        self.physps.get(id).ok_or(PortModelError::PhysPortNotFound(id))
    }

    fn physp_ref_mut(&mut self, id: PhysPortId) -> Result<&mut PhysicalPort> {
        self.physps
            .get_mut(id)
            .ok_or(PortModelError::PhysPortNotFound(id))
    }

    /// Applies a received PortInfo to a physical port.
    pub fn set_port_info(&mut self, id: PhysPortId, pi: &PortInfo, force_timestamp: bool) -> Result<()> {
        let physp = self
            .physps
            .get_mut(id)
            .ok_or(PortModelError::PhysPortNotFound(id))?;
        physp.set_port_info(pi, &self.options, force_timestamp);
        Ok(())
    }

    /// Stores a P_Key block, bounded by the owning node's PartitionCap.
    pub fn set_pkey_tbl(
        &mut self,
        id: PhysPortId,
        block_num: u16,
        block: &PKeyBlock,
        is_set: bool,
    ) -> Result<()> {
        let node = self
            .physp_ref(id)?
            .node()
            .ok_or(PortModelError::PhysPortNotFound(id))?;
        let partition_cap = self.node_ref(node)?.partition_cap();
        self.physp_ref_mut(id)?
            .set_pkey_tbl(partition_cap, block_num, block, is_set)
    }

    // ---- links ---------------------------------------------------------

    /// Links two physical ports, replacing any other link either one had.
    pub fn link(&mut self, a: PhysPortId, b: PhysPortId) -> Result<()> {
        if a == b {
            return Err(PortModelError::Link(format!("cannot link {} to itself", a)));
        }
        self.physp_ref(a)?;
        self.physp_ref(b)?;
        if self.link_exists(a, b) {
            return Ok(());
        }

        for (port, other) in [(a, b), (b, a)] {
            if let Some(old) = self.remote(port).filter(|old| *old != other) {
                warn_log!(
                    "Subnet",
                    physp = %port,
                    old_remote = %old,
                    new_remote = %other,
                    "Replacing existing link"
                );
                self.detach(port);
            }
        }

        let (pa, pb) = self
            .physps
            .get_pair_mut(a, b)
            .ok_or_else(|| PortModelError::Link(format!("cannot borrow {} and {}", a, b)))?;
        pa.remote = Some(b);
        pb.remote = Some(a);
        let (guid_a, num_a, guid_b, num_b) =
            (pa.port_guid(), pa.port_num(), pb.port_guid(), pb.port_num());

        audit_log!(AuditRecord::new(AuditCategory::LinkChange, "Subnet", "link")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(format!("{}:{}-{}:{}", guid_a, num_a, guid_b, num_b))
            .with_object_type("link")
            .with_sweep(self.sweep_id));

        Ok(())
    }

    /// Breaks the link between `a` and `b`.
    ///
    /// The link must exist; the partners are remembered as previous remotes.
    pub fn unlink(&mut self, a: PhysPortId, b: PhysPortId) {
        let exists = self.link_exists(a, b);
        debug_assert!(exists, "unlink of non-existent link {} - {}", a, b);
        if !exists {
            error_log!(
                "Subnet",
                physp_a = %a,
                physp_b = %b,
                "Unlink requested for ports that are not linked"
            );
            return;
        }
        let Some((pa, pb)) = self.physps.get_pair_mut(a, b) else {
            return;
        };
        pa.prev_remote = pa.remote.take();
        pb.prev_remote = pb.remote.take();
        let (guid_a, num_a, guid_b, num_b) =
            (pa.port_guid(), pa.port_num(), pb.port_guid(), pb.port_num());

        audit_log!(AuditRecord::new(AuditCategory::LinkChange, "Subnet", "unlink")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(format!("{}:{}-{}:{}", guid_a, num_a, guid_b, num_b))
            .with_object_type("link")
            .with_sweep(self.sweep_id));
    }

    /// Breaks whatever link `id` takes part in. A partner reference the
    /// remote does not return is cleared without an audit record.
    fn detach(&mut self, id: PhysPortId) {
        let Some(remote) = self.remote(id) else {
            return;
        };
        if self.link_exists(id, remote) {
            self.unlink(id, remote);
            return;
        }
        warn_log!(
            "Subnet",
            physp = %id,
            remote = %remote,
            "Clearing one-sided link"
        );
        if let Some(physp) = self.physps.get_mut(id) {
            physp.prev_remote = physp.remote.take();
        }
    }

    /// True if `a` and `b` reference each other.
    pub fn link_exists(&self, a: PhysPortId, b: PhysPortId) -> bool {
        let points_to = |from: PhysPortId, to: PhysPortId| {
            self.physps
                .get(from)
                .is_some_and(|p| p.remote() == Some(to))
        };
        points_to(a, b) && points_to(b, a)
    }

    pub fn has_any_link(&self, id: PhysPortId) -> bool {
        self.physps.get(id).is_some_and(PhysicalPort::has_any_link)
    }

    /// Link partner of `id`.
    pub fn remote(&self, id: PhysPortId) -> Option<PhysPortId> {
        self.physps.get(id)?.remote()
    }

    pub fn remote_physp(&self, id: PhysPortId) -> Option<&PhysicalPort> {
        self.physps.get(self.remote(id)?)
    }

    pub fn link_is_healthy(&self, id: PhysPortId) -> Result<bool> {
        Ok(self.physp_ref(id)?.link_is_healthy(self.remote_physp(id)))
    }

    /// True if the link of `id` runs below what both ends enable. An
    /// unlinked port is never throttled.
    pub fn link_is_throttled(&self, id: PhysPortId) -> Result<bool> {
        let physp = self.physp_ref(id)?;
        Ok(self
            .remote_physp(id)
            .is_some_and(|remote| physp.link_is_throttled(remote, self.options.fdr10_enabled)))
    }

    pub fn calc_link_mtu(&self, id: PhysPortId, current: Option<Mtu>) -> Result<Mtu> {
        Ok(self.physp_ref(id)?.calc_link_mtu(self.remote_physp(id), current))
    }

    pub fn calc_link_op_vls(&self, id: PhysPortId, current: Option<VlCap>) -> Result<VlCap> {
        Ok(self
            .physp_ref(id)?
            .calc_link_op_vls(self.remote_physp(id), &self.options, current))
    }

    /// Directed routes that reach the node of `dest` through a neighbour
    /// other than the one its current path uses.
    fn alternate_dr_paths(&self, dest: &PhysicalPort, node: &Node) -> Vec<DrPath> {
        let node_id = dest.node();
        let mut alternates: Vec<DrPath> = Vec::new();
        for (_, nbr_id) in node.physps() {
            let Some(remote) = self.remote_physp(nbr_id) else {
                continue;
            };
            if remote.node() == node_id {
                continue;
            }
            let reachable = remote.node_type() == Some(NodeType::Switch)
                || remote.dr_path().hop_count() == 0;
            if !reachable {
                continue;
            }
            let Ok(candidate) = remote.dr_path().extend(remote.port_num()) else {
                continue;
            };
            if candidate.same_route(dest.dr_path())
                || alternates.iter().any(|p| p.same_route(&candidate))
            {
                continue;
            }
            alternates.push(candidate);
        }
        alternates
    }

    /// Swaps the directed route to `dest` for one through another
    /// neighbour of its node.
    ///
    /// Returns false when no alternate exists or the port already used up
    /// `max_dr_path_retries` attempts. Each attempt counts against the
    /// port. On a switch every port of the node takes the new path.
    pub fn replace_dr_path(&mut self, dest: PhysPortId) -> bool {
        let Some(physp) = self.physps.get(dest) else {
            warn_log!("Subnet", physp = %dest, "DR path replacement for unknown port");
            return false;
        };
        let tried = physp.num_dr_paths_tried();
        if tried >= self.options.max_dr_path_retries {
            warn_log!(
                "Subnet",
                port_guid = %physp.port_guid(),
                port_num = physp.port_num(),
                tried,
                "DR path retries exhausted"
            );
            audit_log!(dr_retries_exhausted_record(
                physp,
                tried,
                self.options.max_dr_path_retries,
                self.sweep_id,
            ));
            return false;
        }
        let Some(node) = physp.node().and_then(|id| self.nodes.get(id)) else {
            return false;
        };
        let old_path = physp.dr_path().clone();
        let new_path = self.alternate_dr_paths(physp, node).into_iter().next();
        let targets: Vec<PhysPortId> = if node.is_switch() {
            node.physps().map(|(_, id)| id).collect()
        } else {
            vec![dest]
        };
        let port_guid = physp.port_guid();

        if let Some(physp) = self.physps.get_mut(dest) {
            physp.set_num_dr_paths_tried(tried + 1);
        }
        let Some(new_path) = new_path else {
            debug_log!(
                "Subnet",
                port_guid = %port_guid,
                path = %old_path,
                "No alternate DR path"
            );
            return false;
        };

        for id in targets {
            if let Some(physp) = self.physps.get_mut(id) {
                physp.set_dr_path(new_path.clone());
            }
        }

        audit_log!(AuditRecord::new(AuditCategory::PathChange, "Subnet", "replace_dr_path")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(port_guid.to_string())
            .with_object_type("physical_port")
            .with_sweep(self.sweep_id)
            .with_details(serde_json::json!({
                "old_path": old_path.to_string(),
                "new_path": new_path.to_string(),
                "attempt": tried + 1,
            })));

        true
    }

    // ---- logical ports -------------------------------------------------

    /// Creates the logical port behind `node`'s NodeInfo port GUID.
    ///
    /// A switch is represented by its port 0; an end node by the port its
    /// NodeInfo was received on.
    pub fn new_port(&mut self, node: NodeId) -> Result<Guid> {
        let owner = self.node_ref(node)?;
        let node_info = owner.node_info().clone();
        let port_num = if owner.is_switch() {
            0
        } else {
            node_info.local_port_num
        };
        let physp = owner
            .physp(port_num)
            .ok_or(PortModelError::PortNumberNotPopulated { node, port_num })?;
        let guid = node_info.port_guid;
        if self.ports.contains_key(&guid) {
            return Err(PortModelError::PortExists(guid));
        }

        self.ports
            .insert(guid, LogicalPort::new(&node_info, node, physp));

        audit_log!(AuditRecord::new(AuditCategory::PortLifecycle, "Subnet", "new_port")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(guid.to_string())
            .with_object_type("port")
            .with_sweep(self.sweep_id));

        Ok(guid)
    }

    pub fn port(&self, guid: Guid) -> Option<&LogicalPort> {
        self.ports.get(&guid)
    }

    pub fn port_mut(&mut self, guid: Guid) -> Option<&mut LogicalPort> {
        self.ports.get_mut(&guid)
    }

    pub fn ports(&self) -> impl Iterator<Item = &LogicalPort> + '_ {
        self.ports.values()
    }

    fn port_ref(&self, guid: Guid) -> Result<&LogicalPort> {
        self.ports.get(&guid).ok_or(PortModelError::PortNotFound(guid))
    }

    fn port_ref_mut(&mut self, guid: Guid) -> Result<&mut LogicalPort> {
        self.ports
            .get_mut(&guid)
            .ok_or(PortModelError::PortNotFound(guid))
    }

    /// Removes a logical port with its virtualization state, alias GUIDs,
    /// multicast memberships and virtualization queue entry.
    pub fn delete_port(&mut self, guid: Guid) -> Result<LogicalPort> {
        self.port_ref(guid)?;
        self.delete_virtualization(guid)?;

        let mut port = self
            .ports
            .remove(&guid)
            .ok_or(PortModelError::PortNotFound(guid))?;
        for membership in port.take_mcast_memberships() {
            if let Some(group) = self.mgrps.get_mut(&membership.mlid) {
                group.remove_member(membership.guid);
            }
        }
        self.alias_guids.retain(|_, alias| alias.base_guid() != guid);
        self.virt_queue.retain(|queued| *queued != guid);

        audit_log!(AuditRecord::new(AuditCategory::PortLifecycle, "Subnet", "delete_port")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(guid.to_string())
            .with_object_type("port")
            .with_sweep(self.sweep_id));

        Ok(port)
    }

    /// Representative physical port of a logical port.
    pub fn port_physp(&self, guid: Guid) -> Result<&PhysicalPort> {
        self.physp_ref(self.port_ref(guid)?.physp())
    }

    pub fn port_base_lid(&self, guid: Guid) -> Result<Lid> {
        Ok(self.port_physp(guid)?.base_lid())
    }

    pub fn port_lmc(&self, guid: Guid) -> Result<u8> {
        Ok(self.port_physp(guid)?.lmc())
    }

    /// `[base, base + 2^lmc - 1]` of a logical port.
    pub fn port_lid_range(&self, guid: Guid) -> Result<LidRange> {
        let physp = self.port_physp(guid)?;
        Ok(LogicalPort::lid_range(physp.base_lid(), physp.lmc()))
    }

    /// Sets the base LID on the logical port and its representative
    /// physical port together.
    pub fn set_port_base_lid(&mut self, guid: Guid, lid: Lid) -> Result<()> {
        let physp_id = self.port_ref(guid)?.physp();
        self.physp_ref_mut(physp_id)?.set_base_lid(lid);
        self.port_ref_mut(guid)?.set_lid(lid);
        Ok(())
    }

    /// Clears the base LID of the logical port and its representative
    /// physical port together.
    pub fn clear_port_base_lid(&mut self, guid: Guid) -> Result<()> {
        self.set_port_base_lid(guid, Lid::UNASSIGNED)?;
        debug_log!("Subnet", port_guid = %guid, "Base LID cleared");
        Ok(())
    }

    // ---- virtualization ------------------------------------------------

    /// True if the port is a CA port advertising virtualization support.
    ///
    /// Only meaningful once NodeInfo and PortInfo were received.
    pub fn is_virt_supported(&self, guid: Guid) -> Result<bool> {
        let port = self.port_ref(guid)?;
        let node = self.node_ref(port.node())?;
        let physp = self.physp_ref(port.physp())?;
        Ok(node.node_type() == NodeType::Ca && physp.port_info().is_virtualization_supported())
    }

    /// Stores a VirtualizationInfo and grows the vport array to cover its
    /// top index. Vports above a lowered top index are deleted.
    ///
    /// Returns `Ok(false)` when the vport array cannot grow.
    pub fn set_virt_info(&mut self, guid: Guid, info: &VirtualizationInfo) -> Result<bool> {
        let stale: Vec<u16> = self
            .port_ref(guid)?
            .virt()
            .vports()
            .map(VPort::index)
            .filter(|index| *index > info.vport_index_top)
            .collect();
        for index in stale {
            self.delete_vport(guid, index)?;
        }

        let grown = self.port_ref_mut(guid)?.virt_mut().set_virt_info(info);
        if !grown {
            error_log!(
                "Subnet",
                port_guid = %guid,
                top_index = info.vport_index_top,
                "Failed to store VirtualizationInfo"
            );
        }
        Ok(grown)
    }

    pub fn vport_top_index(&self, guid: Guid) -> Result<u16> {
        Ok(self.port_ref(guid)?.virt().vport_top_index())
    }

    /// Vport `index` of the port, or `None` when absent.
    pub fn vport(&self, guid: Guid, index: u16) -> Option<&VPort> {
        self.ports.get(&guid)?.virt().vport(index)
    }

    /// Creates vport `index` and registers its GUID as an alias of the
    /// port.
    ///
    /// Returns `Ok(None)` when the index is out of range or occupied.
    pub fn create_vport(
        &mut self,
        guid: Guid,
        index: u16,
        vport_info: &VPortInfo,
        context: &VPortInfoContext,
    ) -> Result<Option<&VPort>> {
        let node = self.port_ref(guid)?.node();
        let pkey_blocks = PKeyTable::blocks_for_partition_cap(self.node_ref(node)?.partition_cap());

        let created = self
            .port_ref_mut(guid)?
            .virt_mut()
            .create_vport(index, guid, vport_info, pkey_blocks, context)
            .map(VPort::guid);
        let Some(vport_guid) = created else {
            return Ok(None);
        };

        if !vport_guid.is_zero() && vport_guid != guid {
            self.alias_guids
                .entry(vport_guid)
                .or_insert_with(|| AliasGuid::new(vport_guid, guid, Some(index)));
        }

        audit_log!(AuditRecord::new(
            AuditCategory::VirtualizationChange,
            "Subnet",
            "create_vport",
        )
        .with_outcome(AuditOutcome::Success)
        .with_object_id(format!("{}/{}", guid, index))
        .with_object_type("vport")
        .with_sweep(context.sweep_id)
        .with_details(serde_json::json!({
            "vport_guid": vport_guid.to_string(),
        })));

        Ok(self.vport(guid, index))
    }

    /// Applies a fresh VPortInfo to an existing vport, moving its alias
    /// when the vport GUID changed.
    pub fn update_vport(
        &mut self,
        guid: Guid,
        index: u16,
        vport_info: &VPortInfo,
        context: &VPortInfoContext,
    ) -> Result<bool> {
        let virt = self.port_ref_mut(guid)?.virt_mut();
        let Some(old_guid) = virt.vport(index).map(VPort::guid) else {
            return Ok(false);
        };
        virt.update_vport(index, vport_info, context);

        let new_guid = vport_info.port_guid;
        if old_guid != new_guid {
            if self
                .alias_guids
                .get(&old_guid)
                .is_some_and(|a| a.base_guid() == guid && a.vport_index() == Some(index))
            {
                self.alias_guids.remove(&old_guid);
            }
            if !new_guid.is_zero() && new_guid != guid {
                self.alias_guids
                    .entry(new_guid)
                    .or_insert_with(|| AliasGuid::new(new_guid, guid, Some(index)));
            }
            self.drop_vport_memberships(guid, &[old_guid]);
            debug_log!(
                "Subnet",
                port_guid = %guid,
                index,
                old_guid = %old_guid,
                new_guid = %new_guid,
                "Vport GUID changed"
            );
        }
        Ok(true)
    }

    /// Deletes vport `index` and the alias GUIDs that name it.
    pub fn delete_vport(&mut self, guid: Guid, index: u16) -> Result<Option<VPort>> {
        let Some(vport) = self.port_ref_mut(guid)?.virt_mut().delete_vport(index) else {
            return Ok(None);
        };
        self.alias_guids
            .retain(|_, alias| !(alias.base_guid() == guid && alias.vport_index() == Some(index)));
        self.drop_vport_memberships(guid, &[vport.guid()]);

        audit_log!(AuditRecord::new(
            AuditCategory::VirtualizationChange,
            "Subnet",
            "delete_vport",
        )
        .with_outcome(AuditOutcome::Success)
        .with_object_id(format!("{}/{}", guid, index))
        .with_object_type("vport")
        .with_sweep(self.sweep_id));

        Ok(Some(vport))
    }

    /// Removes the multicast memberships held under vport GUIDs that no
    /// longer name a vport of `guid`.
    fn drop_vport_memberships(&mut self, guid: Guid, vport_guids: &[Guid]) {
        let Some(port) = self.ports.get_mut(&guid) else {
            return;
        };
        let mut dropped = Vec::new();
        for vport_guid in vport_guids {
            if vport_guid.is_zero() || *vport_guid == guid {
                continue;
            }
            dropped.extend(port.take_mcast_memberships_of(*vport_guid));
        }
        for membership in &dropped {
            if let Some(group) = self.mgrps.get_mut(&membership.mlid) {
                group.remove_member(membership.guid);
            }
            debug_log!(
                "Subnet",
                port_guid = %guid,
                vport_guid = %membership.guid,
                mlid = %membership.mlid,
                "Vport multicast membership dropped"
            );
        }
    }

    pub fn increase_virt_transactions(&mut self, guid: Guid) -> Result<()> {
        self.port_ref_mut(guid)?.virt_mut().increase_transactions();
        Ok(())
    }

    pub fn decrease_virt_transactions(&mut self, guid: Guid) -> Result<()> {
        self.port_ref_mut(guid)?.virt_mut().decrease_transactions();
        Ok(())
    }

    pub fn virt_transactions(&self, guid: Guid) -> Result<u16> {
        Ok(self.port_ref(guid)?.virt().transactions())
    }

    /// Tears down the whole vport array and virtualization state of a port.
    pub fn delete_virtualization(&mut self, guid: Guid) -> Result<()> {
        let port = self.port_ref_mut(guid)?;
        let had_info = port.virt().virtualization_info().is_some();
        let removed = port.virt_mut().clear();

        self.alias_guids
            .retain(|_, alias| !(alias.base_guid() == guid && alias.vport_index().is_some()));
        self.virt_queue.retain(|queued| *queued != guid);
        let vport_guids: Vec<Guid> = removed.iter().map(VPort::guid).collect();
        self.drop_vport_memberships(guid, &vport_guids);

        if had_info || !removed.is_empty() {
            audit_log!(AuditRecord::new(
                AuditCategory::VirtualizationChange,
                "Subnet",
                "delete_virtualization",
            )
            .with_outcome(AuditOutcome::Success)
            .with_object_id(guid.to_string())
            .with_object_type("port")
            .with_sweep(self.sweep_id)
            .with_details(serde_json::json!({
                "vports_removed": removed.len(),
            })));
        }
        Ok(())
    }

    pub fn is_vport_lid_assigned(&self, guid: Guid, index: u16) -> Result<bool> {
        Ok(self.port_ref(guid)?.virt().is_vport_lid_assigned(index))
    }

    pub fn vport_by_lid(&self, guid: Guid, lid: Lid) -> Result<Option<&VPort>> {
        Ok(self.port_ref(guid)?.virt().vport_by_lid(lid))
    }

    /// Drops vports of `guid` from group `mlid` when their P_Key table no
    /// longer holds the group's partition. Returns how many were removed.
    pub fn update_vports_mcast_membership(&mut self, guid: Guid, mlid: Lid) -> Result<usize> {
        let group = self
            .mgrps
            .get(&mlid)
            .ok_or(PortModelError::McastGroupNotFound(mlid.as_u16()))?;
        let pkey_base = group.pkey().base();
        let stale: Vec<Guid> = self
            .port_ref(guid)?
            .virt()
            .vports()
            .map(|vport| (vport.guid(), vport))
            .filter(|(vport_guid, _)| *vport_guid != guid && group.is_member(*vport_guid))
            .filter(|(_, vport)| !vport.pkey_tbl().contains_base(pkey_base))
            .map(|(vport_guid, _)| vport_guid)
            .collect();

        if let Some(group) = self.mgrps.get_mut(&mlid) {
            for vport_guid in &stale {
                group.remove_member(*vport_guid);
            }
        }
        let port = self.port_ref_mut(guid)?;
        for vport_guid in &stale {
            port.remove_mcast_membership(mlid, *vport_guid);
            info_log!(
                "Subnet",
                port_guid = %guid,
                vport_guid = %vport_guid,
                mlid = %mlid,
                "Vport removed from multicast group after P_Key change"
            );
        }
        if !stale.is_empty() {
            let removed: Vec<String> = stale.iter().map(Guid::to_string).collect();
            audit_log!(AuditRecord::new(
                AuditCategory::McastMembership,
                "Subnet",
                "update_vports_mcast_membership",
            )
            .with_outcome(AuditOutcome::Success)
            .with_object_id(mlid.to_string())
            .with_object_type("mcast_group")
            .with_sweep(self.sweep_id)
            .with_details(serde_json::json!({
                "port_guid": guid.to_string(),
                "removed": removed,
                "pkey_base": pkey_base,
            })));
        }
        Ok(stale.len())
    }

    /// Queues the port for virtualization processing. Returns false if it
    /// is already queued.
    pub fn enqueue_virt(&mut self, guid: Guid) -> Result<bool> {
        let virt = self.port_ref_mut(guid)?.virt_mut();
        if virt.queue_pending() {
            return Ok(false);
        }
        virt.set_queue_pending(true);
        self.virt_queue.push_back(guid);
        Ok(true)
    }

    /// Next port waiting for virtualization processing.
    pub fn dequeue_virt(&mut self) -> Option<Guid> {
        while let Some(guid) = self.virt_queue.pop_front() {
            if let Some(port) = self.ports.get_mut(&guid) {
                port.virt_mut().set_queue_pending(false);
                return Some(guid);
            }
        }
        None
    }

    pub fn virt_queue_len(&self) -> usize {
        self.virt_queue.len()
    }

    // ---- alias GUIDs ---------------------------------------------------

    /// Maps `alias` to the logical port `base_guid`.
    pub fn add_alias_guid(&mut self, alias: Guid, base_guid: Guid, vport_index: Option<u16>) -> Result<()> {
        self.port_ref(base_guid)?;
        if self.alias_guids.contains_key(&alias) {
            return Err(PortModelError::AliasGuidExists(alias));
        }
        self.alias_guids
            .insert(alias, AliasGuid::new(alias, base_guid, vport_index));
        debug_log!(
            "Subnet",
            alias_guid = %alias,
            base_guid = %base_guid,
            "Alias GUID added"
        );
        Ok(())
    }

    pub fn remove_alias_guid(&mut self, alias: Guid) -> Result<AliasGuid> {
        self.alias_guids
            .remove(&alias)
            .ok_or(PortModelError::AliasGuidNotFound(alias))
    }

    pub fn alias_guid(&self, alias: Guid) -> Option<&AliasGuid> {
        self.alias_guids.get(&alias)
    }

    pub fn alias_guid_mut(&mut self, alias: Guid) -> Option<&mut AliasGuid> {
        self.alias_guids.get_mut(&alias)
    }

    /// Alias GUIDs of a base port.
    pub fn alias_guids_of(&self, base_guid: Guid) -> impl Iterator<Item = &AliasGuid> + '_ {
        self.alias_guids
            .values()
            .filter(move |alias| alias.base_guid() == base_guid)
    }

    fn alias_ref(&self, alias: Guid) -> Result<&AliasGuid> {
        self.alias_guids
            .get(&alias)
            .ok_or(PortModelError::AliasGuidNotFound(alias))
    }

    /// P_Key table governing an alias GUID.
    pub fn alias_pkey_tbl(&self, alias: Guid) -> Result<&PKeyTable> {
        let alias = self.alias_ref(alias)?;
        let port = self.port_ref(alias.base_guid())?;
        let physp = self.physp_ref(port.physp())?;
        Ok(alias.pkey_tbl(port, physp))
    }

    pub fn alias_description(&self, alias: Guid) -> Result<String> {
        let alias = self.alias_ref(alias)?;
        let port = self.port_ref(alias.base_guid())?;
        let node = self.node_ref(port.node())?;
        Ok(alias.build_description(node.description()))
    }

    // ---- multicast -----------------------------------------------------

    /// Returns the group `mlid`, creating it with `pkey` if needed.
    pub fn add_mgrp(&mut self, mlid: Lid, pkey: PKey) -> &mut MulticastGroup {
        self.mgrps
            .entry(mlid)
            .or_insert_with(|| MulticastGroup::new(mlid, pkey))
    }

    pub fn mgrp(&self, mlid: Lid) -> Option<&MulticastGroup> {
        self.mgrps.get(&mlid)
    }

    /// Joins `guid` (a port GUID or alias GUID) to group `mlid`.
    pub fn join_mgrp(&mut self, mlid: Lid, guid: Guid, join_state: u8) -> Result<()> {
        let base_port_guid = if self.ports.contains_key(&guid) {
            guid
        } else {
            self.alias_ref(guid)
                .map_err(|_| PortModelError::PortNotFound(guid))?
                .base_guid()
        };
        let group = self
            .mgrps
            .get_mut(&mlid)
            .ok_or(PortModelError::McastGroupNotFound(mlid.as_u16()))?;
        group.add_member(McastMember {
            port_guid: guid,
            base_port_guid,
            join_state,
        });
        self.port_ref_mut(base_port_guid)?
            .add_mcast_membership(McastMembership {
                mlid,
                guid,
                join_state,
            });
        Ok(())
    }

    /// Removes `guid` from group `mlid`.
    pub fn leave_mgrp(&mut self, mlid: Lid, guid: Guid) -> Result<bool> {
        let group = self
            .mgrps
            .get_mut(&mlid)
            .ok_or(PortModelError::McastGroupNotFound(mlid.as_u16()))?;
        let Some(member) = group.remove_member(guid) else {
            return Ok(false);
        };
        if let Some(port) = self.ports.get_mut(&member.base_port_guid) {
            port.remove_mcast_membership(mlid, guid);
        }
        Ok(true)
    }
}

fn dr_retries_exhausted_record(
    physp: &PhysicalPort,
    tried: u32,
    max_retries: u32,
    sweep_id: u64,
) -> AuditRecord {
    AuditRecord::new(AuditCategory::ErrorCondition, "Subnet", "replace_dr_path")
        .with_error(format!("{} of {} retries used", tried, max_retries))
        .with_outcome(AuditOutcome::Denied)
        .with_object_id(physp.port_guid().to_string())
        .with_object_type("physical_port")
        .with_sweep(sweep_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dr_path::BindHandle;
    use ib_types::{PhysPortState, PortState};
    use pretty_assertions::assert_eq;

    struct Ca {
        node: NodeId,
        physp: PhysPortId,
        guid: Guid,
    }

    fn add_ca(subnet: &mut Subnet, node_guid: u64) -> Ca {
        let guid = Guid::new(node_guid + 1);
        let ni = NodeInfo::new(NodeType::Ca, 1, Guid::new(node_guid), guid);
        let node = subnet.add_node(ni);
        let physp = subnet.add_physp(node, 1, guid, DrPath::default()).unwrap();
        subnet.new_port(node).unwrap();
        Ca { node, physp, guid }
    }

    fn add_switch(subnet: &mut Subnet, guid: u64, num_ports: u8, path: &[u8]) -> NodeId {
        let guid = Guid::new(guid);
        let ni = NodeInfo::new(NodeType::Switch, num_ports, guid, guid);
        let node = subnet.add_node(ni);
        let hops = (path.len() - 1) as u8;
        for port_num in 0..=num_ports {
            let dr = DrPath::new(BindHandle::new(1), hops, Some(path)).unwrap();
            subnet.add_physp(node, port_num, guid, dr).unwrap();
        }
        subnet.new_port(node).unwrap();
        node
    }

    fn active_pi(mtu_cap: Mtu) -> PortInfo {
        PortInfo {
            port_state: PortState::Active,
            port_phys_state: PhysPortState::LinkUp,
            subnet_prefix: SubnetOptions::default().subnet_prefix,
            mtu_cap,
            ..Default::default()
        }
    }

    #[test]
    fn test_set_options_validates() {
        let mut subnet = Subnet::default();
        let bad = SubnetOptions {
            max_op_vls: 9,
            ..Default::default()
        };
        assert!(matches!(
            subnet.set_options(bad),
            Err(PortModelError::Config(_))
        ));
        assert_eq!(subnet.options(), &SubnetOptions::default());

        let good = SubnetOptions {
            fdr10_enabled: true,
            ..Default::default()
        };
        subnet.set_options(good.clone()).unwrap();
        assert_eq!(subnet.options(), &good);
    }

    #[test]
    fn test_add_physp_bounds() {
        let mut subnet = Subnet::default();
        let ca = add_ca(&mut subnet, 0x10);

        let err = subnet
            .add_physp(ca.node, 2, ca.guid, DrPath::default())
            .unwrap_err();
        assert!(matches!(err, PortModelError::InvalidPortNumber { port_num: 2, num_ports: 1 }));
        let err = subnet
            .add_physp(ca.node, 1, ca.guid, DrPath::default())
            .unwrap_err();
        assert!(matches!(err, PortModelError::PhysPortExists { port_num: 1, .. }));
        assert_eq!(subnet.physp_at(ca.node, 1).unwrap(), ca.physp);
        assert!(subnet.physp_at(ca.node, 0).is_err());
    }

    #[test]
    fn test_hop_weight_from_options() {
        let options = SubnetOptions {
            hop_weight_default: 4,
            ..Default::default()
        };
        let mut subnet = Subnet::new(options);
        let ca = add_ca(&mut subnet, 0x10);
        assert_eq!(subnet.physp(ca.physp).map(PhysicalPort::hop_wf), Some(4));
    }

    #[test]
    fn test_new_port_rejects_duplicate() {
        let mut subnet = Subnet::default();
        let ca = add_ca(&mut subnet, 0x10);
        assert!(matches!(
            subnet.new_port(ca.node).unwrap_err(),
            PortModelError::PortExists(_)
        ));
        let port = subnet.port(ca.guid).unwrap();
        assert_eq!(port.physp(), ca.physp);
        assert_eq!(port.node(), ca.node);
    }

    #[test]
    fn test_switch_port_is_port_zero() {
        let mut subnet = Subnet::default();
        let sw = add_switch(&mut subnet, 0x50, 4, &[0, 1]);
        let port = subnet.port(Guid::new(0x50)).unwrap();
        assert_eq!(port.physp(), subnet.physp_at(sw, 0).unwrap());
    }

    #[test]
    fn test_link_symmetry() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let b = add_ca(&mut subnet, 0x20);

        subnet.link(a.physp, b.physp).unwrap();
        assert!(subnet.link_exists(a.physp, b.physp));
        assert!(subnet.link_exists(b.physp, a.physp));
        assert!(subnet.has_any_link(a.physp));
        assert_eq!(subnet.remote(a.physp), Some(b.physp));

        subnet.unlink(a.physp, b.physp);
        assert!(!subnet.link_exists(a.physp, b.physp));
        assert!(subnet.remote(a.physp).is_none());
        assert!(subnet.remote(b.physp).is_none());
        assert_eq!(subnet.physp(a.physp).unwrap().prev_remote(), Some(b.physp));
    }

    #[test]
    fn test_link_to_self_rejected() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        assert!(subnet.link(a.physp, a.physp).is_err());
    }

    #[test]
    fn test_relink_replaces_old_partner() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let b = add_ca(&mut subnet, 0x20);
        let c = add_ca(&mut subnet, 0x30);

        subnet.link(a.physp, b.physp).unwrap();
        subnet.link(a.physp, c.physp).unwrap();
        assert!(subnet.link_exists(a.physp, c.physp));
        assert!(!subnet.has_any_link(b.physp));
        assert_eq!(subnet.physp(b.physp).unwrap().prev_remote(), Some(a.physp));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unlink of non-existent link")]
    fn test_unlink_missing_link_asserts() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let b = add_ca(&mut subnet, 0x20);
        subnet.unlink(a.physp, b.physp);
    }

    #[test]
    fn test_remove_node_unlinks() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let b = add_ca(&mut subnet, 0x20);
        subnet.link(a.physp, b.physp).unwrap();

        subnet.remove_node(b.node).unwrap();
        assert!(subnet.node(b.node).is_none());
        assert!(subnet.physp(b.physp).is_none());
        assert!(subnet.port(b.guid).is_none());
        assert!(!subnet.has_any_link(a.physp));
        assert!(subnet.remove_node(b.node).is_err());
    }

    #[test]
    fn test_remove_node_with_one_sided_link() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let b = add_ca(&mut subnet, 0x20);
        subnet.link(a.physp, b.physp).unwrap();
        *subnet.physp_mut(a.physp).unwrap() = PhysicalPort::construct();
        assert_eq!(subnet.remote(b.physp), Some(a.physp));
        assert!(!subnet.link_exists(a.physp, b.physp));

        subnet.remove_node(b.node).unwrap();
        assert!(subnet.physp(b.physp).is_none());
        assert_eq!(subnet.remote(a.physp), None);
        subnet.remove_node(a.node).unwrap();
        assert_eq!(subnet.nodes().count(), 0);
    }

    #[test]
    fn test_relink_over_one_sided_link() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let b = add_ca(&mut subnet, 0x20);
        let c = add_ca(&mut subnet, 0x30);
        subnet.link(a.physp, b.physp).unwrap();
        *subnet.physp_mut(b.physp).unwrap() = PhysicalPort::construct();

        subnet.link(a.physp, c.physp).unwrap();
        assert!(subnet.link_exists(a.physp, c.physp));
        assert_eq!(subnet.physp(a.physp).unwrap().prev_remote(), Some(b.physp));
    }

    #[test]
    fn test_link_mtu_through_subnet() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let b = add_ca(&mut subnet, 0x20);
        subnet.set_port_info(a.physp, &active_pi(Mtu::Mtu4096), false).unwrap();
        subnet.set_port_info(b.physp, &active_pi(Mtu::Mtu1024), false).unwrap();

        assert_eq!(subnet.calc_link_mtu(a.physp, None).unwrap(), Mtu::Mtu4096);
        subnet.link(a.physp, b.physp).unwrap();
        assert_eq!(subnet.calc_link_mtu(a.physp, None).unwrap(), Mtu::Mtu1024);
        assert_eq!(subnet.calc_link_mtu(b.physp, None).unwrap(), Mtu::Mtu1024);
        assert!(subnet.link_is_healthy(a.physp).unwrap());
        assert!(!subnet.link_is_throttled(a.physp).unwrap());
    }

    #[test]
    fn test_lid_range_and_clear() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let pi = PortInfo {
            lmc: 2,
            ..active_pi(Mtu::Mtu2048)
        };
        subnet.set_port_info(a.physp, &pi, false).unwrap();
        subnet.set_port_base_lid(a.guid, Lid::new(0x20)).unwrap();

        let range = subnet.port_lid_range(a.guid).unwrap();
        assert_eq!(range.min(), Lid::new(0x20));
        assert_eq!(range.max(), Lid::new(0x23));
        assert_eq!(subnet.port(a.guid).unwrap().lid(), Lid::new(0x20));

        subnet.clear_port_base_lid(a.guid).unwrap();
        assert!(subnet.port(a.guid).unwrap().lid().is_unassigned());
        assert!(subnet.port_base_lid(a.guid).unwrap().is_unassigned());
    }

    /// SM CA with two ports feeding switches S1 and S2, which both reach S3.
    fn redundant_fabric(subnet: &mut Subnet) -> (NodeId, PhysPortId) {
        let sm_guid = Guid::new(0x1);
        let ni = NodeInfo::new(NodeType::Ca, 2, sm_guid, sm_guid);
        let sm = subnet.add_node(ni);
        let sm1 = subnet.add_physp(sm, 1, Guid::new(0x2), DrPath::default()).unwrap();
        let sm2 = subnet.add_physp(sm, 2, Guid::new(0x3), DrPath::default()).unwrap();

        let s1 = add_switch(subnet, 0x100, 2, &[0, 1]);
        let s2 = add_switch(subnet, 0x200, 2, &[0, 2]);
        let s3 = add_switch(subnet, 0x300, 2, &[0, 1, 2]);

        let at = |subnet: &Subnet, node, port| subnet.physp_at(node, port).unwrap();
        let links = [
            (sm1, at(&*subnet, s1, 1)),
            (sm2, at(&*subnet, s2, 1)),
            (at(&*subnet, s1, 2), at(&*subnet, s3, 1)),
            (at(&*subnet, s2, 2), at(&*subnet, s3, 2)),
        ];
        for (a, b) in links {
            subnet.link(a, b).unwrap();
        }
        (s3, at(&*subnet, s3, 0))
    }

    #[test]
    fn test_replace_dr_path_uses_other_neighbour() {
        let mut subnet = Subnet::default();
        let (s3, dest) = redundant_fabric(&mut subnet);

        assert!(subnet.replace_dr_path(dest));
        let physp = subnet.physp(dest).unwrap();
        assert_eq!(physp.dr_path().hops(), &[2, 2]);
        assert_eq!(physp.num_dr_paths_tried(), 1);

        for (_, id) in subnet.node(s3).unwrap().physps() {
            assert_eq!(subnet.physp(id).unwrap().dr_path().hops(), &[2, 2]);
        }
    }

    #[test]
    fn test_replace_dr_path_retry_bound() {
        let mut subnet = Subnet::default();
        let (_, dest) = redundant_fabric(&mut subnet);

        for _ in 0..3 {
            assert!(subnet.replace_dr_path(dest));
        }
        assert!(!subnet.replace_dr_path(dest));
        assert_eq!(subnet.physp(dest).unwrap().num_dr_paths_tried(), 3);
    }

    #[test]
    fn test_dr_retries_exhausted_record_is_denied() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let record = dr_retries_exhausted_record(subnet.physp(a.physp).unwrap(), 3, 3, 4);

        assert_eq!(record.category, AuditCategory::ErrorCondition);
        assert_eq!(record.outcome, AuditOutcome::Denied);
        assert_eq!(record.error, Some("3 of 3 retries used".to_string()));
        assert_eq!(record.correlation_id, Some("sweep-4".to_string()));
    }

    #[test]
    fn test_replace_dr_path_without_alternate() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        assert!(!subnet.replace_dr_path(a.physp));
        assert_eq!(subnet.physp(a.physp).unwrap().num_dr_paths_tried(), 1);
    }

    fn virt_info(top: u16) -> VirtualizationInfo {
        VirtualizationInfo {
            vport_index_top: top,
            vport_cap: 16,
            virtualization_enable: true,
            vport_state_change: false,
        }
    }

    fn vport_info(guid: u64) -> VPortInfo {
        VPortInfo {
            port_guid: Guid::new(guid),
            vport_state: PortState::Active,
            ..Default::default()
        }
    }

    #[test]
    fn test_vport_alias_lifecycle() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let ctx = VPortInfoContext { sweep_id: 1 };
        assert!(subnet.set_virt_info(a.guid, &virt_info(4)).unwrap());

        assert!(subnet.create_vport(a.guid, 2, &vport_info(0x900), &ctx).unwrap().is_some());
        assert_eq!(
            subnet.alias_guid(Guid::new(0x900)).and_then(AliasGuid::vport_index),
            Some(2)
        );

        assert!(subnet.update_vport(a.guid, 2, &vport_info(0x901), &ctx).unwrap());
        assert!(subnet.alias_guid(Guid::new(0x900)).is_none());
        assert!(subnet.alias_guid(Guid::new(0x901)).is_some());

        assert!(subnet.delete_vport(a.guid, 2).unwrap().is_some());
        assert!(subnet.alias_guid(Guid::new(0x901)).is_none());
        assert!(!subnet.update_vport(a.guid, 2, &vport_info(0x901), &ctx).unwrap());
    }

    #[test]
    fn test_lowering_top_index_deletes_vports() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let ctx = VPortInfoContext::default();
        assert!(subnet.set_virt_info(a.guid, &virt_info(8)).unwrap());
        subnet.create_vport(a.guid, 7, &vport_info(0x907), &ctx).unwrap();
        subnet.create_vport(a.guid, 1, &vport_info(0x901), &ctx).unwrap();

        assert!(subnet.set_virt_info(a.guid, &virt_info(3)).unwrap());
        assert!(subnet.alias_guid(Guid::new(0x907)).is_none());
        assert!(subnet.vport(a.guid, 1).is_some());
        assert_eq!(subnet.port(a.guid).unwrap().virt().vports().count(), 1);
    }

    #[test]
    fn test_delete_virtualization_keeps_guid_info_aliases() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        subnet.add_alias_guid(Guid::new(0x555), a.guid, None).unwrap();
        assert!(subnet.set_virt_info(a.guid, &virt_info(2)).unwrap());
        subnet
            .create_vport(a.guid, 1, &vport_info(0x901), &VPortInfoContext::default())
            .unwrap();
        subnet.increase_virt_transactions(a.guid).unwrap();
        subnet.enqueue_virt(a.guid).unwrap();

        subnet.delete_virtualization(a.guid).unwrap();
        assert_eq!(subnet.vport_top_index(a.guid).unwrap(), 0);
        assert_eq!(subnet.virt_transactions(a.guid).unwrap(), 0);
        assert!(subnet.alias_guid(Guid::new(0x901)).is_none());
        assert!(subnet.alias_guid(Guid::new(0x555)).is_some());
        assert_eq!(subnet.virt_queue_len(), 0);
    }

    #[test]
    fn test_is_virt_supported() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        assert!(!subnet.is_virt_supported(a.guid).unwrap());

        let pi = PortInfo {
            capability_mask2: ib_types::attr::CAP_MASK2_VIRTUALIZATION_SUPPORTED,
            ..active_pi(Mtu::Mtu2048)
        };
        subnet.set_port_info(a.physp, &pi, false).unwrap();
        assert!(subnet.is_virt_supported(a.guid).unwrap());

        let sw = add_switch(&mut subnet, 0x50, 2, &[0, 1]);
        let sw_physp = subnet.physp_at(sw, 0).unwrap();
        subnet.set_port_info(sw_physp, &pi, false).unwrap();
        assert!(!subnet.is_virt_supported(Guid::new(0x50)).unwrap());
    }

    #[test]
    fn test_virt_queue() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let b = add_ca(&mut subnet, 0x20);

        assert!(subnet.enqueue_virt(a.guid).unwrap());
        assert!(!subnet.enqueue_virt(a.guid).unwrap());
        assert!(subnet.enqueue_virt(b.guid).unwrap());

        assert_eq!(subnet.dequeue_virt(), Some(a.guid));
        assert!(!subnet.port(a.guid).unwrap().virt().queue_pending());
        subnet.delete_port(b.guid).unwrap();
        assert_eq!(subnet.dequeue_virt(), None);
    }

    #[test]
    fn test_vports_mcast_membership_follows_pkey() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let mlid = Lid::new(0xc001);
        subnet.add_mgrp(mlid, PKey::new(0x8005));
        assert!(subnet.set_virt_info(a.guid, &virt_info(2)).unwrap());
        let ctx = VPortInfoContext::default();
        subnet.create_vport(a.guid, 1, &vport_info(0x901), &ctx).unwrap();
        subnet.create_vport(a.guid, 2, &vport_info(0x902), &ctx).unwrap();

        let keep = PKeyBlock::from_keys(&[PKey::new(0x8005)]);
        subnet
            .port_mut(a.guid)
            .and_then(|p| p.virt_mut().vport_mut(2))
            .unwrap()
            .pkey_tbl_mut()
            .set_block(0, &keep)
            .unwrap();

        subnet.join_mgrp(mlid, a.guid, 1).unwrap();
        subnet.join_mgrp(mlid, Guid::new(0x901), 1).unwrap();
        subnet.join_mgrp(mlid, Guid::new(0x902), 1).unwrap();

        assert_eq!(subnet.update_vports_mcast_membership(a.guid, mlid).unwrap(), 1);
        let group = subnet.mgrp(mlid).unwrap();
        assert!(group.is_member(a.guid));
        assert!(!group.is_member(Guid::new(0x901)));
        assert!(group.is_member(Guid::new(0x902)));
        assert_eq!(subnet.port(a.guid).unwrap().mcast_memberships().len(), 2);
    }

    #[test]
    fn test_deleting_vports_drops_their_memberships() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let mlid = Lid::new(0xc003);
        subnet.add_mgrp(mlid, PKey::DEFAULT);
        assert!(subnet.set_virt_info(a.guid, &virt_info(3)).unwrap());
        let ctx = VPortInfoContext::default();
        for (index, guid) in [(1, 0x901), (2, 0x902), (3, 0x903)] {
            subnet.create_vport(a.guid, index, &vport_info(guid), &ctx).unwrap();
            subnet.join_mgrp(mlid, Guid::new(guid), 1).unwrap();
        }
        subnet.join_mgrp(mlid, a.guid, 1).unwrap();

        subnet.delete_vport(a.guid, 1).unwrap();
        let group = subnet.mgrp(mlid).unwrap();
        assert!(!group.is_member(Guid::new(0x901)));
        assert_eq!(group.len(), 3);
        assert_eq!(subnet.port(a.guid).unwrap().mcast_memberships().len(), 3);

        assert!(subnet.set_virt_info(a.guid, &virt_info(2)).unwrap());
        assert!(!subnet.mgrp(mlid).unwrap().is_member(Guid::new(0x903)));

        subnet.delete_virtualization(a.guid).unwrap();
        let group = subnet.mgrp(mlid).unwrap();
        assert!(!group.is_member(Guid::new(0x902)));
        assert!(group.is_member(a.guid));
        let memberships = subnet.port(a.guid).unwrap().mcast_memberships();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].guid, a.guid);
    }

    #[test]
    fn test_vport_guid_change_drops_old_memberships() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let mlid = Lid::new(0xc004);
        subnet.add_mgrp(mlid, PKey::DEFAULT);
        assert!(subnet.set_virt_info(a.guid, &virt_info(1)).unwrap());
        let ctx = VPortInfoContext::default();
        subnet.create_vport(a.guid, 1, &vport_info(0x901), &ctx).unwrap();
        subnet.join_mgrp(mlid, Guid::new(0x901), 1).unwrap();

        assert!(subnet.update_vport(a.guid, 1, &vport_info(0x911), &ctx).unwrap());
        assert!(subnet.mgrp(mlid).unwrap().is_empty());
        assert!(subnet.port(a.guid).unwrap().mcast_memberships().is_empty());
        assert!(subnet.alias_guid(Guid::new(0x911)).is_some());
    }

    #[test]
    fn test_delete_port_cleans_up() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        let mlid = Lid::new(0xc002);
        subnet.add_mgrp(mlid, PKey::DEFAULT);
        subnet.join_mgrp(mlid, a.guid, 1).unwrap();
        subnet.add_alias_guid(Guid::new(0x555), a.guid, None).unwrap();

        let port = subnet.delete_port(a.guid).unwrap();
        assert_eq!(port.guid(), a.guid);
        assert!(subnet.mgrp(mlid).unwrap().is_empty());
        assert!(subnet.alias_guid(Guid::new(0x555)).is_none());
        assert!(subnet.delete_port(a.guid).is_err());
    }

    #[test]
    fn test_alias_lookups() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        subnet.node_mut(a.node).unwrap().set_description("host1 HCA-1");
        subnet
            .set_pkey_tbl(a.physp, 0, &PKeyBlock::from_keys(&[PKey::DEFAULT]), false)
            .unwrap();
        subnet.add_alias_guid(Guid::new(0x555), a.guid, None).unwrap();

        assert!(matches!(
            subnet.add_alias_guid(Guid::new(0x555), a.guid, None),
            Err(PortModelError::AliasGuidExists(_))
        ));
        assert!(subnet.alias_pkey_tbl(Guid::new(0x555)).unwrap().contains_base(0x7fff));
        assert!(subnet
            .alias_description(Guid::new(0x555))
            .unwrap()
            .starts_with("host1 HCA-1 alias"));
        assert_eq!(subnet.alias_guids_of(a.guid).count(), 1);
        assert!(subnet.remove_alias_guid(Guid::new(0x555)).is_ok());
        assert!(subnet.remove_alias_guid(Guid::new(0x555)).is_err());
    }

    #[test]
    fn test_start_sweep_resets_discovery() {
        let mut subnet = Subnet::default();
        let a = add_ca(&mut subnet, 0x10);
        subnet.node_mut(a.node).unwrap().mark_discovered();
        subnet.port_mut(a.guid).unwrap().discovery_count = 3;

        assert_eq!(subnet.start_sweep(), 1);
        assert_eq!(subnet.node(a.node).unwrap().discovery_count(), 0);
        let port = subnet.port(a.guid).unwrap();
        assert_eq!(port.discovery_count, 0);
        assert!(!port.is_new);
    }
}
