//! Physical ports.
//!
//! One [`PhysicalPort`] exists per connector on a node. Switch ports share
//! the switch's port GUID; end ports each have their own. The PortInfo
//! `local_port_num` field names the port an SMP arrived on, so the port's
//! own number is kept separately in `port_num`.
//!
//! Link partner fields are read here but only written by
//! [`Subnet::link`](crate::Subnet::link) and
//! [`Subnet::unlink`](crate::Subnet::unlink).

use crate::arena::{NodeId, PhysPortId};
use crate::config::SubnetOptions;
use crate::congestion::CongestionSettings;
use crate::dr_path::DrPath;
use crate::error::{PortModelError, Result};
use crate::tables::{PKeyTable, QosConfigSl, SlVlTables, VlArbTables};
use crate::{debug_log, warn_log};
use chrono::Utc;
use ib_types::{
    ExtPortInfo, Guid, GuidInfoBlock, Lid, LinkSpeed, LinkWidth, Mtu, NodeInfo, NodeType,
    PKeyBlock, PhysPortState, PortInfo, PortState, SlVlTable, VlArbBlock, VlCap,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum length of the state-change timestamp string.
pub const TIMESTAMP_STR_LEN: usize = 32;

/// Kind of reset a port needs before its configuration can be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortResetType {
    #[default]
    None,
    Soft,
    Hard,
}

/// State of one physical port.
#[derive(Debug, Clone)]
pub struct PhysicalPort {
    port_info: PortInfo,
    ext_port_info: ExtPortInfo,
    port_guid: Guid,
    guid_info: Option<Vec<GuidInfoBlock>>,
    port_num: u8,
    node: Option<NodeId>,
    node_type: Option<NodeType>,
    pub(crate) remote: Option<PhysPortId>,
    pub(crate) prev_remote: Option<PhysPortId>,
    healthy: bool,
    num_dr_paths_tried: u32,
    vl_high_limit: u8,
    need_update: bool,
    profile_ignored: bool,
    dr_path: DrPath,
    pkeys: PKeyTable,
    vl_arb: VlArbTables,
    slvl_by_port: SlVlTables,
    qos_config_sl: QosConfigSl,
    hop_wf: u8,
    mcast_route_weight: u32,
    cc: Option<CongestionSettings>,
    topo_id: u64,
    port_info_dirty: bool,
    ext_port_info_dirty: bool,
    ext_port_info_updated: bool,
    port_reset_required: PortResetType,
    state_timestamp: String,
}

impl PhysicalPort {
    /// An empty, invalid port. Call [`init`](Self::init) once the GUID,
    /// port number and owning node are known.
    pub fn construct() -> Self {
        Self {
            port_info: PortInfo::default(),
            ext_port_info: ExtPortInfo::default(),
            port_guid: Guid::ZERO,
            guid_info: None,
            port_num: 0,
            node: None,
            node_type: None,
            remote: None,
            prev_remote: None,
            healthy: false,
            num_dr_paths_tried: 0,
            vl_high_limit: 0,
            need_update: false,
            profile_ignored: false,
            dr_path: DrPath::default(),
            pkeys: PKeyTable::default(),
            vl_arb: VlArbTables::default(),
            slvl_by_port: SlVlTables::default(),
            qos_config_sl: QosConfigSl::default(),
            hop_wf: 1,
            mcast_route_weight: 0,
            cc: None,
            topo_id: 0,
            port_info_dirty: false,
            ext_port_info_dirty: false,
            ext_port_info_updated: false,
            port_reset_required: PortResetType::None,
            state_timestamp: String::new(),
        }
    }

    /// Initializes the port.
    ///
    /// `port_guid` may be [`Guid::ZERO`] and `dr_path` may be empty when
    /// they are not known yet; the port stays invalid until a GUID is set.
    /// Reserved to [`Subnet`](crate::Subnet), which unlinks first.
    pub(crate) fn init(
        &mut self,
        port_guid: Guid,
        port_num: u8,
        node: NodeId,
        node_info: &NodeInfo,
        dr_path: DrPath,
    ) {
        *self = Self::construct();
        self.port_guid = port_guid;
        self.port_num = port_num;
        self.node = Some(node);
        self.node_type = Some(node_info.node_type);
        self.healthy = true;
        self.dr_path = dr_path;

        let num_slvl = if node_info.is_switch() {
            usize::from(node_info.num_ports) + 1
        } else {
            1
        };
        self.slvl_by_port = SlVlTables::new(num_slvl);
        self.pkeys = PKeyTable::new(PKeyTable::blocks_for_partition_cap(
            node_info.partition_cap,
        ));
        self.cc = Some(CongestionSettings::for_node_type(node_info.node_type));
        self.update_state_timestamp();
    }

    /// Drops the port's tables and link fields; the port becomes invalid.
    /// Reserved to [`Subnet`](crate::Subnet), which unlinks first.
    pub(crate) fn destroy(&mut self) {
        *self = Self::construct();
    }

    /// True once the port has a GUID.
    pub fn is_valid(&self) -> bool {
        !self.port_guid.is_zero()
    }

    pub fn port_guid(&self) -> Guid {
        self.port_guid
    }

    pub fn port_num(&self) -> u8 {
        self.port_num
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn node_type(&self) -> Option<NodeType> {
        self.node_type
    }

    /// Current link partner.
    pub fn remote(&self) -> Option<PhysPortId> {
        self.remote
    }

    /// Partner before the last unlink.
    pub fn prev_remote(&self) -> Option<PhysPortId> {
        self.prev_remote
    }

    pub fn has_any_link(&self) -> bool {
        self.is_valid() && self.remote.is_some()
    }

    pub fn port_info(&self) -> &PortInfo {
        &self.port_info
    }

    pub fn ext_port_info(&self) -> &ExtPortInfo {
        &self.ext_port_info
    }

    pub fn subnet_prefix(&self) -> u64 {
        self.port_info.subnet_prefix
    }

    pub fn port_state(&self) -> PortState {
        self.port_info.port_state
    }

    pub fn phys_state(&self) -> PhysPortState {
        self.port_info.port_phys_state
    }

    pub fn base_lid(&self) -> Lid {
        self.port_info.base_lid
    }

    pub fn set_base_lid(&mut self, base_lid: Lid) {
        debug_assert!(self.is_valid(), "set_base_lid on invalid port");
        self.port_info.base_lid = base_lid;
    }

    pub fn lmc(&self) -> u8 {
        self.port_info.lmc
    }

    pub fn dr_path(&self) -> &DrPath {
        &self.dr_path
    }

    pub(crate) fn set_dr_path(&mut self, dr_path: DrPath) {
        self.dr_path = dr_path;
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn set_health(&mut self, healthy: bool) {
        self.healthy = healthy;
    }

    pub fn num_dr_paths_tried(&self) -> u32 {
        self.num_dr_paths_tried
    }

    pub fn set_num_dr_paths_tried(&mut self, tried: u32) {
        self.num_dr_paths_tried = tried;
    }

    pub fn vl_high_limit(&self) -> u8 {
        self.vl_high_limit
    }

    pub fn set_vl_high_limit(&mut self, limit: u8) {
        self.vl_high_limit = limit;
    }

    /// Set when the port was probably reset and its tables need refreshing.
    pub fn need_update(&self) -> bool {
        self.need_update
    }

    pub fn set_need_update(&mut self, need_update: bool) {
        self.need_update = need_update;
    }

    /// Ignored by link load equalization.
    pub fn is_profile_ignored(&self) -> bool {
        self.profile_ignored
    }

    pub fn set_profile_ignored(&mut self, ignored: bool) {
        self.profile_ignored = ignored;
    }

    pub fn hop_wf(&self) -> u8 {
        self.hop_wf
    }

    pub fn set_hop_wf(&mut self, hop_wf: u8) {
        self.hop_wf = hop_wf;
    }

    pub fn mcast_route_weight(&self) -> u32 {
        self.mcast_route_weight
    }

    pub fn add_mcast_route_weight(&mut self, weight: u32) {
        self.mcast_route_weight = self.mcast_route_weight.saturating_add(weight);
    }

    pub fn reset_mcast_route_weight(&mut self) {
        self.mcast_route_weight = 0;
    }

    pub fn qos_config_sl(&self) -> &QosConfigSl {
        &self.qos_config_sl
    }

    pub fn qos_config_sl_mut(&mut self) -> &mut QosConfigSl {
        &mut self.qos_config_sl
    }

    pub fn congestion(&self) -> Option<&CongestionSettings> {
        self.cc.as_ref()
    }

    pub fn congestion_mut(&mut self) -> Option<&mut CongestionSettings> {
        self.cc.as_mut()
    }

    pub fn topo_id(&self) -> u64 {
        self.topo_id
    }

    pub fn set_topo_id(&mut self, topo_id: u64) {
        self.topo_id = topo_id;
    }

    pub fn port_info_dirty(&self) -> bool {
        self.port_info_dirty
    }

    pub fn set_port_info_dirty(&mut self, dirty: bool) {
        self.port_info_dirty = dirty;
    }

    pub fn ext_port_info_dirty(&self) -> bool {
        self.ext_port_info_dirty
    }

    pub fn set_ext_port_info_dirty(&mut self, dirty: bool) {
        self.ext_port_info_dirty = dirty;
    }

    pub fn ext_port_info_updated(&self) -> bool {
        self.ext_port_info_updated
    }

    pub fn clear_ext_port_info_updated(&mut self) {
        self.ext_port_info_updated = false;
    }

    pub fn port_reset_required(&self) -> PortResetType {
        self.port_reset_required
    }

    pub fn set_port_reset_required(&mut self, reset: PortResetType) {
        self.port_reset_required = reset;
    }

    /// Time of the last port state change.
    pub fn state_timestamp(&self) -> &str {
        &self.state_timestamp
    }

    fn update_state_timestamp(&mut self) {
        let mut stamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        stamp.truncate(TIMESTAMP_STR_LEN - 1);
        self.state_timestamp = stamp;
    }

    /// Switch external ports do not carry the SM LID or subnet prefix.
    fn carries_sm_fields(&self) -> bool {
        !(self.node_type == Some(NodeType::Switch) && self.port_num != 0)
    }

    /// Copies a received PortInfo into the port.
    ///
    /// A port reporting Down only updates its logical and physical state;
    /// the rest of the cached snapshot stays as last seen. The timestamp
    /// moves when the state changes or when `force_timestamp` is set.
    /// `port_info_dirty` is raised when a live port disagrees with the
    /// master SM LID or subnet prefix this SM programs.
    pub fn set_port_info(&mut self, pi: &PortInfo, options: &SubnetOptions, force_timestamp: bool) {
        let old_state = self.port_info.port_state;

        if pi.port_state == PortState::Down {
            self.port_info.port_state = pi.port_state;
            self.port_info.port_phys_state = pi.port_phys_state;
        } else {
            self.port_info = pi.clone();
            if self.carries_sm_fields() {
                let sm_lid_differs = !options.sm_base_lid.is_unassigned()
                    && pi.master_sm_base_lid != options.sm_base_lid;
                if sm_lid_differs || pi.subnet_prefix != options.subnet_prefix {
                    self.port_info_dirty = true;
                }
            }
        }

        if force_timestamp || old_state != pi.port_state {
            self.update_state_timestamp();
            debug_log!(
                "PhysicalPort",
                port_guid = %self.port_guid,
                port_num = self.port_num,
                old_state = %old_state,
                new_state = %pi.port_state,
                "Port state timestamp updated"
            );
        }
    }

    /// Copies a received vendor ExtendedPortInfo into the port.
    pub fn set_ext_port_info(&mut self, epi: &ExtPortInfo) {
        self.ext_port_info = epi.clone();
        self.ext_port_info_updated = true;
    }

    /// Sets the GUIDInfo table size for an end port.
    pub fn alloc_guid_info(&mut self, guid_cap: u16) {
        if self.node_type == Some(NodeType::Switch) && self.port_num != 0 {
            warn_log!(
                "PhysicalPort",
                port_num = self.port_num,
                "GUIDInfo requested on switch external port"
            );
            return;
        }
        let blocks = usize::from(guid_cap).div_ceil(GuidInfoBlock::ENTRIES).max(1);
        self.guid_info = Some(vec![GuidInfoBlock::default(); blocks]);
    }

    pub fn guid_info(&self) -> Option<&[GuidInfoBlock]> {
        self.guid_info.as_deref()
    }

    pub fn set_guid_info_block(&mut self, block_num: u16, block: &GuidInfoBlock) -> Result<()> {
        let blocks = self.guid_info.as_mut().ok_or(PortModelError::BlockOutOfRange {
            table: "GUIDInfo",
            block: block_num,
            min: 0,
            max: 0,
        })?;
        let max = blocks.len().saturating_sub(1) as u16;
        let slot = blocks
            .get_mut(usize::from(block_num))
            .ok_or(PortModelError::BlockOutOfRange {
                table: "GUIDInfo",
                block: block_num,
                min: 0,
                max,
            })?;
        *slot = block.clone();
        Ok(())
    }

    /// Non-zero GUIDInfo entries after index 0, which is the port GUID.
    pub fn alias_guids(&self) -> Vec<Guid> {
        self.guid_info
            .iter()
            .flatten()
            .flat_map(|block| block.guids.iter().copied())
            .skip(1)
            .filter(|guid| !guid.is_zero())
            .collect()
    }

    pub fn pkey_tbl(&self) -> &PKeyTable {
        &self.pkeys
    }

    pub fn pkey_tbl_mut(&mut self) -> &mut PKeyTable {
        &mut self.pkeys
    }

    /// Stores a received P_Key block.
    ///
    /// `block_num` is bounded by the node's PartitionCap. `is_set` marks
    /// the block as the response to a Set, which completes that block's
    /// pending update.
    pub fn set_pkey_tbl(
        &mut self,
        partition_cap: u16,
        block_num: u16,
        block: &PKeyBlock,
        is_set: bool,
    ) -> Result<()> {
        let max_blocks = PKeyTable::blocks_for_partition_cap(partition_cap);
        if block_num >= max_blocks {
            warn_log!(
                "PhysicalPort",
                port_guid = %self.port_guid,
                port_num = self.port_num,
                block_num,
                max_blocks,
                "P_Key block beyond PartitionCap"
            );
            return Err(PortModelError::BlockOutOfRange {
                table: "P_Key",
                block: block_num,
                min: 0,
                max: max_blocks - 1,
            });
        }
        if self.pkeys.max_blocks() != max_blocks {
            let mut resized = PKeyTable::new(max_blocks);
            for n in 0..max_blocks.min(self.pkeys.max_blocks()) {
                if let Some(existing) = self.pkeys.block(n) {
                    resized.set_block(n, existing)?;
                }
            }
            for n in self.pkeys.pending_blocks().filter(|n| *n < max_blocks) {
                resized.mark_pending(n);
            }
            self.pkeys = resized;
        }
        self.pkeys.set_block(block_num, block)?;
        if is_set {
            self.pkeys.clear_pending(block_num);
        }
        Ok(())
    }

    /// SL-to-VL table for traffic entering on `in_port`.
    pub fn slvl_tbl(&self, in_port: u8) -> Option<&SlVlTable> {
        self.slvl_by_port.get(in_port)
    }

    pub fn set_slvl_tbl(&mut self, in_port: u8, table: &SlVlTable) -> Result<()> {
        self.slvl_by_port.set(in_port, table)
    }

    /// VL arbitration block 1 to 4.
    pub fn vla_tbl(&self, block_num: u8) -> Option<&VlArbBlock> {
        self.vl_arb.get(block_num)
    }

    pub fn set_vla_tbl(&mut self, block_num: u8, block: &VlArbBlock) -> Result<()> {
        self.vl_arb.set(block_num, block)
    }

    /// Negotiated MTU: `min(local cap, remote cap, current)`.
    ///
    /// `remote` is the link partner, if any; `current` is the previously
    /// negotiated value and `None` places no bound.
    pub fn calc_link_mtu(&self, remote: Option<&PhysicalPort>, current: Option<Mtu>) -> Mtu {
        let mut mtu = self.port_info.mtu_cap;
        if let Some(remote) = remote.filter(|r| r.is_valid()) {
            if remote.port_info.mtu_cap < mtu {
                debug_log!(
                    "PhysicalPort",
                    port_guid = %self.port_guid,
                    port_num = self.port_num,
                    local_mtu = %mtu,
                    remote_mtu = %remote.port_info.mtu_cap,
                    "Remote MTU capability is lower"
                );
                mtu = remote.port_info.mtu_cap;
            }
        }
        match current {
            Some(current) if current < mtu => current,
            _ => mtu,
        }
    }

    /// Negotiated operational VLs: `min(local VLCap, remote VLCap,
    /// max_op_vls, current)`.
    pub fn calc_link_op_vls(
        &self,
        remote: Option<&PhysicalPort>,
        options: &SubnetOptions,
        current: Option<VlCap>,
    ) -> VlCap {
        let mut op_vls = self.port_info.vl_cap;
        if let Some(remote) = remote.filter(|r| r.is_valid()) {
            op_vls = op_vls.min(remote.port_info.vl_cap);
        }
        let max = options.max_op_vls_cap();
        if max < op_vls {
            debug_log!(
                "PhysicalPort",
                port_guid = %self.port_guid,
                port_num = self.port_num,
                negotiated = %op_vls,
                max = %max,
                "Operational VLs capped by max_op_vls"
            );
            op_vls = max;
        }
        match current {
            Some(current) if current < op_vls => current,
            _ => op_vls,
        }
    }

    /// Health of the link: both ends, or this end when unlinked.
    pub fn link_is_healthy(&self, remote: Option<&PhysicalPort>) -> bool {
        self.healthy && remote.map_or(true, |r| r.healthy)
    }

    /// Speeds this port has enabled.
    fn enabled_speeds(&self, fdr10_enabled: bool) -> BTreeSet<LinkSpeed> {
        let mut speeds: BTreeSet<LinkSpeed> = self
            .port_info
            .enabled_base_speeds()
            .chain(self.port_info.enabled_ext_speeds())
            .collect();
        if fdr10_enabled && self.ext_port_info.fdr10_enabled() {
            speeds.insert(LinkSpeed::Fdr10);
        }
        speeds
    }

    /// Speed the link is running at, as seen by this port.
    fn active_speed(&self, fdr10_enabled: bool) -> Option<LinkSpeed> {
        if self.port_info.link_speed_ext_active != 0 {
            return LinkSpeed::from_ext_mask(self.port_info.link_speed_ext_active).max();
        }
        if fdr10_enabled && self.ext_port_info.fdr10_active() {
            return Some(LinkSpeed::Fdr10);
        }
        LinkSpeed::from_base_mask(self.port_info.link_speed_active).max()
    }

    /// True if either end runs below the fastest speed or widest width
    /// both ends have enabled.
    pub fn link_is_throttled(&self, remote: &PhysicalPort, fdr10_enabled: bool) -> bool {
        let common_width = LinkWidth::widest_in(
            self.port_info.link_width_enabled & remote.port_info.link_width_enabled,
        );
        if let Some(common) = common_width {
            for port in [self, remote] {
                if let Some(active) = port.port_info.active_width() {
                    if active.lanes() < common.lanes() {
                        debug_log!(
                            "PhysicalPort",
                            port_guid = %port.port_guid,
                            port_num = port.port_num,
                            active = %active,
                            common = %common,
                            "Link width throttled"
                        );
                        return true;
                    }
                }
            }
        }

        let common_speed = self
            .enabled_speeds(fdr10_enabled)
            .intersection(&remote.enabled_speeds(fdr10_enabled))
            .max()
            .copied();
        if let Some(common) = common_speed {
            for port in [self, remote] {
                if let Some(active) = port.active_speed(fdr10_enabled) {
                    if active < common {
                        debug_log!(
                            "PhysicalPort",
                            port_guid = %port.port_guid,
                            port_num = port.port_num,
                            active = %active,
                            common = %common,
                            "Link speed throttled"
                        );
                        return true;
                    }
                }
            }
        }

        false
    }
}

impl Default for PhysicalPort {
    fn default() -> Self {
        Self::construct()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaId;
    use crate::dr_path::BindHandle;
    use ib_types::PKey;
    use pretty_assertions::assert_eq;

    fn ca_info() -> NodeInfo {
        NodeInfo::new(NodeType::Ca, 1, Guid::new(0x100), Guid::new(0x101))
    }

    fn port(guid: u64, pi: PortInfo) -> PhysicalPort {
        let mut p = PhysicalPort::construct();
        p.init(
            Guid::new(guid),
            1,
            NodeId::from_raw(0, 0),
            &ca_info(),
            DrPath::default(),
        );
        p.port_info = pi;
        p
    }

    fn active_pi() -> PortInfo {
        PortInfo {
            port_state: PortState::Active,
            port_phys_state: PhysPortState::LinkUp,
            subnet_prefix: 0xfe80_0000_0000_0000,
            ..Default::default()
        }
    }

    #[test]
    fn test_construct_is_invalid() {
        let p = PhysicalPort::construct();
        assert!(!p.is_valid());
        assert!(!p.has_any_link());
        assert!(p.node().is_none());
    }

    #[test]
    fn test_init_and_destroy() {
        let path = DrPath::new(BindHandle::new(3), 1, Some(&[0, 7])).unwrap();
        let mut p = PhysicalPort::construct();
        p.init(Guid::new(0x101), 1, NodeId::from_raw(2, 0), &ca_info(), path.clone());

        assert!(p.is_valid());
        assert!(p.is_healthy());
        assert_eq!(p.port_num(), 1);
        assert_eq!(p.dr_path(), &path);
        assert_eq!(p.hop_wf(), 1);
        assert!(p.slvl_tbl(0).is_some());
        assert!(p.slvl_tbl(1).is_none());
        assert!(p.congestion().and_then(|cc| cc.ca_setting()).is_some());
        assert!(!p.state_timestamp().is_empty());
        assert!(p.state_timestamp().len() < TIMESTAMP_STR_LEN);

        p.destroy();
        assert!(!p.is_valid());
        assert!(p.congestion().is_none());
    }

    #[test]
    fn test_init_unknown_guid_stays_invalid() {
        let mut p = PhysicalPort::construct();
        p.init(Guid::ZERO, 3, NodeId::from_raw(0, 0), &ca_info(), DrPath::default());
        assert!(!p.is_valid());
    }

    #[test]
    fn test_switch_slvl_tables_per_ingress_port() {
        let ni = NodeInfo::new(NodeType::Switch, 8, Guid::new(1), Guid::new(1));
        let mut p = PhysicalPort::construct();
        p.init(Guid::new(1), 3, NodeId::from_raw(0, 0), &ni, DrPath::default());
        assert!(p.slvl_tbl(8).is_some());
        assert!(p.slvl_tbl(9).is_none());
        assert!(p.congestion().and_then(|cc| cc.switch_setting()).is_some());
    }

    #[test]
    fn test_set_port_info_down_copies_state_only() {
        let options = SubnetOptions::default();
        let mut p = port(0x101, active_pi());
        p.port_info.base_lid = Lid::new(7);
        p.port_info.mtu_cap = Mtu::Mtu2048;

        let down = PortInfo {
            port_state: PortState::Down,
            port_phys_state: PhysPortState::Polling,
            base_lid: Lid::new(99),
            ..Default::default()
        };
        p.set_port_info(&down, &options, false);

        assert_eq!(p.port_state(), PortState::Down);
        assert_eq!(p.phys_state(), PhysPortState::Polling);
        assert_eq!(p.base_lid(), Lid::new(7));
        assert_eq!(p.port_info().mtu_cap, Mtu::Mtu2048);
        assert!(!p.port_info_dirty());
    }

    #[test]
    fn test_set_port_info_full_copy_and_dirty() {
        let options = SubnetOptions {
            sm_base_lid: Lid::new(1),
            ..Default::default()
        };
        let mut p = port(0x101, PortInfo::default());

        let pi = PortInfo {
            base_lid: Lid::new(12),
            master_sm_base_lid: Lid::new(1),
            ..active_pi()
        };
        p.set_port_info(&pi, &options, false);
        assert_eq!(p.base_lid(), Lid::new(12));
        assert!(!p.port_info_dirty());

        let stale = PortInfo {
            master_sm_base_lid: Lid::new(5),
            ..pi
        };
        p.set_port_info(&stale, &options, false);
        assert!(p.port_info_dirty());
    }

    #[test]
    fn test_set_port_info_prefix_mismatch_marks_dirty() {
        let options = SubnetOptions::default();
        let mut p = port(0x101, PortInfo::default());
        let pi = PortInfo {
            subnet_prefix: 0,
            ..active_pi()
        };
        p.set_port_info(&pi, &options, false);
        assert!(p.port_info_dirty());
    }

    #[test]
    fn test_set_port_info_switch_external_port_not_dirty() {
        let ni = NodeInfo::new(NodeType::Switch, 4, Guid::new(1), Guid::new(1));
        let mut p = PhysicalPort::construct();
        p.init(Guid::new(1), 2, NodeId::from_raw(0, 0), &ni, DrPath::default());
        let pi = PortInfo {
            subnet_prefix: 0,
            ..active_pi()
        };
        p.set_port_info(&pi, &SubnetOptions::default(), false);
        assert!(!p.port_info_dirty());
    }

    #[test]
    fn test_ext_port_info_updated_flag() {
        let mut p = port(0x101, active_pi());
        assert!(!p.ext_port_info_updated());
        p.set_ext_port_info(&ExtPortInfo {
            link_speed_enabled: ExtPortInfo::FDR10,
            ..Default::default()
        });
        assert!(p.ext_port_info_updated());
        assert!(!p.ext_port_info_dirty());
        p.clear_ext_port_info_updated();
        assert!(!p.ext_port_info_updated());
    }

    #[test]
    fn test_calc_link_mtu() {
        let a = port(1, PortInfo { mtu_cap: Mtu::Mtu2048, ..active_pi() });
        let b = port(2, PortInfo { mtu_cap: Mtu::Mtu512, ..active_pi() });

        assert_eq!(a.calc_link_mtu(Some(&b), Some(Mtu::Mtu2048)), Mtu::Mtu512);
        assert_eq!(b.calc_link_mtu(Some(&a), Some(Mtu::Mtu2048)), Mtu::Mtu512);
        assert_eq!(a.calc_link_mtu(None, None), Mtu::Mtu2048);
        assert_eq!(a.calc_link_mtu(None, Some(Mtu::Mtu1024)), Mtu::Mtu1024);
    }

    #[test]
    fn test_calc_link_mtu_is_min_of_three() {
        let caps = [Mtu::Mtu256, Mtu::Mtu512, Mtu::Mtu1024, Mtu::Mtu2048, Mtu::Mtu4096];
        for a_cap in caps {
            for b_cap in caps {
                for current in caps {
                    let a = port(1, PortInfo { mtu_cap: a_cap, ..active_pi() });
                    let b = port(2, PortInfo { mtu_cap: b_cap, ..active_pi() });
                    let expected = a_cap.min(b_cap).min(current);
                    assert_eq!(a.calc_link_mtu(Some(&b), Some(current)), expected);
                    assert_eq!(b.calc_link_mtu(Some(&a), Some(current)), expected);
                }
            }
        }
    }

    #[test]
    fn test_calc_link_op_vls() {
        let a = port(1, PortInfo { vl_cap: VlCap::Vl0To14, ..active_pi() });
        let b = port(2, PortInfo { vl_cap: VlCap::Vl0To7, ..active_pi() });

        let options = SubnetOptions::default();
        assert_eq!(a.calc_link_op_vls(Some(&b), &options, None), VlCap::Vl0To7);

        let capped = SubnetOptions {
            max_op_vls: VlCap::Vl0To3.code(),
            ..Default::default()
        };
        assert_eq!(a.calc_link_op_vls(Some(&b), &capped, None), VlCap::Vl0To3);
        assert_eq!(
            a.calc_link_op_vls(Some(&b), &options, Some(VlCap::Vl0To1)),
            VlCap::Vl0To1
        );
    }

    #[test]
    fn test_link_is_healthy() {
        let mut a = port(1, active_pi());
        let mut b = port(2, active_pi());
        assert!(a.link_is_healthy(Some(&b)));

        b.set_health(false);
        assert!(!a.link_is_healthy(Some(&b)));
        assert!(a.link_is_healthy(None));

        a.set_health(false);
        assert!(!a.link_is_healthy(None));
    }

    fn link_pi(width_enabled: u8, width_active: u8, speed_enabled: u8, speed_active: u8) -> PortInfo {
        PortInfo {
            link_width_enabled: width_enabled,
            link_width_active: width_active,
            link_speed_enabled: speed_enabled,
            link_speed_active: speed_active,
            ..active_pi()
        }
    }

    #[test]
    fn test_link_not_throttled_at_common_max() {
        let x4 = LinkWidth::X4.bit();
        let both = LinkWidth::X1.bit() | x4;
        let a = port(1, link_pi(both, x4, 0x7, 0x4));
        let b = port(2, link_pi(x4, x4, 0x4, 0x4));
        assert!(!a.link_is_throttled(&b, false));
        assert!(!b.link_is_throttled(&a, false));
    }

    #[test]
    fn test_link_width_throttled() {
        let both = LinkWidth::X1.bit() | LinkWidth::X4.bit();
        let a = port(1, link_pi(both, LinkWidth::X1.bit(), 0x1, 0x1));
        let b = port(2, link_pi(both, LinkWidth::X1.bit(), 0x1, 0x1));
        assert!(a.link_is_throttled(&b, false));
    }

    #[test]
    fn test_link_speed_throttled() {
        let x4 = LinkWidth::X4.bit();
        let a = port(1, link_pi(x4, x4, 0x6, 0x2));
        let b = port(2, link_pi(x4, x4, 0x7, 0x2));
        assert!(a.link_is_throttled(&b, false));
    }

    #[test]
    fn test_link_ext_speed_throttled() {
        let x4 = LinkWidth::X4.bit();
        let mut a = port(1, link_pi(x4, x4, 0x4, 0x4));
        let mut b = port(2, link_pi(x4, x4, 0x4, 0x4));
        a.port_info.link_speed_ext_enabled = 0x3;
        b.port_info.link_speed_ext_enabled = 0x3;
        a.port_info.link_speed_ext_active = 0x1;
        b.port_info.link_speed_ext_active = 0x1;
        // Both enable EDR but run FDR.
        assert!(a.link_is_throttled(&b, false));

        a.port_info.link_speed_ext_active = 0x2;
        b.port_info.link_speed_ext_active = 0x2;
        assert!(!a.link_is_throttled(&b, false));
    }

    #[test]
    fn test_link_fdr10_only_counts_when_enabled() {
        let x4 = LinkWidth::X4.bit();
        let mut a = port(1, link_pi(x4, x4, 0x4, 0x4));
        let mut b = port(2, link_pi(x4, x4, 0x4, 0x4));
        let fdr10 = ExtPortInfo {
            link_speed_enabled: ExtPortInfo::FDR10,
            ..Default::default()
        };
        a.set_ext_port_info(&fdr10);
        b.set_ext_port_info(&fdr10);

        assert!(!a.link_is_throttled(&b, false));
        assert!(a.link_is_throttled(&b, true));
    }

    #[test]
    fn test_set_pkey_tbl_bounded_by_partition_cap() {
        let mut p = port(1, active_pi());
        let block = PKeyBlock::from_keys(&[PKey::DEFAULT]);

        assert!(p.set_pkey_tbl(64, 1, &block, false).is_ok());
        let err = p.set_pkey_tbl(64, 2, &block, false).unwrap_err();
        assert!(matches!(err, PortModelError::BlockOutOfRange { block: 2, max: 1, .. }));
        assert!(p.set_pkey_tbl(64, 2048, &block, false).is_err());
        assert!(p.pkey_tbl().contains_base(0x7fff));
    }

    #[test]
    fn test_set_pkey_tbl_is_set_clears_pending() {
        let mut p = port(1, active_pi());
        p.pkey_tbl_mut().mark_pending(0);
        let block = PKeyBlock::from_keys(&[PKey::DEFAULT]);

        p.set_pkey_tbl(64, 0, &block, false).unwrap();
        assert!(p.pkey_tbl().is_pending(0));

        p.set_pkey_tbl(64, 0, &block, true).unwrap();
        assert!(!p.pkey_tbl().is_pending(0));
    }

    #[test]
    fn test_pending_blocks_survive_partition_cap_change() {
        let mut p = port(1, active_pi());
        let block = PKeyBlock::from_keys(&[PKey::DEFAULT]);
        p.set_pkey_tbl(64, 0, &block, false).unwrap();
        p.pkey_tbl_mut().mark_pending(0);
        p.pkey_tbl_mut().mark_pending(1);

        p.set_pkey_tbl(128, 3, &block, false).unwrap();
        assert_eq!(p.pkey_tbl().max_blocks(), 4);
        assert_eq!(p.pkey_tbl().pending_blocks().collect::<Vec<_>>(), vec![0, 1]);
        assert!(p.pkey_tbl().contains_base(0x7fff));

        p.set_pkey_tbl(32, 0, &block, false).unwrap();
        assert_eq!(p.pkey_tbl().max_blocks(), 1);
        assert_eq!(p.pkey_tbl().pending_blocks().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_vla_and_slvl_bounds() {
        let mut p = port(1, active_pi());
        assert!(p.set_vla_tbl(4, &VlArbBlock::default()).is_ok());
        assert!(p.set_vla_tbl(0, &VlArbBlock::default()).is_err());
        assert!(p.set_slvl_tbl(0, &SlVlTable::default()).is_ok());
        assert!(p.set_slvl_tbl(1, &SlVlTable::default()).is_err());
    }

    #[test]
    fn test_guid_info_and_aliases() {
        let mut p = port(0x101, active_pi());
        assert!(p.guid_info().is_none());

        p.alloc_guid_info(16);
        assert_eq!(p.guid_info().map(<[_]>::len), Some(2));

        let mut block = GuidInfoBlock::default();
        block.guids[0] = Guid::new(0x101);
        block.guids[2] = Guid::new(0x202);
        p.set_guid_info_block(0, &block).unwrap();
        assert!(p.set_guid_info_block(2, &block).is_err());

        assert_eq!(p.alias_guids(), vec![Guid::new(0x202)]);
    }

    #[test]
    fn test_mcast_route_weight() {
        let mut p = port(1, active_pi());
        p.add_mcast_route_weight(3);
        p.add_mcast_route_weight(u32::MAX);
        assert_eq!(p.mcast_route_weight(), u32::MAX);
        p.reset_mcast_route_weight();
        assert_eq!(p.mcast_route_weight(), 0);
    }
}
