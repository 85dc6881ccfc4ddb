//! Decoded Subnet Management attribute snapshots.
//!
//! Only the fields the port model reads or writes are carried; the MAD
//! layer is responsible for the full wire layout.

use crate::{Guid, Lid, LinkSpeed, LinkWidth, Mtu, PhysPortState, PortState, VlCap};
use serde::{Deserialize, Serialize};

/// PortInfo:CapabilityMask2 bit advertising virtualization support.
pub const CAP_MASK2_VIRTUALIZATION_SUPPORTED: u16 = 0x0004;

/// PortInfo:CapabilityMask bit advertising CapabilityMask2 presence.
pub const CAP_MASK_HAS_CAP_MASK2: u32 = 0x0000_8000;

/// Decoded PortInfo attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub m_key: u64,
    pub subnet_prefix: u64,
    pub base_lid: Lid,
    pub master_sm_base_lid: Lid,
    pub capability_mask: u32,
    pub capability_mask2: u16,
    /// Port the SMP arrived on; not this port's number on switches.
    pub local_port_num: u8,
    /// LinkWidthEnabled mask.
    pub link_width_enabled: u8,
    /// LinkWidthSupported mask.
    pub link_width_supported: u8,
    /// LinkWidthActive, a single bit.
    pub link_width_active: u8,
    /// LinkSpeedSupported mask (SDR/DDR/QDR).
    pub link_speed_supported: u8,
    pub port_state: PortState,
    pub port_phys_state: PhysPortState,
    /// LinkSpeedActive, a single bit (SDR/DDR/QDR).
    pub link_speed_active: u8,
    /// LinkSpeedEnabled mask (SDR/DDR/QDR).
    pub link_speed_enabled: u8,
    /// LinkSpeedExtActive, a single bit or 0 (FDR and above).
    pub link_speed_ext_active: u8,
    /// LinkSpeedExtEnabled mask (FDR and above).
    pub link_speed_ext_enabled: u8,
    pub lmc: u8,
    pub neighbor_mtu: Mtu,
    pub mtu_cap: Mtu,
    pub vl_cap: VlCap,
    pub op_vls: VlCap,
    pub vl_high_limit: u8,
    pub client_reregister: bool,
}

impl Default for PortInfo {
    fn default() -> Self {
        Self {
            m_key: 0,
            subnet_prefix: 0,
            base_lid: Lid::UNASSIGNED,
            master_sm_base_lid: Lid::UNASSIGNED,
            capability_mask: 0,
            capability_mask2: 0,
            local_port_num: 0,
            link_width_enabled: LinkWidth::X1.bit(),
            link_width_supported: LinkWidth::X1.bit(),
            link_width_active: LinkWidth::X1.bit(),
            link_speed_supported: 0x1,
            port_state: PortState::Down,
            port_phys_state: PhysPortState::Polling,
            link_speed_active: 0x1,
            link_speed_enabled: 0x1,
            link_speed_ext_active: 0,
            link_speed_ext_enabled: 0,
            lmc: 0,
            neighbor_mtu: Mtu::Mtu256,
            mtu_cap: Mtu::Mtu256,
            vl_cap: VlCap::Vl0,
            op_vls: VlCap::Vl0,
            vl_high_limit: 0,
            client_reregister: false,
        }
    }
}

impl PortInfo {
    /// Returns true if CapabilityMask2 advertises virtualization support.
    pub fn is_virtualization_supported(&self) -> bool {
        self.capability_mask2 & CAP_MASK2_VIRTUALIZATION_SUPPORTED != 0
    }

    /// Active link width, if the encoded value is a valid single width.
    pub fn active_width(&self) -> Option<LinkWidth> {
        LinkWidth::from_bit(self.link_width_active).ok()
    }

    /// Base speeds (SDR/DDR/QDR) enabled on this port.
    pub fn enabled_base_speeds(&self) -> impl Iterator<Item = LinkSpeed> {
        LinkSpeed::from_base_mask(self.link_speed_enabled)
    }

    /// Extended speeds (FDR and above) enabled on this port.
    pub fn enabled_ext_speeds(&self) -> impl Iterator<Item = LinkSpeed> {
        LinkSpeed::from_ext_mask(self.link_speed_ext_enabled)
    }
}

/// Decoded vendor ExtendedPortInfo attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtPortInfo {
    pub state_change_enable: u8,
    /// Vendor link speed supported mask; bit 0 is FDR10.
    pub link_speed_supported: u8,
    /// Vendor link speed enabled mask; bit 0 is FDR10.
    pub link_speed_enabled: u8,
    /// Vendor link speed active; bit 0 is FDR10.
    pub link_speed_active: u8,
    pub active_rsfec_parity: u16,
    pub active_rsfec_data: u16,
    pub capability_mask: u32,
    pub fec_mode_active: u8,
    pub retrans_mode: u8,
}

impl ExtPortInfo {
    /// Vendor speed bit for FDR10.
    pub const FDR10: u8 = 0x01;

    /// Returns true if FDR10 is enabled.
    pub fn fdr10_enabled(&self) -> bool {
        self.link_speed_enabled & Self::FDR10 != 0
    }

    /// Returns true if the link is running FDR10.
    pub fn fdr10_active(&self) -> bool {
        self.link_speed_active & Self::FDR10 != 0
    }
}

/// One 8-entry block of the GUIDInfo attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GuidInfoBlock {
    pub guids: [Guid; GuidInfoBlock::ENTRIES],
}

impl GuidInfoBlock {
    /// GUIDs per block.
    pub const ENTRIES: usize = 8;
}

/// SL-to-VL mapping table: one VL per service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SlVlTable {
    pub vl_by_sl: [u8; 16],
}

impl SlVlTable {
    /// Returns the VL mapped for `sl`, or `None` if `sl` is out of range.
    pub fn vl(&self, sl: u8) -> Option<u8> {
        self.vl_by_sl.get(sl as usize).copied()
    }
}

/// One VL-Arbitration table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VlArbEntry {
    pub vl: u8,
    pub weight: u8,
}

/// One 32-entry VL-Arbitration block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VlArbBlock {
    pub entries: [VlArbEntry; 32],
}

/// Switch congestion setting attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SwCongSetting {
    pub control_map: u32,
    pub victim_mask: [u8; 32],
    pub credit_mask: [u8; 32],
    pub threshold: u8,
    pub packet_size: u8,
    pub cs_threshold: u8,
    pub cs_return_delay: u16,
    pub marking_rate: u16,
}

/// Per-SL entry of the CA congestion setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaCongEntry {
    pub ccti_timer: u16,
    pub ccti_increase: u8,
    pub trigger_threshold: u8,
    pub ccti_min: u8,
}

/// CA congestion setting attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaCongSetting {
    pub port_control: u16,
    pub control_map: u16,
    pub entries: [CaCongEntry; 16],
}

/// Congestion control table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CcTableEntry {
    pub shift: u8,
    pub multiplier: u16,
}

/// One block of the CA congestion control table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CcTableBlock {
    pub ccti_limit: u16,
    /// Up to [`CcTableBlock::ENTRIES`] entries.
    pub entries: Vec<CcTableEntry>,
}

impl CcTableBlock {
    /// Entries per MAD block.
    pub const ENTRIES: usize = 64;
}

/// Decoded VirtualizationInfo attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VirtualizationInfo {
    /// Highest vport index currently in use by the device.
    pub vport_index_top: u16,
    /// Number of vports the device supports.
    pub vport_cap: u16,
    pub virtualization_enable: bool,
    /// Set by the device when any vport changed state.
    pub vport_state_change: bool,
}

/// Decoded VPortInfo attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VPortInfo {
    pub port_guid: Guid,
    pub vport_state: PortState,
    /// The vport needs its own LID.
    pub lid_required: bool,
    pub client_reregister: bool,
    /// LID assigned to the vport when `lid_required` is set.
    pub vport_lid: Lid,
    /// Index of the vport whose LID this vport shares otherwise.
    pub lid_by_vport_index: u16,
    pub qkey_violations: u16,
    pub pkey_violations: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_virtualization_capability() {
        let mut pi = PortInfo::default();
        assert!(!pi.is_virtualization_supported());
        pi.capability_mask2 = CAP_MASK2_VIRTUALIZATION_SUPPORTED;
        assert!(pi.is_virtualization_supported());
    }

    #[test]
    fn test_active_width() {
        let pi = PortInfo {
            link_width_active: LinkWidth::X4.bit(),
            ..Default::default()
        };
        assert_eq!(pi.active_width(), Some(LinkWidth::X4));
    }

    #[test]
    fn test_fdr10_bits() {
        let epi = ExtPortInfo {
            link_speed_enabled: ExtPortInfo::FDR10,
            ..Default::default()
        };
        assert!(epi.fdr10_enabled());
        assert!(!epi.fdr10_active());
    }

    #[test]
    fn test_slvl_lookup() {
        let mut tbl = SlVlTable::default();
        tbl.vl_by_sl[3] = 2;
        assert_eq!(tbl.vl(3), Some(2));
        assert_eq!(tbl.vl(16), None);
    }
}
