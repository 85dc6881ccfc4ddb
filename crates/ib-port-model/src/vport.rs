//! Virtual ports layered on a base logical port.

use crate::tables::PKeyTable;
use ib_types::{Guid, Lid, PortState, VPortInfo};

/// Sweep the VPortInfo being applied was received in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VPortInfoContext {
    pub sweep_id: u64,
}

/// One vport slot of a virtualized logical port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VPort {
    index: u16,
    base_port_guid: Guid,
    vport_info: VPortInfo,
    pkeys: PKeyTable,
    last_sweep_id: u64,
    is_new: bool,
}

impl VPort {
    pub fn new(
        index: u16,
        base_port_guid: Guid,
        vport_info: &VPortInfo,
        pkey_blocks: u16,
        context: &VPortInfoContext,
    ) -> Self {
        Self {
            index,
            base_port_guid,
            vport_info: *vport_info,
            pkeys: PKeyTable::new(pkey_blocks),
            last_sweep_id: context.sweep_id,
            is_new: true,
        }
    }

    /// Applies a fresh VPortInfo; the vport stops being new.
    pub fn update(&mut self, vport_info: &VPortInfo, context: &VPortInfoContext) {
        self.vport_info = *vport_info;
        self.last_sweep_id = context.sweep_id;
        self.is_new = false;
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn guid(&self) -> Guid {
        self.vport_info.port_guid
    }

    pub fn base_port_guid(&self) -> Guid {
        self.base_port_guid
    }

    pub fn vport_info(&self) -> &VPortInfo {
        &self.vport_info
    }

    pub fn state(&self) -> PortState {
        self.vport_info.vport_state
    }

    /// LID assigned to this vport; only meaningful when it required one.
    pub fn lid(&self) -> Lid {
        self.vport_info.vport_lid
    }

    pub fn lid_required(&self) -> bool {
        self.vport_info.lid_required
    }

    /// True if this vport holds `lid` exclusively. Vport 0 shares the
    /// base port's LID and never owns one.
    pub fn owns_lid(&self, lid: Lid) -> bool {
        self.index != 0
            && self.vport_info.lid_required
            && !self.vport_info.vport_lid.is_unassigned()
            && self.vport_info.vport_lid == lid
    }

    pub fn pkey_tbl(&self) -> &PKeyTable {
        &self.pkeys
    }

    pub fn pkey_tbl_mut(&mut self) -> &mut PKeyTable {
        &mut self.pkeys
    }

    pub fn last_sweep_id(&self) -> u64 {
        self.last_sweep_id
    }

    /// Created in the current sweep and not updated since.
    pub fn is_new(&self) -> bool {
        self.is_new
    }
}
