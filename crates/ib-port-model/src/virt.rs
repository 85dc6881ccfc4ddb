//! Virtualization state embedded in a logical port.
//!
//! The vport array is addressed by the administratively assigned vport
//! index, which may be sparse. Its allocated length is tracked apart from
//! the device's top index: it grows in whole blocks of
//! [`VPORTS_BLOCK_SIZE`] slots when a VirtualizationInfo raises the top
//! index, and never shrinks until the virtualization state is torn down.

use crate::vport::{VPort, VPortInfoContext};
use crate::{debug_log, error_log, warn_log};
use ib_types::{Guid, Lid, VPortInfo, VirtualizationInfo};

/// Vport slots added per growth step.
pub const VPORTS_BLOCK_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualizationData {
    virtualization_info: Option<VirtualizationInfo>,
    vports: Vec<Option<VPort>>,
    allocated_blocks: u16,
    queue_pending: bool,
    transactions: u16,
    first_virt_discovery: bool,
    state_change_bit_check: bool,
}

impl Default for VirtualizationData {
    fn default() -> Self {
        Self {
            virtualization_info: None,
            vports: Vec::new(),
            allocated_blocks: 0,
            queue_pending: false,
            transactions: 0,
            first_virt_discovery: true,
            state_change_bit_check: false,
        }
    }
}

impl VirtualizationData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last VirtualizationInfo stored.
    pub fn virtualization_info(&self) -> Option<&VirtualizationInfo> {
        self.virtualization_info.as_ref()
    }

    /// Stores `info` and grows the vport array so that every index up to
    /// its top index is addressable.
    ///
    /// Returns false, leaving the previous state untouched, when the array
    /// cannot grow.
    pub fn set_virt_info(&mut self, info: &VirtualizationInfo) -> bool {
        let needed_slots = usize::from(info.vport_index_top) + 1;
        let needed_blocks = needed_slots.div_ceil(VPORTS_BLOCK_SIZE);

        if needed_blocks > usize::from(self.allocated_blocks) {
            let Ok(new_blocks) = u16::try_from(needed_blocks) else {
                error_log!(
                    "Virtualization",
                    needed_blocks,
                    "Vport block count exceeds index space"
                );
                return false;
            };
            let new_len = needed_blocks * VPORTS_BLOCK_SIZE;
            if let Err(e) = self.vports.try_reserve_exact(new_len - self.vports.len()) {
                error_log!(
                    "Virtualization",
                    needed_blocks,
                    error = %e,
                    "Failed to grow vport array"
                );
                return false;
            }
            self.vports.resize_with(new_len, || None);
            debug_log!(
                "Virtualization",
                old_blocks = self.allocated_blocks,
                new_blocks,
                top_index = info.vport_index_top,
                "Vport array grown"
            );
            self.allocated_blocks = new_blocks;
        }

        self.virtualization_info = Some(*info);
        true
    }

    /// Highest vport index reported by the device; 0 before any
    /// VirtualizationInfo was received.
    pub fn vport_top_index(&self) -> u16 {
        self.virtualization_info
            .map_or(0, |info| info.vport_index_top)
    }

    pub fn allocated_blocks(&self) -> u16 {
        self.allocated_blocks
    }

    /// Number of addressable slots.
    pub fn capacity(&self) -> usize {
        self.vports.len()
    }

    /// Vport at `index`, if the slot is within the top index and occupied.
    pub fn vport(&self, index: u16) -> Option<&VPort> {
        if index > self.vport_top_index() {
            return None;
        }
        self.vports.get(usize::from(index))?.as_ref()
    }

    pub fn vport_mut(&mut self, index: u16) -> Option<&mut VPort> {
        if index > self.vport_top_index() {
            return None;
        }
        self.vports.get_mut(usize::from(index))?.as_mut()
    }

    /// Occupied vports in index order.
    pub fn vports(&self) -> impl Iterator<Item = &VPort> + '_ {
        self.vports.iter().flatten()
    }

    /// Creates the vport at `index`.
    ///
    /// Fails when `index` is beyond the top index or the allocated array,
    /// or the slot is already occupied.
    pub fn create_vport(
        &mut self,
        index: u16,
        base_port_guid: Guid,
        vport_info: &VPortInfo,
        pkey_blocks: u16,
        context: &VPortInfoContext,
    ) -> Option<&VPort> {
        let top = self.vport_top_index();
        if index > top {
            warn_log!(
                "Virtualization",
                port_guid = %base_port_guid,
                index,
                top_index = top,
                "Vport index above top index"
            );
            return None;
        }
        let slot = self.vports.get_mut(usize::from(index))?;
        if slot.is_some() {
            warn_log!(
                "Virtualization",
                port_guid = %base_port_guid,
                index,
                "Vport slot already occupied"
            );
            return None;
        }
        *slot = Some(VPort::new(
            index,
            base_port_guid,
            vport_info,
            pkey_blocks,
            context,
        ));
        slot.as_ref()
    }

    /// Applies a new VPortInfo to an occupied slot.
    pub fn update_vport(
        &mut self,
        index: u16,
        vport_info: &VPortInfo,
        context: &VPortInfoContext,
    ) -> bool {
        match self.vport_mut(index) {
            Some(vport) => {
                vport.update(vport_info, context);
                true
            }
            None => false,
        }
    }

    /// Empties an occupied slot and returns the vport it held.
    pub fn delete_vport(&mut self, index: u16) -> Option<VPort> {
        self.vports.get_mut(usize::from(index))?.take()
    }

    pub fn transactions(&self) -> u16 {
        self.transactions
    }

    /// Opens a bracket around one in-flight virtualization MAD.
    pub fn increase_transactions(&mut self) {
        self.transactions = self.transactions.saturating_add(1);
    }

    /// Closes a bracket opened by [`increase_transactions`](Self::increase_transactions).
    pub fn decrease_transactions(&mut self) {
        debug_assert!(self.transactions > 0, "virtualization transaction underflow");
        if self.transactions == 0 {
            error_log!(
                "Virtualization",
                "Virtualization transaction counter decreased below zero"
            );
            return;
        }
        self.transactions -= 1;
    }

    /// The port is waiting in the virtualization queue.
    pub fn queue_pending(&self) -> bool {
        self.queue_pending
    }

    pub(crate) fn set_queue_pending(&mut self, pending: bool) {
        self.queue_pending = pending;
    }

    pub fn first_virt_discovery(&self) -> bool {
        self.first_virt_discovery
    }

    pub fn set_first_virt_discovery(&mut self, first: bool) {
        self.first_virt_discovery = first;
    }

    /// Set when the VirtualizationInfo state-change bit must be checked on
    /// the next pass.
    pub fn state_change_bit_check(&self) -> bool {
        self.state_change_bit_check
    }

    pub fn set_state_change_bit_check(&mut self, check: bool) {
        self.state_change_bit_check = check;
    }

    /// True if the vport at `index` was assigned a LID of its own.
    pub fn is_vport_lid_assigned(&self, index: u16) -> bool {
        self.vport(index).is_some_and(|vport| {
            vport.index() != 0 && vport.lid_required() && !vport.lid().is_unassigned()
        })
    }

    /// Vport other than vport 0 that exclusively owns `lid`.
    pub fn vport_by_lid(&self, lid: Lid) -> Option<&VPort> {
        let top = self.vport_top_index();
        self.vports()
            .filter(|vport| vport.index() <= top)
            .find(|vport| vport.owns_lid(lid))
    }

    /// Drops every vport and resets the virtualization state, returning
    /// the vports that were removed.
    pub fn clear(&mut self) -> Vec<VPort> {
        let removed: Vec<VPort> = self.vports.drain(..).flatten().collect();
        *self = Self::default();
        removed
    }
}
