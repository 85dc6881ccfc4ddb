//! Alias GUIDs.
//!
//! An alias GUID is an additional GUID answered by a base logical port,
//! either from its GUIDInfo table or as the GUID of one of its vports.
//! Each alias maps to exactly one base port; moving it means removing and
//! adding it again.

use crate::node::{truncate_chars, NODE_DESCRIPTION_SIZE};
use crate::physp::PhysicalPort;
use crate::port::LogicalPort;
use crate::tables::PKeyTable;
use ib_types::Guid;

/// Longest alias description.
pub const AGUID_MAX_DESC: usize = NODE_DESCRIPTION_SIZE + 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasGuid {
    alias_guid: Guid,
    base_port_guid: Guid,
    pub dirty: bool,
    vport_index: Option<u16>,
}

impl AliasGuid {
    pub fn new(alias_guid: Guid, base_port_guid: Guid, vport_index: Option<u16>) -> Self {
        Self {
            alias_guid,
            base_port_guid,
            dirty: false,
            vport_index,
        }
    }

    pub fn alias_guid(&self) -> Guid {
        self.alias_guid
    }

    pub fn base_guid(&self) -> Guid {
        self.base_port_guid
    }

    /// Vport this alias names, if it is a vport GUID.
    pub fn vport_index(&self) -> Option<u16> {
        self.vport_index
    }

    /// P_Key table governing this alias: the vport's table when the alias
    /// names an existing vport, otherwise the base physical port's.
    pub fn pkey_tbl<'a>(
        &self,
        base_port: &'a LogicalPort,
        base_physp: &'a PhysicalPort,
    ) -> &'a PKeyTable {
        self.vport_index
            .and_then(|index| base_port.virt().vport(index))
            .map_or_else(|| base_physp.pkey_tbl(), |vport| vport.pkey_tbl())
    }

    /// Human readable description built from the base node's description.
    pub fn build_description(&self, node_description: &str) -> String {
        let mut desc = format!(
            "{} alias {} base {}",
            node_description, self.alias_guid, self.base_port_guid
        );
        if let Some(index) = self.vport_index {
            desc.push_str(&format!(" vport {}", index));
        }
        truncate_chars(&desc, AGUID_MAX_DESC)
    }
}
