//! Minimal multicast group model.
//!
//! Groups are keyed by MLID. A member is identified by the GUID that joined,
//! which is the port GUID or an alias GUID (such as a vport's GUID) of its
//! base port.

use ib_types::{Guid, Lid, PKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One member of a multicast group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct McastMember {
    /// GUID that joined the group.
    pub port_guid: Guid,
    /// Logical port the joining GUID belongs to.
    pub base_port_guid: Guid,
    /// JoinState bits (full, non, send-only).
    pub join_state: u8,
}

/// Entry in a logical port's multicast membership list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct McastMembership {
    pub mlid: Lid,
    pub guid: Guid,
    pub join_state: u8,
}

/// A multicast group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastGroup {
    mlid: Lid,
    pkey: PKey,
    members: BTreeMap<Guid, McastMember>,
}

impl MulticastGroup {
    pub fn new(mlid: Lid, pkey: PKey) -> Self {
        Self {
            mlid,
            pkey,
            members: BTreeMap::new(),
        }
    }

    pub fn mlid(&self) -> Lid {
        self.mlid
    }

    pub fn pkey(&self) -> PKey {
        self.pkey
    }

    /// Adds a member, or merges its join state into an existing entry.
    pub fn add_member(&mut self, member: McastMember) {
        self.members
            .entry(member.port_guid)
            .and_modify(|existing| existing.join_state |= member.join_state)
            .or_insert(member);
    }

    pub fn remove_member(&mut self, port_guid: Guid) -> Option<McastMember> {
        self.members.remove(&port_guid)
    }

    pub fn is_member(&self, port_guid: Guid) -> bool {
        self.members.contains_key(&port_guid)
    }

    pub fn member(&self, port_guid: Guid) -> Option<&McastMember> {
        self.members.get(&port_guid)
    }

    /// Members whose base port is `base_port_guid`.
    pub fn members_of(&self, base_port_guid: Guid) -> impl Iterator<Item = &McastMember> + '_ {
        self.members
            .values()
            .filter(move |m| m.base_port_guid == base_port_guid)
    }

    pub fn members(&self) -> impl Iterator<Item = &McastMember> + '_ {
        self.members.values()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
