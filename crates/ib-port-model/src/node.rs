//! Minimal node model: NodeInfo, description and the physical ports
//! registered per port number.

use crate::arena::PhysPortId;
use ib_types::{Guid, NodeInfo, NodeType};

/// Size of the NodeDescription attribute.
pub const NODE_DESCRIPTION_SIZE: usize = 64;

/// A discovered node.
#[derive(Debug, Clone)]
pub struct Node {
    node_info: NodeInfo,
    description: String,
    physps: Vec<Option<PhysPortId>>,
    discovery_count: u32,
}

impl Node {
    /// Creates a node with an empty slot for port 0 and each external port.
    pub fn new(node_info: NodeInfo) -> Self {
        let slots = usize::from(node_info.num_ports) + 1;
        Self {
            node_info,
            description: String::new(),
            physps: vec![None; slots],
            discovery_count: 0,
        }
    }

    pub fn node_info(&self) -> &NodeInfo {
        &self.node_info
    }

    pub fn node_type(&self) -> NodeType {
        self.node_info.node_type
    }

    pub fn is_switch(&self) -> bool {
        self.node_info.is_switch()
    }

    pub fn node_guid(&self) -> Guid {
        self.node_info.node_guid
    }

    pub fn num_ports(&self) -> u8 {
        self.node_info.num_ports
    }

    pub fn partition_cap(&self) -> u16 {
        self.node_info.partition_cap
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Stores the NodeDescription, cut to the attribute size.
    pub fn set_description(&mut self, description: &str) {
        self.description = truncate_chars(description, NODE_DESCRIPTION_SIZE);
    }

    /// Physical port registered at `port_num`, if any.
    pub fn physp(&self, port_num: u8) -> Option<PhysPortId> {
        self.physps.get(usize::from(port_num)).copied().flatten()
    }

    /// Registered physical ports in port number order.
    pub fn physps(&self) -> impl Iterator<Item = (u8, PhysPortId)> + '_ {
        self.physps
            .iter()
            .enumerate()
            .filter_map(|(num, id)| id.map(|id| (num as u8, id)))
    }

    pub(crate) fn set_physp(&mut self, port_num: u8, id: Option<PhysPortId>) {
        if let Some(slot) = self.physps.get_mut(usize::from(port_num)) {
            *slot = id;
        }
    }

    pub fn discovery_count(&self) -> u32 {
        self.discovery_count
    }

    pub fn mark_discovered(&mut self) {
        self.discovery_count += 1;
    }

    pub(crate) fn reset_discovery_count(&mut self) {
        self.discovery_count = 0;
    }
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaId;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slots_cover_port_zero() {
        let node = Node::new(NodeInfo::new(NodeType::Switch, 4, Guid::new(1), Guid::new(1)));
        assert!(node.physp(0).is_none());
        assert!(node.physp(4).is_none());
        assert!(node.physp(5).is_none());
        assert_eq!(node.physps().count(), 0);
    }

    #[test]
    fn test_set_physp() {
        let mut node = Node::new(NodeInfo::new(NodeType::Ca, 2, Guid::new(1), Guid::new(2)));
        let id = PhysPortId::from_raw(3, 0);
        node.set_physp(2, Some(id));
        node.set_physp(9, Some(id));

        assert_eq!(node.physp(2), Some(id));
        assert_eq!(node.physps().collect::<Vec<_>>(), vec![(2, id)]);
    }

    #[test]
    fn test_description_truncated() {
        let mut node = Node::new(NodeInfo::new(NodeType::Ca, 1, Guid::new(1), Guid::new(2)));
        node.set_description(&"x".repeat(100));
        assert_eq!(node.description().len(), NODE_DESCRIPTION_SIZE);
    }
}
