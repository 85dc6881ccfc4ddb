//! Node classification and the decoded NodeInfo attribute.

use crate::{Guid, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of an InfiniBand node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum NodeType {
    /// Channel adapter (end node).
    Ca = 1,
    /// Switch.
    Switch = 2,
    /// Router.
    Router = 3,
}

impl NodeType {
    /// Returns true for node types whose ports are end ports.
    pub const fn is_end_node(&self) -> bool {
        matches!(self, NodeType::Ca | NodeType::Router)
    }
}

impl TryFrom<u8> for NodeType {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ca),
            2 => Ok(Self::Switch),
            3 => Ok(Self::Router),
            other => Err(ParseError::InvalidNodeType(other.to_string())),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Ca => "CA",
            NodeType::Switch => "Switch",
            NodeType::Router => "Router",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for NodeType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ca" | "hca" => Ok(NodeType::Ca),
            "switch" | "sw" => Ok(NodeType::Switch),
            "router" | "rtr" => Ok(NodeType::Router),
            _ => Err(ParseError::InvalidNodeType(s.to_string())),
        }
    }
}

/// Decoded NodeInfo attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub base_version: u8,
    pub class_version: u8,
    pub node_type: NodeType,
    /// Number of physical ports (excluding switch management port 0).
    pub num_ports: u8,
    pub sys_guid: Guid,
    pub node_guid: Guid,
    /// GUID of the port the SMP was received on.
    pub port_guid: Guid,
    /// Number of P_Key entries supported by the node's end ports.
    pub partition_cap: u16,
    pub device_id: u16,
    pub revision: u32,
    /// Port number the SMP was received on.
    pub local_port_num: u8,
    pub vendor_id: u32,
}

impl NodeInfo {
    /// Builds a NodeInfo with the fields the port model relies on and
    /// architecture defaults for the rest.
    pub fn new(node_type: NodeType, num_ports: u8, node_guid: Guid, port_guid: Guid) -> Self {
        Self {
            base_version: 1,
            class_version: 1,
            node_type,
            num_ports,
            sys_guid: node_guid,
            node_guid,
            port_guid,
            partition_cap: 64,
            device_id: 0,
            revision: 0,
            local_port_num: if node_type == NodeType::Switch { 0 } else { 1 },
            vendor_id: 0,
        }
    }

    /// Returns true if this describes a switch.
    pub fn is_switch(&self) -> bool {
        self.node_type == NodeType::Switch
    }
}
