//! Error types for the port model

use crate::arena::{NodeId, PhysPortId};
use crate::config::ConfigError;
use ib_types::Guid;
use thiserror::Error;

/// Port model errors
#[derive(Error, Debug)]
pub enum PortModelError {
    /// Node handle is stale or was never issued
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Physical port handle is stale or was never issued
    #[error("Physical port not found: {0}")]
    PhysPortNotFound(PhysPortId),

    /// No physical port registered at this port number
    #[error("Node {node} has no physical port {port_num}")]
    PortNumberNotPopulated { node: NodeId, port_num: u8 },

    /// Port number beyond what the node's NodeInfo advertises
    #[error("Invalid port number {port_num} for node with {num_ports} ports")]
    InvalidPortNumber { port_num: u8, num_ports: u8 },

    /// A physical port already occupies this port number
    #[error("Node {node} already has physical port {port_num}")]
    PhysPortExists { node: NodeId, port_num: u8 },

    /// Logical port lookup failed
    #[error("Port not found: {0}")]
    PortNotFound(Guid),

    /// Logical port already registered
    #[error("Port {0} already exists")]
    PortExists(Guid),

    /// Alias GUID lookup failed
    #[error("Alias GUID not found: {0}")]
    AliasGuidNotFound(Guid),

    /// Alias GUID already mapped to a base port
    #[error("Alias GUID {0} already exists")]
    AliasGuidExists(Guid),

    /// Multicast group lookup failed
    #[error("Multicast group not found: mlid {0}")]
    McastGroupNotFound(u16),

    /// Table block index outside the valid range
    #[error("Block {block} out of range for {table} table (valid {min}..={max})")]
    BlockOutOfRange {
        table: &'static str,
        block: u16,
        min: u16,
        max: u16,
    },

    /// Congestion attribute does not match the node role
    #[error("Congestion setting for {expected} applied to a {actual} port")]
    CongestionRole {
        expected: &'static str,
        actual: &'static str,
    },

    /// Directed route path construction error
    #[error("Invalid directed route path: {0}")]
    InvalidDrPath(String),

    /// Link operation error
    #[error("Link error: {0}")]
    Link(String),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for port model operations
pub type Result<T> = std::result::Result<T, PortModelError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let err = PortModelError::PortNotFound(Guid::new(0x10));
        assert_eq!(err.to_string(), "Port not found: 0x0000000000000010");
    }

    #[test]
    fn test_error_block_out_of_range() {
        let err = PortModelError::BlockOutOfRange {
            table: "VL arbitration",
            block: 5,
            min: 1,
            max: 4,
        };
        assert_eq!(
            err.to_string(),
            "Block 5 out of range for VL arbitration table (valid 1..=4)"
        );
    }

    #[test]
    fn test_error_invalid_port_number() {
        let err = PortModelError::InvalidPortNumber {
            port_num: 40,
            num_ports: 36,
        };
        assert_eq!(
            err.to_string(),
            "Invalid port number 40 for node with 36 ports"
        );
    }
}
