//! Congestion control settings, keyed by node role.

use crate::error::{PortModelError, Result};
use ib_types::{CaCongSetting, CcTableBlock, NodeType, SwCongSetting};

/// Number of congestion control table blocks kept per CA port.
pub const CCT_ENTRY_MAD_BLOCKS: usize = 2;

/// Congestion control state of a physical port.
///
/// Switch ports carry the switch setting; CA and router ports carry the CA
/// setting and its control table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CongestionSettings {
    Switch {
        setting: SwCongSetting,
    },
    ChannelAdapter {
        setting: CaCongSetting,
        cc_table: Vec<CcTableBlock>,
    },
}

impl CongestionSettings {
    /// Empty settings of the variant matching `node_type`.
    pub fn for_node_type(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Switch => Self::Switch {
                setting: SwCongSetting::default(),
            },
            NodeType::Ca | NodeType::Router => Self::ChannelAdapter {
                setting: CaCongSetting::default(),
                cc_table: vec![CcTableBlock::default(); CCT_ENTRY_MAD_BLOCKS],
            },
        }
    }

    fn role(&self) -> &'static str {
        match self {
            Self::Switch { .. } => "switch",
            Self::ChannelAdapter { .. } => "channel adapter",
        }
    }

    pub fn switch_setting(&self) -> Option<&SwCongSetting> {
        match self {
            Self::Switch { setting } => Some(setting),
            Self::ChannelAdapter { .. } => None,
        }
    }

    pub fn ca_setting(&self) -> Option<&CaCongSetting> {
        match self {
            Self::ChannelAdapter { setting, .. } => Some(setting),
            Self::Switch { .. } => None,
        }
    }

    pub fn cc_table_block(&self, block: usize) -> Option<&CcTableBlock> {
        match self {
            Self::ChannelAdapter { cc_table, .. } => cc_table.get(block),
            Self::Switch { .. } => None,
        }
    }

    pub fn set_switch_setting(&mut self, new: &SwCongSetting) -> Result<()> {
        let actual = self.role();
        match self {
            Self::Switch { setting } => {
                *setting = new.clone();
                Ok(())
            }
            Self::ChannelAdapter { .. } => Err(PortModelError::CongestionRole {
                expected: "switch",
                actual,
            }),
        }
    }

    pub fn set_ca_setting(&mut self, new: &CaCongSetting) -> Result<()> {
        let actual = self.role();
        match self {
            Self::ChannelAdapter { setting, .. } => {
                *setting = new.clone();
                Ok(())
            }
            Self::Switch { .. } => Err(PortModelError::CongestionRole {
                expected: "channel adapter",
                actual,
            }),
        }
    }

    /// Stores CC table `block` (0 or 1); at most 64 entries per block.
    pub fn set_cc_table_block(&mut self, block: usize, new: &CcTableBlock) -> Result<()> {
        let actual = self.role();
        let Self::ChannelAdapter { cc_table, .. } = self else {
            return Err(PortModelError::CongestionRole {
                expected: "channel adapter",
                actual,
            });
        };
        let out_of_range = PortModelError::BlockOutOfRange {
            table: "congestion control",
            block: block.min(usize::from(u16::MAX)) as u16,
            min: 0,
            max: (CCT_ENTRY_MAD_BLOCKS - 1) as u16,
        };
        if new.entries.len() > CcTableBlock::ENTRIES {
            return Err(out_of_range);
        }
        let slot = cc_table.get_mut(block).ok_or(out_of_range)?;
        *slot = new.clone();
        Ok(())
    }
}
