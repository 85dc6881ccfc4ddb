//! Per-port attribute tables: P_Key, SL-to-VL, VL arbitration and
//! QoS-config-SL.

use crate::error::{PortModelError, Result};
use ib_types::{PKey, PKeyBlock, SlVlTable, VlArbBlock};
use std::collections::{BTreeMap, BTreeSet};

/// Cached P_Key table of a port or vport.
///
/// Blocks are stored as received; `keys` indexes every valid entry by
/// partition number so membership checks do not scan blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PKeyTable {
    blocks: Vec<Option<PKeyBlock>>,
    keys: BTreeMap<u16, PKey>,
    pending: BTreeSet<u16>,
    max_blocks: u16,
}

impl PKeyTable {
    /// Creates an empty table addressing `max_blocks` blocks.
    pub fn new(max_blocks: u16) -> Self {
        Self {
            max_blocks: max_blocks.clamp(1, PKeyBlock::MAX_BLOCKS),
            ..Default::default()
        }
    }

    /// Block count needed for `partition_cap` entries, within 1..=2048.
    pub fn blocks_for_partition_cap(partition_cap: u16) -> u16 {
        let blocks = (u32::from(partition_cap) + 31) / 32;
        blocks.clamp(1, u32::from(PKeyBlock::MAX_BLOCKS)) as u16
    }

    pub fn max_blocks(&self) -> u16 {
        self.max_blocks
    }

    /// Number of blocks received so far.
    pub fn num_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    /// Stores `block` at `block_num`.
    pub fn set_block(&mut self, block_num: u16, block: &PKeyBlock) -> Result<()> {
        if block_num >= self.max_blocks {
            return Err(PortModelError::BlockOutOfRange {
                table: "P_Key",
                block: block_num,
                min: 0,
                max: self.max_blocks - 1,
            });
        }
        let index = usize::from(block_num);
        if self.blocks.len() <= index {
            self.blocks.resize(index + 1, None);
        }
        self.blocks[index] = Some(block.clone());
        self.rebuild_keys();
        Ok(())
    }

    pub fn block(&self, block_num: u16) -> Option<&PKeyBlock> {
        self.blocks.get(usize::from(block_num))?.as_ref()
    }

    fn rebuild_keys(&mut self) {
        self.keys.clear();
        for block in self.blocks.iter().flatten() {
            for key in block.valid_keys() {
                // Full membership wins when a partition appears twice.
                let entry = self.keys.entry(key.base()).or_insert(key);
                if key.is_full_member() {
                    *entry = key;
                }
            }
        }
    }

    /// Looks up the entry for `pkey`'s partition, ignoring membership.
    pub fn find(&self, pkey: PKey) -> Option<PKey> {
        self.keys.get(&pkey.base()).copied()
    }

    /// Returns true if the table holds partition `base`.
    pub fn contains_base(&self, base: u16) -> bool {
        self.keys.contains_key(&(base & 0x7fff))
    }

    /// Valid keys ordered by partition number.
    pub fn keys(&self) -> impl Iterator<Item = PKey> + '_ {
        self.keys.values().copied()
    }

    /// Records that a Set for `block_num` is in flight.
    pub fn mark_pending(&mut self, block_num: u16) {
        self.pending.insert(block_num);
    }

    pub fn is_pending(&self, block_num: u16) -> bool {
        self.pending.contains(&block_num)
    }

    pub(crate) fn clear_pending(&mut self, block_num: u16) {
        self.pending.remove(&block_num);
    }

    pub fn pending_blocks(&self) -> impl Iterator<Item = u16> + '_ {
        self.pending.iter().copied()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.keys.clear();
        self.pending.clear();
    }
}

/// SL-to-VL tables indexed by ingress port.
///
/// Switch ports carry one table per port of the switch including port 0;
/// end ports carry a single table at index 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlVlTables {
    by_in_port: Vec<SlVlTable>,
}

impl SlVlTables {
    pub fn new(num_tables: usize) -> Self {
        Self {
            by_in_port: vec![SlVlTable::default(); num_tables],
        }
    }

    pub fn len(&self) -> usize {
        self.by_in_port.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_in_port.is_empty()
    }

    pub fn get(&self, in_port: u8) -> Option<&SlVlTable> {
        self.by_in_port.get(usize::from(in_port))
    }

    pub fn set(&mut self, in_port: u8, table: &SlVlTable) -> Result<()> {
        let max = self.by_in_port.len().saturating_sub(1) as u16;
        let slot = self
            .by_in_port
            .get_mut(usize::from(in_port))
            .ok_or(PortModelError::BlockOutOfRange {
                table: "SL-to-VL",
                block: u16::from(in_port),
                min: 0,
                max,
            })?;
        *slot = *table;
        Ok(())
    }
}

/// The four VL arbitration blocks, numbered 1 to 4.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VlArbTables {
    blocks: [VlArbBlock; 4],
}

impl VlArbTables {
    fn slot(block_num: u8) -> Result<usize> {
        match block_num {
            1..=4 => Ok(usize::from(block_num - 1)),
            other => Err(PortModelError::BlockOutOfRange {
                table: "VL arbitration",
                block: u16::from(other),
                min: 1,
                max: 4,
            }),
        }
    }

    pub fn get(&self, block_num: u8) -> Option<&VlArbBlock> {
        Self::slot(block_num).ok().map(|i| &self.blocks[i])
    }

    pub fn set(&mut self, block_num: u8, block: &VlArbBlock) -> Result<()> {
        let i = Self::slot(block_num)?;
        self.blocks[i] = block.clone();
        Ok(())
    }
}

/// Per-SL QoS configuration of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QosSlEntry {
    pub bandwidth_share: u8,
    pub rate_limit: u16,
}

/// QoS-config-SL values, one entry per service level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QosConfigSl {
    pub entries: [QosSlEntry; 16],
}

impl QosConfigSl {
    pub fn get(&self, sl: u8) -> Option<&QosSlEntry> {
        self.entries.get(usize::from(sl))
    }
}
