//! Directed route paths.
//!
//! A directed route reaches a port before it has a LID by listing the
//! egress port to take at every hop. Slot 0 is the SM's own node and is
//! always 0; hops live in `path[1..=hop_count]`.

use crate::error::{PortModelError, Result};
use std::fmt;

/// Number of hop slots, including slot 0.
pub const MAX_HOPS: usize = 64;

/// Handle of the local transport binding a path is sent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BindHandle(u64);

impl BindHandle {
    /// Not bound to any local port.
    pub const INVALID: BindHandle = BindHandle(0);

    pub const fn new(value: u64) -> Self {
        BindHandle(value)
    }

    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

/// A bounded directed route hop sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrPath {
    bind_handle: BindHandle,
    hop_count: u8,
    path: [u8; MAX_HOPS],
}

impl Default for DrPath {
    fn default() -> Self {
        Self {
            bind_handle: BindHandle::INVALID,
            hop_count: 0,
            path: [0; MAX_HOPS],
        }
    }
}

impl DrPath {
    /// Builds a path of `hop_count` hops.
    ///
    /// `initial_path` holds slot 0 followed by the hops, so it must have at
    /// least `hop_count + 1` entries; `None` leaves every hop 0 (unknown).
    pub fn new(bind_handle: BindHandle, hop_count: u8, initial_path: Option<&[u8]>) -> Result<Self> {
        let len = usize::from(hop_count) + 1;
        if len > MAX_HOPS {
            return Err(PortModelError::InvalidDrPath(format!(
                "hop count {} exceeds {}",
                hop_count,
                MAX_HOPS - 1
            )));
        }

        let mut path = [0u8; MAX_HOPS];
        if let Some(initial) = initial_path {
            if initial.len() < len {
                return Err(PortModelError::InvalidDrPath(format!(
                    "{} hops given for hop count {}",
                    initial.len().saturating_sub(1),
                    hop_count
                )));
            }
            path[..len].copy_from_slice(&initial[..len]);
        }

        Ok(Self {
            bind_handle,
            hop_count,
            path,
        })
    }

    pub fn bind_handle(&self) -> BindHandle {
        self.bind_handle
    }

    pub fn set_bind_handle(&mut self, bind_handle: BindHandle) {
        self.bind_handle = bind_handle;
    }

    pub fn hop_count(&self) -> u8 {
        self.hop_count
    }

    /// Egress ports, one per hop.
    pub fn hops(&self) -> &[u8] {
        &self.path[1..=usize::from(self.hop_count)]
    }

    /// Slot 0 plus the hops.
    pub fn as_slice(&self) -> &[u8] {
        &self.path[..=usize::from(self.hop_count)]
    }

    /// Returns a copy of this path extended by one hop out of `port_num`.
    pub fn extend(&self, port_num: u8) -> Result<Self> {
        let next = usize::from(self.hop_count) + 1;
        if next >= MAX_HOPS {
            return Err(PortModelError::InvalidDrPath(format!(
                "cannot extend a {}-hop path",
                self.hop_count
            )));
        }
        let mut extended = self.clone();
        extended.path[next] = port_num;
        extended.hop_count += 1;
        Ok(extended)
    }

    /// Returns true if both paths take the same hops, ignoring the binding.
    pub fn same_route(&self, other: &DrPath) -> bool {
        self.hops() == other.hops()
    }
}

impl fmt::Display for DrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self.as_slice().iter().map(u8::to_string).collect();
        write!(f, "{}", hops.join(","))
    }
}
