//! Subnet-wide policy options consumed by the port model.
//!
//! Loaded from TOML. Every field has a default so a missing file or a
//! partial file is valid.
//!
//! ```toml
//! max_op_vls = 4
//! fdr10_enabled = true
//! max_dr_path_retries = 3
//! subnet_prefix = "0xfe80000000000000"
//! sm_base_lid = 1
//! ```

use crate::info_log;
use ib_types::{Lid, VlCap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default location of the options file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/opensm/port-model.conf";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML could not be parsed
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    /// TOML could not be produced
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    /// A value failed validation
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// Subnet-wide options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetOptions {
    /// Upper bound on negotiated operational VLs, as a VLCap code (1-5)
    #[serde(default = "default_max_op_vls")]
    pub max_op_vls: u8,

    /// Treat FDR10 as an enabled speed when evaluating link throttling
    #[serde(default)]
    pub fdr10_enabled: bool,

    /// Alternate directed route attempts allowed per physical port
    #[serde(default = "default_max_dr_path_retries")]
    pub max_dr_path_retries: u32,

    /// Subnet prefix this SM programs into PortInfo
    #[serde(default = "default_subnet_prefix", with = "hex_u64")]
    pub subnet_prefix: u64,

    /// This SM's base LID; 0 until the SM has been assigned one
    #[serde(default)]
    pub sm_base_lid: Lid,

    /// Hop weighting factor given to newly initialized physical ports
    #[serde(default = "default_hop_weight")]
    pub hop_weight_default: u8,
}

fn default_max_op_vls() -> u8 {
    VlCap::Vl0To14.code()
}

fn default_max_dr_path_retries() -> u32 {
    3
}

fn default_subnet_prefix() -> u64 {
    0xfe80_0000_0000_0000
}

fn default_hop_weight() -> u8 {
    1
}

impl Default for SubnetOptions {
    fn default() -> Self {
        Self {
            max_op_vls: default_max_op_vls(),
            fdr10_enabled: false,
            max_dr_path_retries: default_max_dr_path_retries(),
            subnet_prefix: default_subnet_prefix(),
            sm_base_lid: Lid::UNASSIGNED,
            hop_weight_default: default_hop_weight(),
        }
    }
}

impl SubnetOptions {
    /// Load options from file, falling back to defaults if it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let options: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                options.validate()?;
                Ok(options)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info_log!(
                    "SubnetOptions",
                    path = %path.display(),
                    "Config file not found, using defaults"
                );
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Load from the default location or defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Save options to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Validate option ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if VlCap::try_from(self.max_op_vls).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "max_op_vls",
                message: format!("{} is not a VLCap code (1-5)", self.max_op_vls),
            });
        }
        if self.hop_weight_default == 0 {
            return Err(ConfigError::InvalidValue {
                field: "hop_weight_default",
                message: "must be at least 1".to_string(),
            });
        }
        if !self.sm_base_lid.is_unassigned() && !self.sm_base_lid.is_unicast() {
            return Err(ConfigError::InvalidValue {
                field: "sm_base_lid",
                message: format!("{} is not a unicast LID", self.sm_base_lid),
            });
        }
        Ok(())
    }

    /// `max_op_vls` as a [`VlCap`]; out-of-range values mean no bound.
    pub fn max_op_vls_cap(&self) -> VlCap {
        VlCap::try_from(self.max_op_vls).unwrap_or(VlCap::Vl0To14)
    }
}

/// TOML integers are signed 64-bit, so the prefix travels as a hex string.
mod hex_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{:016x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();
        let hex = s.strip_prefix("0x").unwrap_or(s);
        u64::from_str_radix(hex, 16).map_err(serde::de::Error::custom)
    }
}
