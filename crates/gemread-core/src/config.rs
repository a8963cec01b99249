//! Decoder configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration. The CLI overrides individual fields from flags.
//!
//! ```toml
//! max_vfats_per_geb = 24
//! max_events = 1000
//! print_events = 5
//! exclude_chip_ids = [0xded]
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecoderConfig {
    /// Upper bound on the VFAT count a GEB header may announce.
    #[serde(default = "default_max_vfats_per_geb")]
    pub max_vfats_per_geb: u32,

    /// Upper bound on the GEB count an AMC header may announce.
    #[serde(default = "default_max_gebs_per_amc")]
    pub max_gebs_per_amc: u32,

    /// Upper bound on the threshold bins a scan header may describe.
    #[serde(default = "default_max_scan_bins")]
    pub max_scan_bins: u64,

    /// Stop cleanly after this many top-level events.
    #[serde(default)]
    pub max_events: Option<u64>,

    /// Dump the first N events in human-readable form.
    #[serde(default)]
    pub print_events: u64,

    /// Chip ids left out of the channel-hit histogram.
    #[serde(default)]
    pub exclude_chip_ids: Vec<u16>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_vfats_per_geb: default_max_vfats_per_geb(),
            max_gebs_per_amc: default_max_gebs_per_amc(),
            max_scan_bins: default_max_scan_bins(),
            max_events: None,
            print_events: 0,
            exclude_chip_ids: Vec::new(),
        }
    }
}

fn default_max_vfats_per_geb() -> u32 {
    512
}

fn default_max_gebs_per_amc() -> u32 {
    31
}

fn default_max_scan_bins() -> u64 {
    4096
}

impl DecoderConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DecoderConfig = toml::from_str(content)?;
        Ok(config)
    }
}
