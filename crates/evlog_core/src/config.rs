use crate::consts::{DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_LOOKBACK_LIMIT};
use crate::errors::Result;
use crate::index::ScanOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Where `time_ns` of a decoded range is measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    /// Fresh timeline at the (adjusted) range start.
    #[default]
    Session,
    /// Same values a linear decode from byte 0 would produce.
    Absolute,
}

/// Engine settings. Every field is optional in the JSON form:
/// `{ "lookback_limit": 256, "time_base": "absolute", "use_sidecar": true }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub lookback_limit: u64,
    pub checkpoint_interval: u64,
    pub strict_types: bool,
    pub time_base: TimeBase,
    /// Load/refresh `<log>.evx` instead of always rescanning.
    pub use_sidecar: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookback_limit: DEFAULT_LOOKBACK_LIMIT,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            strict_types: false,
            time_base: TimeBase::Session,
            use_sidecar: false,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&s)?)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions { strict_types: self.strict_types, checkpoint_interval: self.checkpoint_interval }
    }
}
