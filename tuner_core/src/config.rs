//! Runtime configuration for the client and the acquisition cycle.
//!
//! Separate from the TOML schema in `tuner_config`; see `conversions`.

use std::time::Duration;

use crate::settings::UnitMode;

/// Link parameters used by `StationClient::connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkCfg {
    pub baud: u32,
    /// Longest wait for one response line.
    pub read_timeout: Duration,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            baud: 152_000,
            read_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionCfg {
    /// Delay between ticks while active.
    pub scan_interval: Duration,
    /// Delay between ticks while idle.
    pub idle_interval: Duration,
    pub record_length: usize,
    pub average_window: usize,
    pub mode: UnitMode,
}

impl Default for AcquisitionCfg {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(200),
            idle_interval: Duration::from_millis(500),
            record_length: 100,
            average_window: 15,
            mode: UnitMode::Temperature,
        }
    }
}
