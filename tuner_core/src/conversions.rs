//! `From` implementations bridging `tuner_config` types to `tuner_core` types.

use std::time::Duration;

use crate::config::{AcquisitionCfg, LinkCfg};
use crate::settings::UnitMode;

// ── UnitMode ─────────────────────────────────────────────────────────────────

impl From<tuner_config::UnitMode> for UnitMode {
    fn from(m: tuner_config::UnitMode) -> Self {
        match m {
            tuner_config::UnitMode::Temperature => UnitMode::Temperature,
            tuner_config::UnitMode::Voltage => UnitMode::Voltage,
        }
    }
}

// ── LinkCfg ──────────────────────────────────────────────────────────────────

impl From<&tuner_config::Link> for LinkCfg {
    fn from(c: &tuner_config::Link) -> Self {
        Self {
            baud: c.baud,
            read_timeout: Duration::from_millis(c.read_timeout_ms),
        }
    }
}

// ── AcquisitionCfg ───────────────────────────────────────────────────────────

impl From<&tuner_config::Acquisition> for AcquisitionCfg {
    fn from(c: &tuner_config::Acquisition) -> Self {
        Self {
            scan_interval: Duration::from_millis(c.scan_interval_ms),
            idle_interval: Duration::from_millis(c.idle_interval_ms),
            record_length: c.record_length,
            average_window: c.average_window,
            mode: c.mode.into(),
        }
    }
}

// ── Calibration rows ─────────────────────────────────────────────────────────

impl From<&tuner_config::CalibrationRow> for crate::protocol::CalibrationEntry {
    fn from(r: &tuner_config::CalibrationRow) -> Self {
        Self::new(r.voltage_uv, r.temperature_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_agree_with_file_defaults() {
        let file = tuner_config::Config::default();
        assert_eq!(LinkCfg::from(&file.link), LinkCfg::default());
        assert_eq!(AcquisitionCfg::from(&file.acquisition), AcquisitionCfg::default());
    }

    #[test]
    fn voltage_mode_maps_through() {
        let c = tuner_config::load_toml("[acquisition]\nmode = \"voltage\"\nscan_interval_ms = 50\n").unwrap();
        let a = AcquisitionCfg::from(&c.acquisition);
        assert_eq!(a.mode, UnitMode::Voltage);
        assert_eq!(a.scan_interval, Duration::from_millis(50));
    }
}
