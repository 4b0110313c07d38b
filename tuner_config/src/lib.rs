#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration-table files for the station tuner.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Calibration CSV import/export enforces the `index,voltage_uv,temperature_c`
//!   header and checks every row before anything is sent to a station.
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Tip names accepted in `[tip] default`, in firmware index order.
pub const TIP_NAMES: [&str; 4] = ["T245", "AM120-1", "AM120-2", "C360"];

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Link {
    /// Port to connect to when `--port` is not given.
    pub port: Option<String>,
    pub baud: u32,
    pub read_timeout_ms: u64,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            port: None,
            baud: 152_000,
            read_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Tip {
    /// Tip name (`T245`, `C360`, ...) or index.
    pub default: String,
}

impl Default for Tip {
    fn default() -> Self {
        Self {
            default: TIP_NAMES[0].to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnitMode {
    #[default]
    Temperature,
    Voltage,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Acquisition {
    pub scan_interval_ms: u64,
    /// Poll delay while disconnected or without a tip.
    pub idle_interval_ms: u64,
    /// Samples kept in the telemetry series.
    pub record_length: usize,
    /// Thermocouple-voltage moving-average window.
    pub average_window: usize,
    pub mode: UnitMode,
}

impl Default for Acquisition {
    fn default() -> Self {
        Self {
            scan_interval_ms: 200,
            idle_interval_ms: 500,
            record_length: 100,
            average_window: 15,
            mode: UnitMode::Temperature,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub link: Link,
    pub tip: Tip,
    pub acquisition: Acquisition,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn tip_resolves(tip: &str) -> bool {
    TIP_NAMES.contains(&tip) || tip.parse::<usize>().is_ok_and(|i| i < TIP_NAMES.len())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Link
        if self.link.baud == 0 {
            eyre::bail!("link.baud must be > 0");
        }
        if self.link.read_timeout_ms == 0 || self.link.read_timeout_ms > 60_000 {
            eyre::bail!("link.read_timeout_ms must be in [1, 60000]");
        }
        if let Some(port) = &self.link.port
            && port.trim().is_empty()
        {
            eyre::bail!("link.port must not be empty when set");
        }

        // Tip
        if !tip_resolves(self.tip.default.trim()) {
            eyre::bail!(
                "tip.default must be one of {} or an index below {}, got {:?}",
                TIP_NAMES.join(", "),
                TIP_NAMES.len(),
                self.tip.default
            );
        }

        // Acquisition
        if self.acquisition.scan_interval_ms < 10 {
            eyre::bail!("acquisition.scan_interval_ms must be >= 10");
        }
        if self.acquisition.idle_interval_ms == 0 {
            eyre::bail!("acquisition.idle_interval_ms must be >= 1");
        }
        if self.acquisition.record_length == 0 {
            eyre::bail!("acquisition.record_length must be >= 1");
        }
        if self.acquisition.average_window == 0 {
            eyre::bail!("acquisition.average_window must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}

/// Calibration CSV schema.
///
/// Expected headers:
/// index,voltage_uv,temperature_c
///
/// Example:
/// index,voltage_uv,temperature_c
/// 0,0.0,0.0
/// 1,2000.0,50.0
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct CalibrationRow {
    pub index: usize,
    pub voltage_uv: f64,
    pub temperature_c: f64,
}

const CSV_HEADERS: [&str; 3] = ["index", "voltage_uv", "temperature_c"];

/// Check a set of rows before import: non-empty, finite, indices `0..n` each once.
/// Returns the rows ordered by index.
pub fn check_rows(mut rows: Vec<CalibrationRow>) -> eyre::Result<Vec<CalibrationRow>> {
    if rows.is_empty() {
        eyre::bail!("calibration table has no rows");
    }
    for r in &rows {
        if !r.voltage_uv.is_finite() || !r.temperature_c.is_finite() {
            eyre::bail!("calibration row {} has a non-finite value", r.index);
        }
    }
    rows.sort_by_key(|r| r.index);
    for (expected, r) in rows.iter().enumerate() {
        if r.index != expected {
            eyre::bail!(
                "calibration indices must run 0..{} without gaps or duplicates (found {} at position {})",
                rows.len(),
                r.index,
                expected
            );
        }
    }
    Ok(rows)
}

pub fn load_calibration_csv(path: &Path) -> eyre::Result<Vec<CalibrationRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(str::to_string).collect();
    if actual != CSV_HEADERS {
        eyre::bail!(
            "calibration CSV must have headers '{}', got: {}",
            CSV_HEADERS.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    check_rows(rows)
}

pub fn save_calibration_csv(path: &Path, rows: &[CalibrationRow]) -> eyre::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| eyre::eyre!("create calibration CSV {:?}: {}", path, e))?;
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| eyre::eyre!("write calibration row {}: {}", row.index, e))?;
    }
    wtr.flush()
        .map_err(|e| eyre::eyre!("flush calibration CSV {:?}: {}", path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = load_toml("").unwrap();
        assert_eq!(cfg.link.baud, 152_000);
        assert_eq!(cfg.link.read_timeout_ms, 1000);
        assert_eq!(cfg.acquisition.scan_interval_ms, 200);
        assert_eq!(cfg.acquisition.record_length, 100);
        assert_eq!(cfg.acquisition.average_window, 15);
        assert_eq!(cfg.tip.default, "T245");
        cfg.validate().unwrap();
    }

    #[test]
    fn numeric_tip_is_accepted() {
        assert!(tip_resolves("3"));
        assert!(!tip_resolves("4"));
        assert!(!tip_resolves("t245"));
    }
}
