//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config file read when `--config` is not given; silently skipped if absent.
pub const DEFAULT_CONFIG: &str = "etc/tuner.toml";

#[derive(Parser, Debug)]
#[command(
    name = "station-tuner",
    version,
    about = "Tuning console for the soldering station"
)]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Serial port to connect to, or `sim` for the simulated station
    #[arg(long, value_name = "NAME")]
    pub port: Option<String>,

    /// Tip name (T245, AM120-1, AM120-2, C360) or index
    #[arg(long, value_name = "TIP")]
    pub tip: Option<String>,

    /// Print results and errors as JSON, log as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Unit the setpoint is given in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    /// °C (`set_t`)
    Temperature,
    /// µV of thermocouple voltage (`set_uv`)
    Voltage,
}

impl From<ModeArg> for tuner_core::UnitMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Temperature => tuner_core::UnitMode::Temperature,
            ModeArg::Voltage => tuner_core::UnitMode::Voltage,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List serial ports the platform currently sees (plus `sim`)
    Ports,
    /// Read one parameter of the selected tip and print the raw reply
    Get {
        /// Wire identifier, e.g. set_t, pid_kp, meas_uv
        command: String,
        /// Argument instead of `?` (e.g. a calibration row index)
        #[arg(long, value_name = "ARG")]
        arg: Option<String>,
    },
    /// Write one parameter and print the station's read-back
    Set {
        /// Wire identifier, e.g. set_t, pid_kp
        command: String,
        value: String,
    },
    /// Send a new setpoint
    Setpoint {
        #[arg(allow_negative_numbers = true)]
        value: f64,
        /// Unit of the value (defaults to the configured acquisition mode)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Turn the heater of the selected tip on or off
    Enable {
        #[arg(value_enum)]
        state: OnOff,
    },
    /// Show PID gains, limits and sleep settings of the selected tip
    Settings,
    /// Thermocouple calibration table
    Cal {
        #[command(subcommand)]
        action: CalAction,
    },
    /// Restore factory tuning, limits and calibration for the selected tip
    Restore {
        /// Thermocouple constant S in µV/K, in (0, 40]
        #[arg(long, value_name = "S")]
        tc_constant: f64,
    },
    /// Poll the station and print one line per sample (Ctrl-C to stop)
    Monitor {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Stop after N ticks
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Override acquisition.scan_interval_ms
        #[arg(long = "scan-ms", value_name = "MS")]
        scan_ms: Option<u64>,
        /// Override acquisition.record_length
        #[arg(long = "record-length", value_name = "N")]
        record_length: Option<usize>,
    },
    /// Quick health check: connect, select tip, query enable and output
    SelfCheck,
}

#[derive(Subcommand, Debug)]
pub enum CalAction {
    /// Print every row
    Show,
    /// Save the table to a CSV file (index,voltage_uv,temperature_c)
    Export { path: PathBuf },
    /// Write every row of a CSV file to the station
    Import { path: PathBuf },
    /// Write a single row
    Write {
        index: usize,
        #[arg(allow_negative_numbers = true)]
        voltage_uv: f64,
        #[arg(allow_negative_numbers = true)]
        temperature_c: f64,
    },
}
